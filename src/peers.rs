//! Nearest-neighbor benchmarking of one city against the rest of its state.
//!
//! Each city is reduced to a `(total, flagged_count)` profile and compared
//! with a weighted Euclidean distance. Both axes stay in raw counts; the
//! flagged axis is multiplied by [`FLAGGED_WEIGHT`] because flagged counts
//! span a much narrower range than totals. The weight is a hand-picked
//! tunable, not a statistical normalization.
use crate::filter::View;
use crate::reports::aggregate;
use crate::types::{Entity, GeoKey, GeoUnitAggregate, PeerRecord, PeerRole};
use log::{debug, warn};

pub const FLAGGED_WEIGHT: f64 = 5.0;

/// Peers returned alongside the target by default.
pub const DEFAULT_PEER_COUNT: usize = 5;

fn distance(unit: &GeoUnitAggregate, target: &GeoUnitAggregate) -> f64 {
    let d_total = unit.total as f64 - target.total as f64;
    let d_flagged = FLAGGED_WEIGHT * (unit.flagged_count as f64 - target.flagged_count as f64);
    (d_total * d_total + d_flagged * d_flagged).sqrt()
}

/// The target city and its `k` closest cities within `state`.
///
/// The comparison baseline is every entity of the state, regardless of any
/// city or category filter the caller has active. An empty result means the
/// target has no presence in the baseline.
pub fn nearest_peers(
    catalog: &[Entity],
    state: &str,
    target_city: &str,
    k: usize,
) -> Vec<PeerRecord> {
    let state_view = View::of(catalog).retain(|e| e.state == state);
    let baseline = aggregate(&state_view, GeoKey::City);

    let Some(target) = baseline
        .iter()
        .find(|a| a.unit.city.as_deref() == Some(target_city))
        .cloned()
    else {
        warn!(
            "No baseline for {} in {} ({} cities); insufficient sample",
            target_city,
            state,
            baseline.len()
        );
        return Vec::new();
    };

    let mut scored: Vec<(f64, GeoUnitAggregate)> = baseline
        .into_iter()
        .map(|a| (distance(&a, &target), a))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(k.saturating_add(1));

    let is_target = |a: &GeoUnitAggregate| a.unit.city.as_deref() == Some(target_city);
    if !scored.iter().any(|(_, a)| is_target(a)) {
        // More than k cities tie with the target at distance 0 and sort
        // ahead of it by name.
        scored.pop();
        scored.insert(0, (0.0, target));
    }
    debug!(
        "Peer set for {}/{}: {} cities",
        state,
        target_city,
        scored.len()
    );

    scored
        .into_iter()
        .map(|(distance, aggregate)| {
            let role = if is_target(&aggregate) {
                PeerRole::Target
            } else {
                PeerRole::Peer
            };
            PeerRecord {
                aggregate,
                distance,
                role,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;

    fn push_city(data: &mut Vec<Entity>, state: &str, city: &str, total: usize, flagged: usize) {
        for i in 0..total {
            let category = if i < flagged {
                Category::BigPlayer
            } else {
                Category::MicroBroker
            };
            data.push(Entity {
                id: format!("{city}-{i}"),
                name: format!("{city} {i}"),
                state: state.to_string(),
                city: city.to_string(),
                neighborhood: "centro".to_string(),
                category,
                capital: 1000.0 * (i + 1) as f64,
                age_years: 5.0,
                flagged: category.is_flagged(),
                threat_profile: None,
                source: Vec::new(),
            });
        }
    }

    #[test]
    fn target_first_with_zero_distance_and_sorted_peers() {
        let mut data = Vec::new();
        push_city(&mut data, "SP", "Campinas", 10, 2);
        push_city(&mut data, "SP", "Santos", 11, 2);
        push_city(&mut data, "SP", "Sorocaba", 10, 4);
        push_city(&mut data, "SP", "Bauru", 30, 0);
        push_city(&mut data, "RJ", "Niteroi", 10, 2);

        let peers = nearest_peers(&data, "SP", "Campinas", DEFAULT_PEER_COUNT);
        assert_eq!(peers.len(), 4);
        assert_eq!(peers[0].role, PeerRole::Target);
        assert_eq!(peers[0].distance, 0.0);
        assert_eq!(peers.iter().filter(|p| p.role == PeerRole::Target).count(), 1);
        assert!(peers.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(peers[1].aggregate.unit.label(), "Santos");
        assert_eq!(peers[2].aggregate.unit.label(), "Sorocaba");
        assert!((peers[2].distance - 10.0).abs() < 1e-9);
        assert!(peers.iter().all(|p| p.aggregate.unit.state == "SP"));
    }

    #[test]
    fn result_is_capped_at_k_plus_one() {
        let mut data = Vec::new();
        for i in 0..10 {
            push_city(&mut data, "MG", &format!("City{i}"), 6 + i, 1);
        }
        let peers = nearest_peers(&data, "MG", "City3", 2);
        assert_eq!(peers.len(), 3);
        assert_eq!(peers[0].aggregate.unit.label(), "City3");
    }

    #[test]
    fn absent_target_yields_empty() {
        let mut data = Vec::new();
        push_city(&mut data, "SP", "Campinas", 3, 1);
        assert!(nearest_peers(&data, "SP", "Atlantis", 5).is_empty());
        assert!(nearest_peers(&data, "RJ", "Campinas", 5).is_empty());
    }

    #[test]
    fn target_is_kept_when_ties_crowd_it_out() {
        let mut data = Vec::new();
        for city in ["A", "B", "C", "D", "E", "F", "Z"] {
            push_city(&mut data, "SP", city, 4, 1);
        }
        let peers = nearest_peers(&data, "SP", "Z", 2);
        let rows: Vec<(&str, PeerRole)> = peers
            .iter()
            .map(|p| (p.aggregate.unit.label(), p.role))
            .collect();
        assert_eq!(
            rows,
            vec![("Z", PeerRole::Target), ("A", PeerRole::Peer), ("B", PeerRole::Peer)]
        );
        assert!(peers.iter().all(|p| p.distance == 0.0));
    }

    #[test]
    fn missing_city_is_never_a_peer() {
        let mut data = Vec::new();
        push_city(&mut data, "SP", "Campinas", 3, 1);
        push_city(&mut data, "SP", crate::types::GEO_UNKNOWN, 3, 1);
        let peers = nearest_peers(&data, "SP", "Campinas", DEFAULT_PEER_COUNT);
        let labels: Vec<&str> = peers.iter().map(|p| p.aggregate.unit.label()).collect();
        assert_eq!(labels, vec!["Campinas"]);
        assert!(nearest_peers(&data, "SP", crate::types::GEO_UNKNOWN, 5).is_empty());
    }

    #[test]
    fn flagged_axis_is_weighted() {
        let mut data = Vec::new();
        push_city(&mut data, "SP", "Target", 10, 1);
        // 4 entities away on volume, same flagged count: distance 4.
        push_city(&mut data, "SP", "Volume", 14, 1);
        // Same volume, one flagged apart: distance 5.
        push_city(&mut data, "SP", "Shark", 10, 2);
        let peers = nearest_peers(&data, "SP", "Target", 2);
        let labels: Vec<&str> = peers.iter().map(|p| p.aggregate.unit.label()).collect();
        assert_eq!(labels, vec!["Target", "Volume", "Shark"]);
    }
}
