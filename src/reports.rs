use crate::category::Market;
use crate::filter::View;
use crate::types::{
    CategoryKey, CategoryShare, CrossTab, CrossTabRow, Entity, GeoKey, GeoUnit, GeoUnitAggregate,
    HistogramBin, MarketSummary, MaturityProfile, NEIGHBORHOOD_UNKNOWN,
};
use crate::util::{average, median};
use std::collections::{BTreeMap, BTreeSet};

/// States shown on the national heatmap.
pub const STATE_DISPLAY_LIMIT: usize = 15;
/// Cities with this many entities or fewer are treated as noise.
pub const CITY_NOISE_FLOOR: usize = 5;
/// Cities shown on the state scatter.
pub const CITY_DISPLAY_LIMIT: usize = 20;
/// Neighborhoods shown on the city breakdown.
pub const NEIGHBORHOOD_DISPLAY_LIMIT: usize = 15;
pub const MATURITY_BINS: usize = 30;

/// Group `view` by `key`, one row per distinct unit, ordered by unit.
/// Rows whose unit has a missing state, city or neighborhood are left out.
pub fn aggregate(view: &View<'_>, key: GeoKey) -> Vec<GeoUnitAggregate> {
    #[derive(Default)]
    struct Acc {
        total: usize,
        flagged: usize,
        capitals: Vec<f64>,
        ages: Vec<f64>,
    }

    let mut map: BTreeMap<GeoUnit, Acc> = BTreeMap::new();
    for e in view.iter() {
        let unit = GeoUnit::of(e, key);
        if !unit.is_resolved() {
            continue;
        }
        let acc = map.entry(unit).or_default();
        acc.total += 1;
        if e.flagged {
            acc.flagged += 1;
        }
        acc.capitals.push(e.capital);
        acc.ages.push(e.age_years);
    }

    map.into_iter()
        .map(|(unit, acc)| GeoUnitAggregate {
            unit,
            total: acc.total,
            flagged_count: acc.flagged,
            median_capital: median(acc.capitals),
            mean_age: average(&acc.ages),
            median_age: median(acc.ages),
        })
        .collect()
}

fn column_of(e: &Entity, key: CategoryKey) -> (usize, String) {
    match key {
        CategoryKey::Category => (e.category as usize, e.category.label().to_string()),
        CategoryKey::Flagged if e.flagged => (1, "flagged".to_string()),
        CategoryKey::Flagged => (0, "not flagged".to_string()),
    }
}

/// Group × category counts. Columns follow the fixed category order and only
/// include categories present in the view; rows are ordered by unit.
/// Unresolved units are skipped, as in [`aggregate`].
pub fn cross_tab(view: &View<'_>, geo_key: GeoKey, category_key: CategoryKey) -> CrossTab {
    let mut cells: BTreeMap<GeoUnit, BTreeMap<(usize, String), usize>> = BTreeMap::new();
    let mut columns: BTreeSet<(usize, String)> = BTreeSet::new();
    for e in view.iter() {
        let unit = GeoUnit::of(e, geo_key);
        if !unit.is_resolved() {
            continue;
        }
        let column = column_of(e, category_key);
        columns.insert(column.clone());
        *cells
            .entry(unit)
            .or_default()
            .entry(column)
            .or_insert(0) += 1;
    }

    let rows = cells
        .into_iter()
        .map(|(unit, counts)| {
            let counts: Vec<usize> = columns
                .iter()
                .map(|c| counts.get(c).copied().unwrap_or(0))
                .collect();
            let total = counts.iter().sum();
            CrossTabRow {
                unit,
                counts,
                total,
            }
        })
        .collect();

    CrossTab {
        geo_key,
        category_key,
        columns: columns.into_iter().map(|(_, label)| label).collect(),
        rows,
    }
}

/// Drop columns that are zero in every remaining row.
fn prune_empty_columns(tab: &mut CrossTab) {
    let keep: Vec<bool> = (0..tab.columns.len())
        .map(|i| tab.rows.iter().any(|r| r.counts[i] > 0))
        .collect();
    let mut i = 0;
    tab.columns.retain(|_| {
        i += 1;
        keep[i - 1]
    });
    for row in &mut tab.rows {
        let mut j = 0;
        row.counts.retain(|_| {
            j += 1;
            keep[j - 1]
        });
    }
}

/// National heatmap: state × category, the highest-volume states only,
/// listed in ascending volume so the largest renders last.
pub fn state_heatmap(view: &View<'_>) -> CrossTab {
    let mut tab = cross_tab(view, GeoKey::State, CategoryKey::Category);
    tab.rows.sort_by_key(|r| r.total);
    let skip = tab.rows.len().saturating_sub(STATE_DISPLAY_LIMIT);
    tab.rows.drain(..skip);
    tab
}

/// State scatter: cities above the noise floor, busiest first.
pub fn city_matrix(view: &View<'_>) -> Vec<GeoUnitAggregate> {
    let mut rows: Vec<GeoUnitAggregate> = aggregate(view, GeoKey::City)
        .into_iter()
        .filter(|a| a.total > CITY_NOISE_FLOOR)
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows.truncate(CITY_DISPLAY_LIMIT);
    rows
}

/// City drill-down: neighborhood × category for the busiest known
/// neighborhoods, busiest first.
pub fn neighborhood_breakdown(view: &View<'_>) -> CrossTab {
    let known = view.retain(|e| e.neighborhood != NEIGHBORHOOD_UNKNOWN);
    let mut tab = cross_tab(&known, GeoKey::Neighborhood, CategoryKey::Category);
    tab.rows.sort_by(|a, b| b.total.cmp(&a.total));
    tab.rows.truncate(NEIGHBORHOOD_DISPLAY_LIMIT);
    prune_empty_columns(&mut tab);
    tab
}

/// Count and share per category, in category order, absent ones omitted.
pub fn category_share(view: &View<'_>) -> Vec<CategoryShare> {
    let mut counts: BTreeMap<_, usize> = BTreeMap::new();
    for e in view.iter() {
        *counts.entry(e.category).or_insert(0) += 1;
    }
    let total = view.len();
    counts
        .into_iter()
        .map(|(category, count)| CategoryShare {
            category,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            },
            color: category.color(),
        })
        .collect()
}

/// Age histogram over `[0, cap]` with the market's early/legacy markers.
pub fn maturity_profile(view: &View<'_>, market: Market) -> MaturityProfile {
    let cap = market.maturity_cap();
    let (early_marker, legacy_marker) = market.maturity_markers();
    let width = cap / MATURITY_BINS as f64;
    let ages: Vec<f64> = view
        .iter()
        .map(|e| e.age_years)
        .filter(|a| *a <= cap)
        .collect();

    let mut bins: Vec<HistogramBin> = (0..MATURITY_BINS)
        .map(|i| HistogramBin {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count: 0,
        })
        .collect();
    for age in &ages {
        let idx = ((age / width).floor() as usize).min(MATURITY_BINS - 1);
        bins[idx].count += 1;
    }

    MaturityProfile {
        cap,
        sample: ages.len(),
        bins,
        early_marker,
        legacy_marker,
        early_stage: ages.iter().filter(|a| **a < early_marker).count(),
        legacy: ages.iter().filter(|a| **a >= legacy_marker).count(),
    }
}

/// Headline figures for the current view.
pub fn summarize(view: &View<'_>) -> MarketSummary {
    let capitals: Vec<f64> = view.iter().map(|e| e.capital).collect();
    let ages: Vec<f64> = view.iter().map(|e| e.age_years).collect();
    MarketSummary {
        total: view.len(),
        flagged: view.iter().filter(|e| e.flagged).count(),
        median_capital: median(capitals),
        mean_age: average(&ages),
    }
}

/// Mean of a numeric field across aggregates; the scatter's reference lines.
pub fn mean_of<F>(rows: &[GeoUnitAggregate], field: F) -> f64
where
    F: Fn(&GeoUnitAggregate) -> f64,
{
    let values: Vec<f64> = rows.iter().map(field).collect();
    let m = average(&values);
    if m.is_finite() {
        m
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::types::GEO_UNKNOWN;

    fn entity(state: &str, city: &str, hood: &str, category: Category, capital: f64) -> Entity {
        Entity {
            id: format!("{state}-{city}-{capital}"),
            name: "Test".to_string(),
            state: state.to_string(),
            city: city.to_string(),
            neighborhood: hood.to_string(),
            category,
            capital,
            age_years: capital / 100.0,
            flagged: category.is_flagged(),
            threat_profile: None,
            source: Vec::new(),
        }
    }

    fn city_block(state: &str, city: &str, n: usize) -> Vec<Entity> {
        (0..n)
            .map(|i| entity(state, city, "centro", Category::MicroBroker, i as f64 * 100.0))
            .collect()
    }

    #[test]
    fn aggregate_groups_once_per_unit_with_medians() {
        let data = vec![
            entity("SP", "Campinas", "centro", Category::MicroBroker, 100.0),
            entity("SP", "Campinas", "centro", Category::BigPlayer, 300.0),
            entity("SP", "Santos", "gonzaga", Category::MicroBroker, 200.0),
        ];
        let rows = aggregate(&View::of(&data), GeoKey::City);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].unit.label(), "Campinas");
        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[0].flagged_count, 1);
        assert_eq!(rows[0].median_capital, 200.0);
        assert_eq!(rows[0].mean_age, 2.0);
        assert_eq!(rows[1].unit.label(), "Santos");
    }

    #[test]
    fn empty_view_aggregates_to_nothing() {
        let view = View::default();
        assert!(aggregate(&view, GeoKey::State).is_empty());
        let s = summarize(&view);
        assert_eq!(s.total, 0);
        assert_eq!(s.median_capital, 0.0);
    }

    #[test]
    fn city_matrix_applies_noise_floor_and_sorts_descending() {
        let mut data = city_block("SP", "Campinas", 6);
        data.extend(city_block("SP", "Santos", 5));
        data.extend(city_block("SP", "Sorocaba", 9));
        let rows = city_matrix(&View::of(&data));
        let labels: Vec<&str> = rows.iter().map(|r| r.unit.label()).collect();
        assert_eq!(labels, vec!["Sorocaba", "Campinas"]);
    }

    #[test]
    fn city_matrix_caps_at_twenty() {
        let mut data = Vec::new();
        for i in 0..25 {
            data.extend(city_block("SP", &format!("City{i:02}"), 6 + i));
        }
        let rows = city_matrix(&View::of(&data));
        assert_eq!(rows.len(), CITY_DISPLAY_LIMIT);
        assert!(rows.windows(2).all(|w| w[0].total >= w[1].total));
        assert_eq!(rows[0].total, 30);
    }

    #[test]
    fn cross_tab_columns_follow_enum_order_and_sum_to_totals() {
        let data = vec![
            entity("SP", "A", "x", Category::BigPlayer, 1.0),
            entity("SP", "A", "x", Category::MicroBroker, 1.0),
            entity("RJ", "B", "y", Category::Other, 1.0),
            entity("RJ", "B", "y", Category::MicroBroker, 1.0),
        ];
        let view = View::of(&data);
        let tab = cross_tab(&view, GeoKey::State, CategoryKey::Category);
        assert_eq!(tab.columns, vec!["Micro Corretor", "Big Player/Multinacional", "Other"]);
        let totals = aggregate(&view, GeoKey::State);
        for (row, agg) in tab.rows.iter().zip(&totals) {
            assert_eq!(row.unit, agg.unit);
            assert_eq!(row.counts.iter().sum::<usize>(), agg.total);
        }
    }

    #[test]
    fn flagged_cross_tab_splits_two_ways() {
        let data = vec![
            entity("SP", "A", "x", Category::BigPlayer, 1.0),
            entity("SP", "A", "x", Category::MicroBroker, 1.0),
        ];
        let tab = cross_tab(&View::of(&data), GeoKey::City, CategoryKey::Flagged);
        assert_eq!(tab.columns, vec!["not flagged", "flagged"]);
        assert_eq!(tab.rows[0].counts, vec![1, 1]);
    }

    #[test]
    fn state_heatmap_keeps_top_fifteen_ascending() {
        let mut data = Vec::new();
        for i in 0..18 {
            data.extend(city_block(&format!("S{i:02}"), "X", i + 1));
        }
        let tab = state_heatmap(&View::of(&data));
        assert_eq!(tab.rows.len(), STATE_DISPLAY_LIMIT);
        assert!(tab.rows.windows(2).all(|w| w[0].total <= w[1].total));
        assert_eq!(tab.rows.first().unwrap().total, 4);
        assert_eq!(tab.rows.last().unwrap().total, 18);
    }

    #[test]
    fn neighborhood_breakdown_skips_unknown_and_prunes_columns() {
        let data = vec![
            entity("SP", "A", "centro", Category::MicroBroker, 1.0),
            entity("SP", "A", "centro", Category::MicroBroker, 1.0),
            entity("SP", "A", "lapa", Category::MicroBroker, 1.0),
            entity("SP", "A", NEIGHBORHOOD_UNKNOWN, Category::BigPlayer, 1.0),
        ];
        let tab = neighborhood_breakdown(&View::of(&data));
        let labels: Vec<&str> = tab.rows.iter().map(|r| r.unit.label()).collect();
        assert_eq!(labels, vec!["centro", "lapa"]);
        assert_eq!(tab.columns, vec!["Micro Corretor"]);
    }

    #[test]
    fn category_share_in_enum_order() {
        let data = vec![
            entity("SP", "A", "x", Category::BigPlayer, 1.0),
            entity("SP", "A", "x", Category::MicroBroker, 1.0),
            entity("SP", "A", "x", Category::MicroBroker, 1.0),
            entity("SP", "A", "x", Category::MicroBroker, 1.0),
        ];
        let shares = category_share(&View::of(&data));
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].category, Category::MicroBroker);
        assert!((shares[0].percentage - 75.0).abs() < 1e-9);
        assert_eq!(shares[0].color, Category::MicroBroker.color());
        assert_eq!(shares[1].color, "#c0392b");
    }

    #[test]
    fn missing_state_or_city_is_not_a_unit() {
        let data = vec![
            entity("SP", "Campinas", "centro", Category::MicroBroker, 1.0),
            entity("SP", GEO_UNKNOWN, "centro", Category::MicroBroker, 1.0),
            entity(GEO_UNKNOWN, GEO_UNKNOWN, "centro", Category::BigPlayer, 1.0),
        ];
        let view = View::of(&data);

        let cities = aggregate(&view, GeoKey::City);
        let labels: Vec<&str> = cities.iter().map(|r| r.unit.label()).collect();
        assert_eq!(labels, vec!["Campinas"]);

        let states = state_heatmap(&view);
        assert_eq!(states.rows.len(), 1);
        assert_eq!(states.rows[0].unit.state, "SP");
        assert_eq!(states.rows[0].total, 2);
        assert_eq!(states.columns, vec!["Micro Corretor"]);

        // Headline figures still count every row.
        assert_eq!(summarize(&view).total, 3);
    }

    #[test]
    fn maturity_profile_bins_capped_ages() {
        let data = vec![
            entity("SP", "A", "x", Category::MicroBroker, 100.0),
            entity("SP", "A", "x", Category::MicroBroker, 2500.0),
            entity("SP", "A", "x", Category::MicroBroker, 5000.0),
            entity("SP", "A", "x", Category::MicroBroker, 9000.0),
        ];
        let p = maturity_profile(&View::of(&data), Market::Brokers);
        assert_eq!(p.sample, 3);
        assert_eq!(p.bins.len(), MATURITY_BINS);
        assert_eq!(p.bins.iter().map(|b| b.count).sum::<usize>(), 3);
        assert_eq!(p.bins[MATURITY_BINS - 1].count, 1);
        assert_eq!(p.early_stage, 1);
        assert_eq!(p.legacy, 2);
    }
}
