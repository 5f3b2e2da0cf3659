//! The surface the presentation layer talks to.
//!
//! `Radar` holds the read-only catalog; every call recomputes its result
//! from the catalog and the arguments passed in.
use crate::category::Market;
use crate::dossier::build_dossier;
use crate::filter::{filter, FilterSelection, View};
use crate::peers::{nearest_peers, DEFAULT_PEER_COUNT};
use crate::rank::{rank, SortKey};
use crate::reports::{aggregate, cross_tab};
use crate::types::{
    Catalog, CategoryKey, CrossTab, DossierContent, GeoKey, GeoUnitAggregate, PeerRecord,
};
use std::sync::Arc;

/// Which dashboard panel a selection calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No state chosen: state × category heatmap.
    National,
    /// State chosen: city scatter.
    State,
    /// State and city chosen: peers and neighborhoods.
    City,
}

impl Scope {
    pub fn of(selection: &FilterSelection) -> Self {
        match (selection.state(), selection.city()) {
            (None, _) => Self::National,
            (Some(_), None) => Self::State,
            (Some(_), Some(_)) => Self::City,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Radar {
    catalog: Arc<Catalog>,
}

impl Radar {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn market(&self) -> Market {
        self.catalog.market
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn filtered_view(&self, selection: &FilterSelection) -> View<'_> {
        filter(self.catalog.entities(), selection)
    }

    pub fn geo_aggregate(&self, view: &View<'_>, key: GeoKey) -> Vec<GeoUnitAggregate> {
        aggregate(view, key)
    }

    pub fn cross_tab(&self, view: &View<'_>, geo_key: GeoKey, category_key: CategoryKey) -> CrossTab {
        cross_tab(view, geo_key, category_key)
    }

    /// Peers of `city` against the unfiltered state baseline.
    pub fn peers(&self, state: &str, city: &str) -> Vec<PeerRecord> {
        nearest_peers(self.catalog.entities(), state, city, DEFAULT_PEER_COUNT)
    }

    /// Peers for a city-scope selection, empty for any other scope. Only the
    /// selection's state and city reach the baseline.
    pub fn peers_for(&self, selection: &FilterSelection, k: usize) -> Vec<PeerRecord> {
        match Scope::of(selection) {
            Scope::City => match (selection.state(), selection.city()) {
                (Some(state), Some(city)) => nearest_peers(self.catalog.entities(), state, city, k),
                _ => Vec::new(),
            },
            Scope::National | Scope::State => Vec::new(),
        }
    }

    pub fn ranked_listing<'a>(&self, view: &View<'a>, sort: &[SortKey], limit: usize) -> View<'a> {
        rank(view, sort, limit)
    }

    /// The market's default listing: its focus category, sort and limit.
    pub fn default_listing<'a>(&self, view: &View<'a>) -> View<'a> {
        let market = self.market();
        let focused = match market.listing_focus() {
            Some(category) => view.only_category(category),
            None => view.clone(),
        };
        rank(&focused, &market.listing_sort(), market.listing_limit())
    }

    pub fn dossier(&self, view: &View<'_>, city: &str, state: &str) -> DossierContent {
        build_dossier(view, self.market(), city, state)
    }
}
