//! Categorical and geographic predicates over the catalog.
//!
//! A [`View`] borrows catalog rows; filtering never copies or mutates the
//! entities themselves.
use crate::category::{Category, Market};
use crate::types::{Entity, GEO_UNKNOWN};
use log::debug;
use std::collections::BTreeSet;

/// Selection values meaning "no restriction".
pub const ALL_SENTINELS: &[&str] = &["ALL", "Todos", "Todas"];

/// `None` for blanks and "all" sentinels, the trimmed value otherwise.
pub fn normalize_choice(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() || ALL_SENTINELS.iter().any(|s| s.eq_ignore_ascii_case(v)) {
        None
    } else {
        Some(v.to_string())
    }
}

/// What the user picked. Each pipeline run is a pure function of the catalog
/// and one of these.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSelection {
    pub state: Option<String>,
    pub city: Option<String>,
    pub categories: Vec<Category>,
}

impl FilterSelection {
    /// No geographic restriction and every category of `market`.
    pub fn all(market: Market) -> Self {
        Self {
            state: None,
            city: None,
            categories: market.categories().to_vec(),
        }
    }

    pub fn with_state(mut self, state: Option<&str>) -> Self {
        self.state = normalize_choice(state).map(|s| s.to_uppercase());
        self
    }

    pub fn with_city(mut self, city: Option<&str>) -> Self {
        self.city = normalize_choice(city);
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// The city only counts once a state is chosen.
    pub fn city(&self) -> Option<&str> {
        self.state.as_ref().and(self.city.as_deref())
    }
}

/// Borrowed, ordered subset of catalog rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct View<'a> {
    rows: Vec<&'a Entity>,
}

impl<'a> View<'a> {
    pub fn new(rows: Vec<&'a Entity>) -> Self {
        Self { rows }
    }

    pub fn of(entities: &'a [Entity]) -> Self {
        Self {
            rows: entities.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Entity> + '_ {
        self.rows.iter().copied()
    }

    pub fn rows(&self) -> &[&'a Entity] {
        &self.rows
    }

    /// A narrower view keeping rows that satisfy `pred`.
    pub fn retain<F>(&self, mut pred: F) -> View<'a>
    where
        F: FnMut(&Entity) -> bool,
    {
        View {
            rows: self.rows.iter().copied().filter(|&e| pred(e)).collect(),
        }
    }

    /// Rows of a single category (e.g. the mid-market rivals).
    pub fn only_category(&self, category: Category) -> View<'a> {
        self.retain(|e| e.category == category)
    }
}

impl<'a> IntoIterator for View<'a> {
    type Item = &'a Entity;
    type IntoIter = std::vec::IntoIter<&'a Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Apply state, then city, then categories.
///
/// An empty category selection yields an empty view: nothing qualifies when
/// nothing is selected.
pub fn filter<'a>(catalog: &'a [Entity], selection: &FilterSelection) -> View<'a> {
    if selection.categories.is_empty() {
        debug!("Empty category selection, returning empty view");
        return View::default();
    }
    let mut view = View::of(catalog);
    if let Some(state) = selection.state() {
        view = view.retain(|e| e.state == state);
        debug!("State {} keeps {} rows", state, view.len());
        if let Some(city) = selection.city() {
            view = view.retain(|e| e.city == city);
            debug!("City {} keeps {} rows", city, view.len());
        }
    }
    let wanted: BTreeSet<Category> = selection.categories.iter().copied().collect();
    view.retain(|e| wanted.contains(&e.category))
}

/// Sorted distinct states, missing values excluded.
pub fn state_options(catalog: &[Entity]) -> Vec<String> {
    catalog
        .iter()
        .filter(|e| e.state != GEO_UNKNOWN)
        .map(|e| e.state.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct cities of one state, missing values excluded.
pub fn city_options(catalog: &[Entity], state: &str) -> Vec<String> {
    catalog
        .iter()
        .filter(|e| e.state == state && e.city != GEO_UNKNOWN)
        .map(|e| e.city.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(state: &str, city: &str, category: Category) -> Entity {
        Entity {
            id: format!("{state}-{city}"),
            name: "Test".to_string(),
            state: state.to_string(),
            city: city.to_string(),
            neighborhood: "centro".to_string(),
            category,
            capital: 1.0,
            age_years: 1.0,
            flagged: category.is_flagged(),
            threat_profile: None,
            source: Vec::new(),
        }
    }

    fn catalog() -> Vec<Entity> {
        vec![
            entity("SP", "Campinas", Category::MicroBroker),
            entity("SP", "Santos", Category::BigPlayer),
            entity("RJ", "Niteroi", Category::MidMarketBroker),
            entity("RJ", "Santos", Category::Other),
        ]
    }

    #[test]
    fn full_selection_returns_whole_catalog() {
        let data = catalog();
        let view = filter(&data, &FilterSelection::all(Market::Brokers));
        assert_eq!(view.len(), data.len());
    }

    #[test]
    fn empty_categories_return_nothing() {
        let data = catalog();
        let sel = FilterSelection::all(Market::Brokers)
            .with_state(Some("SP"))
            .with_categories(Vec::new());
        assert!(filter(&data, &sel).is_empty());
    }

    #[test]
    fn city_is_scoped_to_state() {
        let data = catalog();
        let sel = FilterSelection::all(Market::Brokers)
            .with_state(Some("sp"))
            .with_city(Some("Santos"));
        let view = filter(&data, &sel);
        assert_eq!(view.len(), 1);
        assert_eq!(view.rows()[0].state, "SP");

        let no_state = FilterSelection::all(Market::Brokers).with_city(Some("Santos"));
        assert_eq!(filter(&data, &no_state).len(), data.len());
    }

    #[test]
    fn sentinels_mean_no_restriction() {
        assert_eq!(normalize_choice(Some("Todos")), None);
        assert_eq!(normalize_choice(Some(" all ")), None);
        assert_eq!(normalize_choice(Some("MG")), Some("MG".to_string()));
        let data = catalog();
        let sel = FilterSelection::all(Market::Brokers).with_state(Some("ALL"));
        assert_eq!(filter(&data, &sel).len(), data.len());
    }

    #[test]
    fn unknown_state_is_empty_not_an_error() {
        let data = catalog();
        let sel = FilterSelection::all(Market::Brokers).with_state(Some("AM"));
        assert!(filter(&data, &sel).is_empty());
    }

    #[test]
    fn category_subset_narrows() {
        let data = catalog();
        let sel = FilterSelection::all(Market::Brokers).with_categories(vec![Category::BigPlayer]);
        let view = filter(&data, &sel);
        assert_eq!(view.len(), 1);
        assert!(view.iter().all(|e| e.flagged));
    }

    #[test]
    fn city_options_come_from_the_state() {
        let data = catalog();
        assert_eq!(city_options(&data, "RJ"), vec!["Niteroi", "Santos"]);
        assert_eq!(state_options(&data), vec!["RJ", "SP"]);
    }

    #[test]
    fn options_leave_out_missing_values() {
        let mut data = catalog();
        data.push(entity("SP", GEO_UNKNOWN, Category::MicroBroker));
        data.push(entity(GEO_UNKNOWN, GEO_UNKNOWN, Category::MicroBroker));
        assert_eq!(state_options(&data), vec!["RJ", "SP"]);
        assert_eq!(city_options(&data, "SP"), vec!["Campinas", "Santos"]);
    }
}
