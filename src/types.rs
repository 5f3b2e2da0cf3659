use crate::category::{Category, Market};
use crate::util::format_number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tabled::Tabled;

/// Sentinel used when an entity has no neighborhood information.
pub const NEIGHBORHOOD_UNKNOWN: &str = "unknown";

/// Sentinel for missing state or city values.
pub const GEO_UNKNOWN: &str = "unknown";

/// One CSV row exactly as read. Both market variants' column names are
/// accepted; which one wins is decided during normalization.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRow {
    #[serde(rename = "cnpj_completo")]
    pub id: Option<String>,
    #[serde(rename = "razao_social")]
    pub name: Option<String>,
    #[serde(rename = "uf_norm")]
    pub state: Option<String>,
    #[serde(rename = "municipio_norm")]
    pub city_norm: Option<String>,
    #[serde(rename = "municipio_visual")]
    pub city_visual: Option<String>,
    #[serde(rename = "bairro_norm")]
    pub neighborhood_norm: Option<String>,
    #[serde(rename = "bairro")]
    pub neighborhood_raw: Option<String>,
    #[serde(rename = "tier_concorrente")]
    pub tier: Option<String>,
    #[serde(rename = "segmento_saude")]
    pub segment: Option<String>,
    #[serde(rename = "capital_social")]
    pub capital: Option<String>,
    #[serde(rename = "idade_empresa_anos")]
    pub company_age: Option<String>,
    #[serde(rename = "idade")]
    pub age: Option<String>,
    #[serde(rename = "is_shark")]
    pub is_shark: Option<String>,
    #[serde(rename = "is_key_account")]
    pub is_key_account: Option<String>,
    #[serde(rename = "perfil_ameaca")]
    pub threat_profile: Option<String>,
}

/// A normalized catalog row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub category: Category,
    pub capital: f64,
    pub age_years: f64,
    pub flagged: bool,
    pub threat_profile: Option<String>,
    /// The source row as read, one value per catalog header.
    #[serde(skip)]
    pub source: Vec<String>,
}

/// The read-only entity table handed to the core after loading.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub market: Market,
    /// Header row of the source dataset, in file order.
    pub headers: Vec<String>,
    pub entities: Vec<Entity>,
}

impl Catalog {
    pub fn new(market: Market, headers: Vec<String>, entities: Vec<Entity>) -> Self {
        Self {
            market,
            headers,
            entities,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Level of the geographic hierarchy used as a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GeoKey {
    State,
    City,
    Neighborhood,
}

/// Categorical attribute used for the columns of a cross-tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CategoryKey {
    /// The tier/segment enum.
    Category,
    /// The flagged / not-flagged split.
    Flagged,
}

/// A state, a city within a state, or a neighborhood within a city.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GeoUnit {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
}

impl GeoUnit {
    pub fn of(entity: &Entity, key: GeoKey) -> Self {
        let city = match key {
            GeoKey::State => None,
            GeoKey::City | GeoKey::Neighborhood => Some(entity.city.clone()),
        };
        let neighborhood = match key {
            GeoKey::Neighborhood => Some(entity.neighborhood.clone()),
            GeoKey::State | GeoKey::City => None,
        };
        Self {
            state: entity.state.clone(),
            city,
            neighborhood,
        }
    }

    /// False when any level of the unit is a missing-value sentinel.
    pub fn is_resolved(&self) -> bool {
        self.state != GEO_UNKNOWN
            && self.city.as_deref() != Some(GEO_UNKNOWN)
            && self.neighborhood.as_deref() != Some(NEIGHBORHOOD_UNKNOWN)
    }

    /// Most specific name of the unit.
    pub fn label(&self) -> &str {
        self.neighborhood
            .as_deref()
            .or(self.city.as_deref())
            .unwrap_or(&self.state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoUnitAggregate {
    #[serde(flatten)]
    pub unit: GeoUnit,
    pub total: usize,
    pub flagged_count: usize,
    pub median_capital: f64,
    pub mean_age: f64,
    pub median_age: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    #[strum(serialize = "Target")]
    Target,
    #[strum(serialize = "Peer")]
    Peer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerRecord {
    #[serde(flatten)]
    pub aggregate: GeoUnitAggregate,
    pub distance: f64,
    pub role: PeerRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTabRow {
    pub unit: GeoUnit,
    pub counts: Vec<usize>,
    pub total: usize,
}

/// Group × category count matrix. `columns` and each row's `counts` line up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTab {
    pub geo_key: GeoKey,
    pub category_key: CategoryKey,
    pub columns: Vec<String>,
    pub rows: Vec<CrossTabRow>,
}

impl CrossTab {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub count: usize,
    pub percentage: f64,
    /// Legend colour of the category, as a hex string.
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaturityProfile {
    pub cap: f64,
    pub sample: usize,
    pub bins: Vec<HistogramBin>,
    pub early_marker: f64,
    pub legacy_marker: f64,
    pub early_stage: usize,
    pub legacy: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub total: usize,
    pub flagged: usize,
    pub median_capital: f64,
    pub mean_age: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Column contract for the printed table: header, physical width and the
/// character budget text cells are cut to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DossierColumn {
    pub header: String,
    pub width_mm: u32,
    pub max_chars: Option<usize>,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DossierRow {
    pub name: String,
    pub secondary: String,
    pub capital: String,
    pub age: String,
}

impl DossierRow {
    pub fn cells(&self) -> [&str; 4] {
        [&self.name, &self.secondary, &self.capital, &self.age]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DossierContent {
    pub market: Market,
    pub generated_at: NaiveDate,
    pub title: String,
    pub subtitle: String,
    pub total_count: usize,
    pub section_heading: String,
    pub summary_text: String,
    pub columns: Vec<DossierColumn>,
    pub ranked_rows: Vec<DossierRow>,
    pub empty_message: String,
}

// Console preview rows.

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AggregateRow {
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Flagged")]
    #[tabled(rename = "Flagged")]
    pub flagged: usize,
    #[serde(rename = "MedianCapital")]
    #[tabled(rename = "MedianCapital")]
    pub median_capital: String,
    #[serde(rename = "MeanAge")]
    #[tabled(rename = "MeanAge")]
    pub mean_age: String,
}

impl From<&GeoUnitAggregate> for AggregateRow {
    fn from(a: &GeoUnitAggregate) -> Self {
        Self {
            unit: a.unit.label().to_string(),
            total: a.total,
            flagged: a.flagged_count,
            median_capital: format_number(a.median_capital, 0),
            mean_age: format_number(a.mean_age, 1),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PeerRow {
    #[serde(rename = "Role")]
    #[tabled(rename = "Role")]
    pub role: String,
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Flagged")]
    #[tabled(rename = "Flagged")]
    pub flagged: usize,
    #[serde(rename = "MedianCapital")]
    #[tabled(rename = "MedianCapital")]
    pub median_capital: String,
    #[serde(rename = "Distance")]
    #[tabled(rename = "Distance")]
    pub distance: String,
}

impl From<&PeerRecord> for PeerRow {
    fn from(p: &PeerRecord) -> Self {
        Self {
            role: p.role.to_string(),
            city: p.aggregate.unit.label().to_string(),
            total: p.aggregate.total,
            flagged: p.aggregate.flagged_count,
            median_capital: format_number(p.aggregate.median_capital, 0),
            distance: format_number(p.distance, 2),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ListingRow {
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "Neighborhood")]
    #[tabled(rename = "Neighborhood")]
    pub neighborhood: String,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Profile")]
    #[tabled(rename = "Profile")]
    pub profile: String,
    #[serde(rename = "Age")]
    #[tabled(rename = "Age")]
    pub age: String,
    #[serde(rename = "Capital")]
    #[tabled(rename = "Capital")]
    pub capital: String,
}

impl From<&Entity> for ListingRow {
    fn from(e: &Entity) -> Self {
        Self {
            name: e.name.clone(),
            city: e.city.clone(),
            neighborhood: e.neighborhood.clone(),
            category: e.category.label().to_string(),
            profile: e.threat_profile.clone().unwrap_or_default(),
            age: format_number(e.age_years, 1),
            capital: format_number(e.capital, 0),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CategoryShareRow {
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share: String,
    #[serde(rename = "Color")]
    #[tabled(rename = "Color")]
    pub color: String,
}

impl From<&CategoryShare> for CategoryShareRow {
    fn from(s: &CategoryShare) -> Self {
        Self {
            category: s.category.label().to_string(),
            count: s.count,
            share: format!("{}%", format_number(s.percentage, 1)),
            color: s.color.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HistogramRow {
    #[serde(rename = "AgeRange")]
    #[tabled(rename = "AgeRange")]
    pub range: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

impl From<&HistogramBin> for HistogramRow {
    fn from(b: &HistogramBin) -> Self {
        Self {
            range: format!("{:.1}-{:.1}", b.lower, b.upper),
            count: b.count,
        }
    }
}
