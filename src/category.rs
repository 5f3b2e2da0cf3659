//! Market variants and their closed category sets.
//!
//! Every membership question (which categories a market uses, which ones are
//! flagged, legend color, spelling aliases) is answered from `CATEGORY_TABLE`.
//! Nothing else in the crate re-derives these facts.
use crate::rank::{SortAttribute, SortKey};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

/// The dataset variant being analysed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Market {
    /// Insurance brokers, mapped as competitors.
    Brokers,
    /// Private healthcare providers, mapped as sales leads.
    Health,
}

/// A single tier/segment value.
///
/// Declaration order is legend order: within each market the lowest tier
/// comes first and the highest last. `Other` always sorts after the fixed
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    MicroBroker,
    MidMarketBroker,
    Consolidator,
    BigPlayer,
    SmallPractice,
    Diagnostics,
    PremiumClinic,
    Hospital,
    /// Any label the table does not recognise for the active market.
    Other,
}

struct CategoryInfo {
    category: Category,
    market: Option<Market>,
    label: &'static str,
    aliases: &'static [&'static str],
    flagged: bool,
    color: &'static str,
}

const CATEGORY_TABLE: &[CategoryInfo] = &[
    CategoryInfo {
        category: Category::MicroBroker,
        market: Some(Market::Brokers),
        label: "Micro Corretor",
        aliases: &[],
        flagged: false,
        color: "#bdc3c7",
    },
    CategoryInfo {
        category: Category::MidMarketBroker,
        market: Some(Market::Brokers),
        label: "PME (Concorrente Direto)",
        aliases: &["PME"],
        flagged: false,
        color: "#f39c12",
    },
    CategoryInfo {
        category: Category::Consolidator,
        market: Some(Market::Brokers),
        label: "Assessoria/Consolidadora",
        aliases: &["Assessoria / Consolidadora"],
        flagged: false,
        color: "#e67e22",
    },
    CategoryInfo {
        category: Category::BigPlayer,
        market: Some(Market::Brokers),
        label: "Big Player/Multinacional",
        aliases: &["Big Player / Multinacional"],
        flagged: true,
        color: "#c0392b",
    },
    CategoryInfo {
        category: Category::SmallPractice,
        market: Some(Market::Health),
        label: "Consultório/Pequeno",
        aliases: &["Consultorio/Pequeno", "Consultório / Pequeno"],
        flagged: false,
        color: "#bdc3c7",
    },
    CategoryInfo {
        category: Category::Diagnostics,
        market: Some(Market::Health),
        label: "Medicina Diagnóstica",
        aliases: &["Medicina Diagnostica"],
        flagged: false,
        color: "#a05195",
    },
    CategoryInfo {
        category: Category::PremiumClinic,
        market: Some(Market::Health),
        label: "Clínica Premium",
        aliases: &["Clinica Premium"],
        flagged: true,
        color: "#2f4b7c",
    },
    CategoryInfo {
        category: Category::Hospital,
        market: Some(Market::Health),
        label: "Hospital/Alta Complexidade",
        aliases: &["Hospital / Alta Complexidade"],
        flagged: true,
        color: "#003f5c",
    },
    CategoryInfo {
        category: Category::Other,
        market: None,
        label: "Other",
        aliases: &["Outros", "Outro"],
        flagged: false,
        color: "#7f8c8d",
    },
];

const BROKER_CATEGORIES: &[Category] = &[
    Category::MicroBroker,
    Category::MidMarketBroker,
    Category::Consolidator,
    Category::BigPlayer,
    Category::Other,
];

const HEALTH_CATEGORIES: &[Category] = &[
    Category::SmallPractice,
    Category::Diagnostics,
    Category::PremiumClinic,
    Category::Hospital,
    Category::Other,
];

fn fold(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Category {
    fn info(self) -> &'static CategoryInfo {
        // The table holds exactly one row per variant.
        CATEGORY_TABLE
            .iter()
            .find(|i| i.category == self)
            .unwrap_or(&CATEGORY_TABLE[CATEGORY_TABLE.len() - 1])
    }

    /// Canonical label as it appears in the source data.
    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// Whether entities of this category count as flagged (shark / key account).
    pub fn is_flagged(self) -> bool {
        self.info().flagged
    }

    /// Legend color used by chart collaborators.
    pub fn color(self) -> &'static str {
        self.info().color
    }

    /// Looks up a label (canonical or alias) among `market`'s categories.
    ///
    /// Returns `None` for labels the market does not know, including labels
    /// that belong to the other market.
    pub fn lookup(market: Market, label: &str) -> Option<Self> {
        let wanted = fold(label);
        if wanted.is_empty() {
            return None;
        }
        CATEGORY_TABLE
            .iter()
            .filter(|i| i.market.is_none() || i.market == Some(market))
            .find(|i| fold(i.label) == wanted || i.aliases.iter().any(|a| fold(a) == wanted))
            .map(|i| i.category)
    }

    /// Like [`Category::lookup`], but unrecognised labels land in `Other`.
    pub fn classify(market: Market, label: &str) -> Self {
        Self::lookup(market, label).unwrap_or(Self::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl Market {
    /// Full ordered category set, `Other` included.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Self::Brokers => BROKER_CATEGORIES,
            Self::Health => HEALTH_CATEGORIES,
        }
    }

    /// Category the on-screen listing and the dossier are narrowed to, if any.
    ///
    /// Brokers focus on the mid-market tier (the direct rivals); the health
    /// listing covers every segment.
    pub fn listing_focus(self) -> Option<Category> {
        match self {
            Self::Brokers => Some(Category::MidMarketBroker),
            Self::Health => None,
        }
    }

    pub fn listing_limit(self) -> usize {
        match self {
            Self::Brokers => 50,
            Self::Health => 100,
        }
    }

    pub fn listing_sort(self) -> Vec<SortKey> {
        vec![
            SortKey::desc(SortAttribute::Capital),
            SortKey::desc(SortAttribute::Age),
        ]
    }

    pub fn dossier_limit(self) -> usize {
        match self {
            Self::Brokers => 15,
            Self::Health => 20,
        }
    }

    pub fn dossier_sort(self) -> Vec<SortKey> {
        match self {
            Self::Brokers => vec![SortKey::desc(SortAttribute::Capital)],
            Self::Health => vec![
                SortKey::desc(SortAttribute::Capital),
                SortKey::desc(SortAttribute::Age),
            ],
        }
    }

    /// Upper age bound for the maturity histogram.
    pub fn maturity_cap(self) -> f64 {
        match self {
            Self::Brokers => 50.0,
            Self::Health => 40.0,
        }
    }

    /// (early-stage, legacy) marker ages for the maturity histogram.
    pub fn maturity_markers(self) -> (f64, f64) {
        match self {
            Self::Brokers => (5.0, 20.0),
            Self::Health => (2.0, 10.0),
        }
    }

    /// Spreadsheet importers used by the health sales team need a BOM.
    pub fn export_with_bom(self) -> bool {
        matches!(self, Self::Health)
    }

    pub fn entity_noun(self) -> &'static str {
        match self {
            Self::Brokers => "brokers",
            Self::Health => "establishments",
        }
    }

    pub fn flagged_noun(self) -> &'static str {
        match self {
            Self::Brokers => "big players",
            Self::Health => "key accounts",
        }
    }
}
