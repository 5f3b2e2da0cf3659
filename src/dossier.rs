//! Content and layout contract for the printable per-city dossier.
//!
//! The printed surface only represents Latin-1, so every text cell is cut to
//! its column budget and then mapped with [`to_latin1_lossy`]. Rendering
//! itself lives in `output`.
use crate::category::Market;
use crate::filter::View;
use crate::rank::rank;
use crate::types::{Align, DossierColumn, DossierContent, DossierRow, Entity};
use crate::util::{format_number, title_case, to_latin1_lossy, truncate_chars};
use chrono::{Local, NaiveDate};

pub const NAME_MAX_CHARS: usize = 35;
pub const SECONDARY_MAX_CHARS: usize = 20;

/// Cut to `max` characters, then replace anything outside Latin-1.
pub fn printable(text: &str, max: Option<usize>) -> String {
    match max {
        Some(max) => to_latin1_lossy(&truncate_chars(text, max)),
        None => to_latin1_lossy(text),
    }
}

fn columns(market: Market) -> Vec<DossierColumn> {
    let (name, secondary) = match market {
        Market::Brokers => ("Broker (Name)", "Neighborhood"),
        Market::Health => ("Establishment (Name)", "Segment"),
    };
    vec![
        DossierColumn {
            header: name.to_string(),
            width_mm: 70,
            max_chars: Some(NAME_MAX_CHARS),
            align: Align::Left,
        },
        DossierColumn {
            header: secondary.to_string(),
            width_mm: 40,
            max_chars: Some(SECONDARY_MAX_CHARS),
            align: Align::Center,
        },
        DossierColumn {
            header: "Capital (R$)".to_string(),
            width_mm: 40,
            max_chars: None,
            align: Align::Right,
        },
        DossierColumn {
            header: "Age (Years)".to_string(),
            width_mm: 30,
            max_chars: None,
            align: Align::Center,
        },
    ]
}

fn dossier_row(e: &Entity, market: Market) -> DossierRow {
    let secondary = match market {
        Market::Brokers => title_case(&e.neighborhood),
        Market::Health => e.category.label().to_string(),
    };
    DossierRow {
        name: printable(&e.name, Some(NAME_MAX_CHARS)),
        secondary: printable(&secondary, Some(SECONDARY_MAX_CHARS)),
        capital: format_number(e.capital, 0),
        age: format_number(e.age_years, 1),
    }
}

/// Build the dossier for today's date.
pub fn build_dossier(
    view: &View<'_>,
    market: Market,
    city: &str,
    state: &str,
) -> DossierContent {
    build_dossier_on(view, market, city, state, Local::now().date_naive())
}

/// Build the dossier with an explicit generation date.
pub fn build_dossier_on(
    view: &View<'_>,
    market: Market,
    city: &str,
    state: &str,
    generated_at: NaiveDate,
) -> DossierContent {
    let candidates = match market.listing_focus() {
        Some(category) => view.only_category(category),
        None => view.clone(),
    };
    let ranked = rank(&candidates, &market.dossier_sort(), market.dossier_limit());

    let (title, heading, blurb, noun, empty) = match market {
        Market::Brokers => (
            "Competition Dossier",
            "1. TOP DIRECT RIVALS (Mid-market tier, head-on competition)",
            "The companies below are your direct competition. They are of similar size \
             (mid-market) and operate in the same city. Use this list to benchmark \
             products and sales strategies.",
            "Targets mapped",
            "No relevant mid-market broker found for this filter.",
        ),
        Market::Health => (
            "B2B Prospecting Dossier",
            "1. LOCAL GOLDEN LEADS (Top clinics and hospitals)",
            "Establishments with the strongest capital structure and maturity in the \
             region, ready for field sales visits.",
            "Leads mapped",
            "No relevant lead found for this filter.",
        ),
    };

    DossierContent {
        market,
        generated_at,
        title: printable(
            &format!("{}: {} - {}", title, city.to_uppercase(), state.to_uppercase()),
            None,
        ),
        subtitle: printable(
            &format!(
                "Generated on {} | {}: {}",
                generated_at.format("%d/%m/%Y"),
                noun,
                view.len()
            ),
            None,
        ),
        total_count: view.len(),
        section_heading: printable(heading, None),
        summary_text: printable(blurb, None),
        columns: columns(market),
        ranked_rows: ranked.iter().map(|e| dossier_row(e, market)).collect(),
        empty_message: printable(empty, None),
    }
}
