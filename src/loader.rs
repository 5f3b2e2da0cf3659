use crate::category::{Category, Market};
use crate::error::{LoadError, LoadResult};
use crate::types::{Catalog, Entity, RawRow, GEO_UNKNOWN, NEIGHBORHOOD_UNKNOWN};
use crate::util::{parse_f64_safe, parse_flag};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long a loaded catalog is reused before the file is read again.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Neighborhood values that mean "not informed" in the source data.
const NEIGHBORHOOD_PLACEHOLDERS: &[&str] = &["nao_informado", "não informado", "nan", "none"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub unknown_categories: usize,
    pub derived_flags: usize,
    pub sentinel_neighborhoods: usize,
    pub clamped_measures: usize,
}

/// Read and normalize the dataset at `path`.
pub fn load_catalog(path: &Path, market: Market) -> LoadResult<(Catalog, LoadReport)> {
    if !path.exists() {
        return Err(LoadError::DatasetMissing {
            path: path.to_path_buf(),
        });
    }
    let file = std::fs::File::open(path)?;
    let (catalog, report) = load_from_reader(file, market)?;
    info!(
        "Loaded {} of {} rows from {} ({} parse errors, {} unknown categories)",
        report.loaded_rows,
        report.total_rows,
        path.display(),
        report.parse_errors,
        report.unknown_categories
    );
    Ok((catalog, report))
}

/// Read and normalize CSV from any reader. Rows that fail to deserialize are
/// counted and skipped. Every kept entity carries its source row unchanged,
/// and the catalog keeps the header row, so exports can reproduce them.
pub fn load_from_reader<R: Read>(reader: R, market: Market) -> LoadResult<(Catalog, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut report = LoadReport::default();
    let mut unknown_labels: BTreeSet<String> = BTreeSet::new();
    let mut entities: Vec<Entity> = Vec::new();

    for result in rdr.records() {
        report.total_rows += 1;
        let parsed = result.and_then(|record| {
            let row: RawRow = record.deserialize(Some(&headers))?;
            Ok::<_, csv::Error>((row, record))
        });
        let (row, record) = match parsed {
            Ok(p) => p,
            Err(e) => {
                debug!("Skipping row {}: {}", report.total_rows, e);
                report.parse_errors += 1;
                continue;
            }
        };
        let source = record.iter().map(str::to_string).collect();
        let entity = normalize(row, source, market, &mut report, &mut unknown_labels);
        entities.push(entity);
    }

    if !unknown_labels.is_empty() {
        warn!(
            "{} rows carry categories unknown to the {} market, bucketed as Other: {:?}",
            report.unknown_categories, market, unknown_labels
        );
    }

    report.loaded_rows = entities.len();
    let headers = headers.iter().map(str::to_string).collect();
    Ok((Catalog::new(market, headers, entities), report))
}

/// Turn one raw row into an entity by applying each normalization rule.
fn normalize(
    row: RawRow,
    source: Vec<String>,
    market: Market,
    report: &mut LoadReport,
    unknown_labels: &mut BTreeSet<String>,
) -> Entity {
    let category_label = pick(market, row.tier.as_deref(), row.segment.as_deref());
    let category = normalize_category(market, category_label);
    if category == Category::Other {
        report.unknown_categories += 1;
        if let Some(label) = category_label {
            unknown_labels.insert(label.trim().to_string());
        }
    }

    let raw_flag = pick(market, row.is_shark.as_deref(), row.is_key_account.as_deref());
    let (flagged, derived) = resolve_flag(raw_flag, category);
    if derived {
        report.derived_flags += 1;
    }

    let neighborhood =
        normalize_neighborhood(row.neighborhood_norm.as_deref(), row.neighborhood_raw.as_deref());
    if neighborhood == NEIGHBORHOOD_UNKNOWN {
        report.sentinel_neighborhoods += 1;
    }

    let (capital, c1) = normalize_measure(row.capital.as_deref());
    let age_raw = pick(market, row.company_age.as_deref(), row.age.as_deref());
    let (age_years, c2) = normalize_measure(age_raw);
    report.clamped_measures += usize::from(c1) + usize::from(c2);

    let city_raw = match market {
        Market::Brokers => row.city_norm.as_deref().or(row.city_visual.as_deref()),
        Market::Health => row.city_visual.as_deref().or(row.city_norm.as_deref()),
    };

    Entity {
        id: row.id.unwrap_or_default().trim().to_string(),
        name: row
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "N/D".to_string()),
        state: normalize_state(row.state.as_deref()),
        city: normalize_city(city_raw),
        neighborhood,
        category,
        capital,
        age_years,
        flagged,
        threat_profile: row
            .threat_profile
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        source,
    }
}

/// Prefer the column native to `market`, falling back to the other variant's.
fn pick<'a>(market: Market, brokers: Option<&'a str>, health: Option<&'a str>) -> Option<&'a str> {
    let present = |v: Option<&'a str>| v.filter(|s| !s.trim().is_empty());
    match market {
        Market::Brokers => present(brokers).or(present(health)),
        Market::Health => present(health).or(present(brokers)),
    }
}

pub fn normalize_state(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_uppercase(),
        _ => GEO_UNKNOWN.to_string(),
    }
}

pub fn normalize_city(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => GEO_UNKNOWN.to_string(),
    }
}

/// Prefer the already-normalized column, otherwise derive from the raw one
/// (lowercased and trimmed), otherwise the sentinel.
pub fn normalize_neighborhood(normalized: Option<&str>, raw: Option<&str>) -> String {
    let clean = |v: Option<&str>| {
        v.map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && !NEIGHBORHOOD_PLACEHOLDERS.contains(&s.as_str()))
    };
    clean(normalized)
        .or_else(|| clean(raw))
        .unwrap_or_else(|| NEIGHBORHOOD_UNKNOWN.to_string())
}

pub fn normalize_category(market: Market, raw: Option<&str>) -> Category {
    raw.map_or(Category::Other, |label| Category::classify(market, label))
}

/// Returns the flag and whether it had to be derived from the category.
pub fn resolve_flag(raw: Option<&str>, category: Category) -> (bool, bool) {
    match parse_flag(raw) {
        Some(flag) => (flag, false),
        None => (category.is_flagged(), true),
    }
}

/// Returns the measure and whether it was clamped from a negative value.
pub fn normalize_measure(raw: Option<&str>) -> (f64, bool) {
    match parse_f64_safe(raw) {
        Some(v) if v < 0.0 => (0.0, true),
        Some(v) => (v, false),
        None => (0.0, false),
    }
}

struct CachedCatalog {
    path: PathBuf,
    market: Market,
    loaded_at: Instant,
    catalog: Arc<Catalog>,
}

// Only the raw catalog is memoized; every derived result is recomputed.
static CATALOG_CACHE: Lazy<Mutex<Option<CachedCatalog>>> = Lazy::new(|| Mutex::new(None));

/// Load through the process-wide cache, re-reading the file once `ttl` has
/// elapsed or when a different dataset/market is requested.
pub fn load_cached(path: &Path, market: Market, ttl: Duration) -> LoadResult<Arc<Catalog>> {
    let mut cache = CATALOG_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(cached) = cache.as_ref() {
        if cached.path == path && cached.market == market && cached.loaded_at.elapsed() < ttl {
            debug!("Reusing cached catalog for {}", path.display());
            return Ok(Arc::clone(&cached.catalog));
        }
    }
    let (catalog, _) = load_catalog(path, market)?;
    let catalog = Arc::new(catalog);
    *cache = Some(CachedCatalog {
        path: path.to_path_buf(),
        market,
        loaded_at: Instant::now(),
        catalog: Arc::clone(&catalog),
    });
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROKERS_CSV: &str = "\
cnpj_completo,razao_social,uf_norm,municipio_norm,bairro,tier_concorrente,capital_social,idade_empresa_anos,perfil_ameaca
1,Alpha Seguros, sp ,Campinas,Centro ,Micro Corretor,\"10,000\",3.5,Baixo
2,Beta Corretora,SP,Campinas,,Big Player / Multinacional,5000000,22,Alto
3,Gamma,RJ,Niteroi,Icarai,Cooperativa,-5,abc,
";

    #[test]
    fn normalizes_broker_rows() {
        let (catalog, report) = load_from_reader(BROKERS_CSV.as_bytes(), Market::Brokers).unwrap();
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.loaded_rows, 3);
        assert_eq!(catalog.len(), 3);

        let alpha = &catalog.entities()[0];
        assert_eq!(alpha.state, "SP");
        assert_eq!(alpha.neighborhood, "centro");
        assert_eq!(alpha.capital, 10_000.0);
        assert_eq!(alpha.category, Category::MicroBroker);
        assert!(!alpha.flagged);
        assert_eq!(alpha.threat_profile.as_deref(), Some("Baixo"));

        let beta = &catalog.entities()[1];
        assert_eq!(beta.category, Category::BigPlayer);
        assert!(beta.flagged);
        assert_eq!(beta.neighborhood, NEIGHBORHOOD_UNKNOWN);
    }

    #[test]
    fn source_rows_and_headers_are_kept_verbatim() {
        let (catalog, _) = load_from_reader(BROKERS_CSV.as_bytes(), Market::Brokers).unwrap();
        assert_eq!(catalog.headers()[2], "uf_norm");
        assert_eq!(catalog.headers().len(), 9);
        let alpha = &catalog.entities()[0];
        assert_eq!(alpha.source[2], " sp ");
        assert_eq!(alpha.source[4], "Centro ");
        assert_eq!(alpha.source[6], "10,000");
    }

    #[test]
    fn unknown_categories_and_bad_measures_are_counted() {
        let (catalog, report) = load_from_reader(BROKERS_CSV.as_bytes(), Market::Brokers).unwrap();
        let gamma = &catalog.entities()[2];
        assert_eq!(gamma.category, Category::Other);
        assert_eq!(gamma.capital, 0.0);
        assert_eq!(gamma.age_years, 0.0);
        assert_eq!(report.unknown_categories, 1);
        assert_eq!(report.clamped_measures, 1);
        assert_eq!(report.derived_flags, 3);
        assert_eq!(report.sentinel_neighborhoods, 1);
    }

    #[test]
    fn health_columns_prefer_visual_city_and_explicit_flag() {
        let csv = "\
cnpj_completo,razao_social,uf_norm,municipio_norm,municipio_visual,bairro_norm,segmento_saude,capital_social,idade,is_key_account
9,Clinica Sol,MG,belo horizonte,Belo Horizonte,savassi,Consultório/Pequeno,200000,12,1
";
        let (catalog, report) = load_from_reader(csv.as_bytes(), Market::Health).unwrap();
        let e = &catalog.entities()[0];
        assert_eq!(e.city, "Belo Horizonte");
        assert_eq!(e.category, Category::SmallPractice);
        assert!(e.flagged);
        assert_eq!(e.age_years, 12.0);
        assert_eq!(report.derived_flags, 0);
    }

    #[test]
    fn neighborhood_rule_prefers_normalized_then_raw_then_sentinel() {
        assert_eq!(normalize_neighborhood(Some("Moema"), Some("x")), "moema");
        assert_eq!(normalize_neighborhood(None, Some(" Pinheiros ")), "pinheiros");
        assert_eq!(
            normalize_neighborhood(Some("nao_informado"), Some("Lapa")),
            "lapa"
        );
        assert_eq!(normalize_neighborhood(None, None), NEIGHBORHOOD_UNKNOWN);
    }

    #[test]
    fn flag_rule_derives_only_when_missing() {
        assert_eq!(resolve_flag(Some("0"), Category::BigPlayer), (false, false));
        assert_eq!(resolve_flag(None, Category::BigPlayer), (true, true));
        assert_eq!(resolve_flag(Some("??"), Category::Hospital), (true, true));
    }

    #[test]
    fn geo_rules_fill_sentinels() {
        assert_eq!(normalize_state(Some(" rj")), "RJ");
        assert_eq!(normalize_state(None), GEO_UNKNOWN);
        assert_eq!(normalize_city(Some("  ")), GEO_UNKNOWN);
    }

    #[test]
    fn missing_dataset_is_fatal() {
        let err = load_catalog(Path::new("/nonexistent/radar.csv"), Market::Brokers).unwrap_err();
        assert!(matches!(err, LoadError::DatasetMissing { .. }));
    }
}
