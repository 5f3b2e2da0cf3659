// Entry point and high-level CLI flow.
//
// Every subcommand runs the whole pipeline once for the selection given on
// the command line. `interactive` keeps a menu open and reuses the cached
// catalog between actions, the way the dashboard did between clicks.
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use market_radar::category::{Category, Market};
use market_radar::error::{ExportError, ExportResult};
use market_radar::filter::{city_options, state_options, FilterSelection, View};
use market_radar::loader::{load_cached, DEFAULT_CACHE_TTL};
use market_radar::output;
use market_radar::peers::DEFAULT_PEER_COUNT;
use market_radar::radar::{Radar, Scope};
use market_radar::rank::SortKey;
use market_radar::reports;
use market_radar::types::{AggregateRow, CategoryShareRow, GeoKey, HistogramRow, ListingRow, PeerRow};
use market_radar::util::{format_int, format_number};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DATASET_ENV: &str = "MARKET_RADAR_DATASET";

#[derive(Parser)]
#[command(name = "market-radar")]
#[command(about = "Competitive density and peer benchmarking over a state/city/neighborhood map", long_about = None)]
struct Cli {
    /// CSV dataset (falls back to $MARKET_RADAR_DATASET, then the market default)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
    #[arg(long, global = true, default_value = "brokers")]
    market: Market,
    /// State code; "ALL" for no restriction
    #[arg(long, global = true)]
    state: Option<String>,
    /// City within the state; "ALL" for no restriction
    #[arg(long, global = true)]
    city: Option<String>,
    /// Comma-separated category labels (default: every category)
    #[arg(long, global = true, value_delimiter = ',')]
    categories: Vec<String>,
    /// Select no category at all
    #[arg(long, global = true, conflicts_with = "categories")]
    no_categories: bool,
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true, default_value = ".")]
    out_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline figures for the selection
    Summary,
    /// State x category heatmap (top 15 states by volume)
    States,
    /// City matrix for the selected state
    Cities,
    /// Neighborhood x category breakdown for the selected city
    Neighborhoods,
    /// Category share of the selection
    Categories,
    /// Age histogram of the selection
    Maturity,
    /// Nearest peer cities of the selected city
    Peers {
        #[arg(long, default_value_t = DEFAULT_PEER_COUNT)]
        k: usize,
    },
    /// Ranked rivals / leads listing
    Listing {
        /// Sort keys like `capital:desc,age:desc` (default: the market's)
        #[arg(long, value_delimiter = ',')]
        sort: Vec<SortKey>,
        #[arg(long)]
        limit: Option<usize>,
        /// Do not narrow to the market's focus category
        #[arg(long)]
        all_categories: bool,
    },
    /// Write the printable dossier for the selected city
    Dossier,
    /// Write the filtered view as CSV
    Export,
    /// Menu-driven session
    Interactive,
}

fn resolve_dataset(cli_path: Option<&Path>, market: Market) -> PathBuf {
    if let Some(p) = cli_path {
        return p.to_path_buf();
    }
    if let Ok(p) = std::env::var(DATASET_ENV) {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    PathBuf::from(match market {
        Market::Brokers => "competitors_processed.csv",
        Market::Health => "leads_saude_processed.csv",
    })
}

fn parse_categories(market: Market, labels: &[String], none: bool) -> Result<Vec<Category>> {
    if none {
        return Ok(Vec::new());
    }
    if labels.is_empty() {
        return Ok(market.categories().to_vec());
    }
    labels
        .iter()
        .map(|l| {
            Category::lookup(market, l)
                .with_context(|| format!("'{}' is not a {} category", l.trim(), market))
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_summary(radar: &Radar, view: &View<'_>, json: bool) -> Result<()> {
    let s = reports::summarize(view);
    if json {
        return print_json(&s);
    }
    let market = radar.market();
    println!("Volume of {}: {}", market.entity_noun(), format_int(s.total));
    println!("Flagged ({}): {}", market.flagged_noun(), format_int(s.flagged));
    println!("Median capital: R$ {}", format_number(s.median_capital, 0));
    println!("Mean age: {} years\n", format_number(s.mean_age, 1));
    Ok(())
}

fn show_states(view: &View<'_>, json: bool) -> Result<()> {
    let tab = reports::state_heatmap(view);
    if json {
        return print_json(&tab);
    }
    println!("State saturation heatmap (top {} states)\n", reports::STATE_DISPLAY_LIMIT);
    println!("{}\n", output::render_cross_tab(&tab));
    Ok(())
}

fn show_cities(view: &View<'_>, state: &str, json: bool) -> Result<()> {
    let rows = reports::city_matrix(view);
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("Not enough cities above the noise floor in {} for a city matrix.\n", state);
        return Ok(());
    }
    let preview: Vec<AggregateRow> = rows.iter().map(AggregateRow::from).collect();
    output::preview_table(
        &format!("City matrix: {}", state),
        Some(&format!(
            "mean volume {}, mean flagged {}",
            format_number(reports::mean_of(&rows, |r| r.total as f64), 1),
            format_number(reports::mean_of(&rows, |r| r.flagged_count as f64), 1)
        )),
        &preview,
        reports::CITY_DISPLAY_LIMIT,
    );
    Ok(())
}

fn show_neighborhoods(view: &View<'_>, city: &str, json: bool) -> Result<()> {
    let tab = reports::neighborhood_breakdown(view);
    if json {
        return print_json(&tab);
    }
    if tab.is_empty() {
        println!("Not enough neighborhood resolution for {}.\n", city);
        return Ok(());
    }
    println!("Neighborhood breakdown: {}\n", city);
    println!("{}\n", output::render_cross_tab(&tab));
    Ok(())
}

fn show_categories(view: &View<'_>, json: bool) -> Result<()> {
    let shares = reports::category_share(view);
    if json {
        return print_json(&shares);
    }
    let rows: Vec<CategoryShareRow> = shares.iter().map(CategoryShareRow::from).collect();
    output::preview_table("Category share", None, &rows, rows.len());
    Ok(())
}

fn show_maturity(radar: &Radar, view: &View<'_>, json: bool) -> Result<()> {
    let profile = reports::maturity_profile(view, radar.market());
    if json {
        return print_json(&profile);
    }
    if profile.sample == 0 {
        println!("Not enough age data for a maturity histogram.\n");
        return Ok(());
    }
    let rows: Vec<HistogramRow> = profile
        .bins
        .iter()
        .filter(|b| b.count > 0)
        .map(HistogramRow::from)
        .collect();
    output::preview_table(
        &format!("Maturity curve (ages up to {})", profile.cap),
        Some(&format!(
            "{} under {} years, {} at or over {} years",
            profile.early_stage, profile.early_marker, profile.legacy, profile.legacy_marker
        )),
        &rows,
        rows.len(),
    );
    Ok(())
}

fn show_peers(radar: &Radar, selection: &FilterSelection, k: usize, json: bool) -> Result<()> {
    let (Some(state), Some(city)) = (selection.state(), selection.city()) else {
        bail!("--state and --city are required for peer benchmarking");
    };
    let peers = radar.peers_for(selection, k);
    if json {
        return print_json(&peers);
    }
    if peers.is_empty() {
        println!("Sample too small to benchmark {} against {}.\n", city, state);
        return Ok(());
    }
    let rows: Vec<PeerRow> = peers.iter().map(PeerRow::from).collect();
    output::preview_table(
        &format!("Peer benchmark: {} vs similar cities in {}", city, state),
        None,
        &rows,
        rows.len(),
    );
    Ok(())
}

fn show_listing(
    radar: &Radar,
    view: &View<'_>,
    sort: &[SortKey],
    limit: Option<usize>,
    all_categories: bool,
    json: bool,
) -> Result<()> {
    let market = radar.market();
    let listing = if sort.is_empty() && limit.is_none() && !all_categories {
        radar.default_listing(view)
    } else {
        let base = match (all_categories, market.listing_focus()) {
            (false, Some(category)) => view.only_category(category),
            _ => view.clone(),
        };
        let keys = if sort.is_empty() {
            market.listing_sort()
        } else {
            sort.to_vec()
        };
        radar.ranked_listing(&base, &keys, limit.unwrap_or_else(|| market.listing_limit()))
    };
    let rows: Vec<ListingRow> = listing.iter().map(ListingRow::from).collect();
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No matches for this selection.\n");
        return Ok(());
    }
    output::preview_table("Ranked listing", None, &rows, rows.len());
    Ok(())
}

/// Writes the dossier; failures are returned to the caller to report.
fn export_dossier(
    radar: &Radar,
    view: &View<'_>,
    selection: &FilterSelection,
    out_dir: &Path,
) -> ExportResult<PathBuf> {
    let (Some(state), Some(city)) = (selection.state(), selection.city()) else {
        return Err(ExportError::DossierNeedsCity);
    };
    let content = radar.dossier(view, city, state);
    let path = out_dir.join(format!("dossier_{}_{}.md", radar.market(), slug(city)));
    output::write_dossier(&path, &content)?;
    output::write_json(&path.with_extension("json"), &content)?;
    Ok(path)
}

fn export_csv(radar: &Radar, view: &View<'_>, selection: &FilterSelection, out_dir: &Path) -> ExportResult<PathBuf> {
    let scope = selection.state().map_or_else(|| "all".to_string(), slug);
    let path = out_dir.join(format!("{}_{}.csv", radar.market(), scope));
    output::export_view(&path, radar.catalog().headers(), view, radar.market())?;
    let cities: Vec<AggregateRow> = radar
        .geo_aggregate(view, GeoKey::City)
        .iter()
        .map(AggregateRow::from)
        .collect();
    let table_path = out_dir.join(format!("{}_{}_cities.csv", radar.market(), scope));
    output::write_csv(&table_path, &cities)?;
    info!("City table written to {}", table_path.display());
    Ok(path)
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Print the outcome of an export without ending the session.
fn report_export(what: &str, result: ExportResult<PathBuf>) {
    match result {
        Ok(path) => println!("{} written to {}.\n", what, path.display()),
        Err(e) => {
            error!("{} export failed: {}", what, e);
            eprintln!("Could not produce the {}: {}\n", what.to_lowercase(), e);
        }
    }
}

/// The panels the dashboard shows for a selection.
fn show_scope(radar: &Radar, selection: &FilterSelection, view: &View<'_>, json: bool) -> Result<()> {
    match (Scope::of(selection), selection.state(), selection.city()) {
        (Scope::City, Some(_), Some(city)) => {
            show_peers(radar, selection, DEFAULT_PEER_COUNT, json)?;
            show_neighborhoods(view, city, json)
        }
        (Scope::State, Some(state), _) => show_cities(view, state, json),
        _ => show_states(view, json),
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Ask for a new selection, listing the valid states and cities.
fn prompt_selection(radar: &Radar, current: &FilterSelection) -> FilterSelection {
    let market = radar.market();
    println!("States: ALL, {}", state_options(radar.catalog().entities()).join(", "));
    let state = read_line("State (blank keeps current): ");
    let mut next = if state.is_empty() {
        current.clone()
    } else {
        current.clone().with_state(Some(&state)).with_city(None)
    };
    if let Some(st) = next.state().map(str::to_string) {
        let cities = city_options(radar.catalog().entities(), &st);
        println!("Cities in {}: ALL, {}", st, cities.join(", "));
        let city = read_line("City (blank keeps current): ");
        if !city.is_empty() {
            next = next.with_city(Some(&city));
        }
    }
    let labels: Vec<&str> = market.categories().iter().map(|c| c.label()).collect();
    println!("Categories: {}", labels.join(" | "));
    let cats = read_line("Categories, '|' separated (blank keeps current, '-' for none): ");
    if cats == "-" {
        next.categories = Vec::new();
    } else if !cats.is_empty() {
        let parsed: Vec<Category> = cats
            .split('|')
            .filter_map(|l| Category::lookup(market, l))
            .collect();
        if parsed.is_empty() {
            println!("No known category in '{}'; keeping the current ones.", cats);
        } else {
            next.categories = parsed;
        }
    }
    next
}

fn run_interactive(dataset: &Path, market: Market, mut selection: FilterSelection, out_dir: &Path) -> Result<()> {
    loop {
        println!("Market radar ({})", market);
        println!("[1] Load the dataset");
        println!("[2] Change selection");
        println!("[3] Show panels");
        println!("[4] Ranked listing");
        println!("[5] Export CSV and dossier");
        println!("[0] Exit\n");
        let choice = read_choice();
        if choice == "0" {
            println!("Exiting the program.");
            return Ok(());
        }
        // A missing dataset stops the session before anything is computed.
        let catalog = load_cached(dataset, market, DEFAULT_CACHE_TTL)
            .with_context(|| format!("failed to load {}", dataset.display()))?;
        let radar = Radar::new(catalog);
        match choice.as_str() {
            "1" => println!("{} rows ready.\n", format_int(radar.catalog().len())),
            "2" => {
                selection = prompt_selection(&radar, &selection);
                println!();
            }
            "3" => {
                let view = radar.filtered_view(&selection);
                if view.is_empty() {
                    println!("No data for this selection. Try widening it.\n");
                    continue;
                }
                show_summary(&radar, &view, false)?;
                show_scope(&radar, &selection, &view, false)?;
                show_categories(&view, false)?;
                show_maturity(&radar, &view, false)?;
            }
            "4" => {
                let view = radar.filtered_view(&selection);
                show_listing(&radar, &view, &[], None, false, false)?;
            }
            "5" => {
                let view = radar.filtered_view(&selection);
                report_export("CSV", export_csv(&radar, &view, &selection, out_dir));
                report_export("Dossier", export_dossier(&radar, &view, &selection, out_dir));
            }
            _ => println!("Invalid choice. Please enter 0 to 5.\n"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let market = cli.market;
    let dataset = resolve_dataset(cli.dataset.as_deref(), market);
    let categories = parse_categories(market, &cli.categories, cli.no_categories)?;
    let selection = FilterSelection::all(market)
        .with_state(cli.state.as_deref())
        .with_city(cli.city.as_deref())
        .with_categories(categories);

    if let Commands::Interactive = cli.command {
        return run_interactive(&dataset, market, selection, &cli.out_dir);
    }

    let catalog = load_cached(&dataset, market, DEFAULT_CACHE_TTL)
        .with_context(|| format!("failed to load {}", dataset.display()))?;
    let radar = Radar::new(catalog);
    let view = radar.filtered_view(&selection);
    info!(
        "Selection state={:?} city={:?} keeps {} of {} rows",
        selection.state(),
        selection.city(),
        view.len(),
        radar.catalog().len()
    );

    let json = cli.json;
    match cli.command {
        Commands::Summary => show_summary(&radar, &view, json)?,
        Commands::States => show_states(&view, json)?,
        Commands::Cities => match selection.state() {
            Some(state) => show_cities(&view, state, json)?,
            None => bail!("--state is required for the city matrix"),
        },
        Commands::Neighborhoods => match selection.city() {
            Some(city) => show_neighborhoods(&view, city, json)?,
            None => bail!("--state and --city are required for the neighborhood breakdown"),
        },
        Commands::Categories => show_categories(&view, json)?,
        Commands::Maturity => show_maturity(&radar, &view, json)?,
        Commands::Peers { k } => show_peers(&radar, &selection, k, json)?,
        Commands::Listing {
            sort,
            limit,
            all_categories,
        } => show_listing(&radar, &view, &sort, limit, all_categories, json)?,
        Commands::Dossier => {
            report_export("Dossier", export_dossier(&radar, &view, &selection, &cli.out_dir))
        }
        Commands::Export => report_export("CSV", export_csv(&radar, &view, &selection, &cli.out_dir)),
        Commands::Interactive => unreachable!("handled above"),
    }
    Ok(())
}
