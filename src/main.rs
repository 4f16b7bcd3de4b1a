//! facetdb <data.json> [expression] [--facets facets.json]
//!
//! Loads a data file, then evaluates an expression over every item and/or
//! builds a collection from a list of facet configurations and prints what
//! each facet would show.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use facetdb::collection::{Collection, Root};
use facetdb::config::Settings;
use facetdb::database::Database;
use facetdb::expression::Expression;
use facetdb::facet::{FacetConfig, FacetView};
use facetdb::{FacetError, Result, loader};

const USAGE: &str = "usage: facetdb <data.json> [expression] [--facets facets.json]";

struct Args {
    data: PathBuf,
    expression: Option<String>,
    facets: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut data = None;
    let mut expression = None;
    let mut facets = None;
    while let Some(arg) = args.next() {
        if arg == "--facets" {
            let path = args.next().ok_or_else(|| FacetError::Config(USAGE.to_string()))?;
            facets = Some(PathBuf::from(path));
        } else if data.is_none() {
            data = Some(PathBuf::from(arg));
        } else if expression.is_none() {
            expression = Some(arg);
        } else {
            return Err(FacetError::Config(USAGE.to_string()));
        }
    }
    let data = data.ok_or_else(|| FacetError::Config(USAGE.to_string()))?;
    Ok(Args { data, expression, facets })
}

fn print_view(label: &str, view: &FacetView) {
    println!("{label}:");
    match view {
        FacetView::List { choices, missing } => {
            for choice in choices {
                let mark = if choice.selected { "*" } else { " " };
                println!("  {mark} {} ({})", choice.label, choice.count);
            }
            if missing.count > 0 || missing.selected {
                println!("    {} ({})", missing.label, missing.count);
            }
        }
        FacetView::Numeric { interval, buckets, missing } => {
            println!("  width {interval}");
            for bucket in buckets {
                let mark = if bucket.selected { "*" } else { " " };
                println!("  {mark} [{}, {}) ({})", bucket.from, bucket.to, bucket.count);
            }
            if *missing > 0 {
                println!("    missing ({missing})");
            }
        }
        FacetView::Slider { domain, selected, missing } => {
            match domain {
                Some(domain) => println!("  domain [{}, {}]", domain.min, domain.max),
                None => println!("  no values"),
            }
            if let Some(selected) = selected {
                println!("  selected [{}, {}]", selected.min, selected.max);
            }
            if *missing > 0 {
                println!("  missing ({missing})");
            }
        }
        FacetView::Search { text, matches } => {
            println!("  {:?} matches {matches}", text.as_deref().unwrap_or(""));
        }
    }
}

fn run(settings: Settings) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let mut database = Database::new();
    let report = loader::load_file(&args.data, &mut database)?;
    println!(
        "loaded {} items, {} facts, {} errors",
        report.items,
        report.facts,
        report.errors.len()
    );
    for e in &report.errors {
        println!("  {e}");
    }

    if let Some(text) = &args.expression {
        let expression = Expression::parse(text)?;
        let values = expression.evaluate_items(database.all_items(), &database)?;
        println!("{expression}: {} {} value(s)", values.size(), values.value_type());
        for key in values.keys() {
            println!("  {key}");
        }
    }

    if let Some(path) = &args.facets {
        let text = fs::read_to_string(path).map_err(|e| FacetError::Load(format!("{}: {e}", path.display())))?;
        let configs: Vec<FacetConfig> = serde_json::from_str(&text)?;
        let mut collection = Collection::with_settings(Root::All, settings, &database);
        for config in &configs {
            // a broken facet is left out, the others still work
            if let Err(e) = collection.add_facet(config, &database) {
                warn!(facet = config.id.as_str(), error = %e, "facet skipped");
                println!("facet {} skipped: {e}", config.id);
            }
        }
        println!(
            "{} of {} items",
            collection.count_restricted_items(),
            collection.root_items().len()
        );
        for (id, facet) in collection.facets() {
            print_view(facet.label(), &collection.update(id, &database)?);
            let unprocessed = collection.unprocessed_items(id)?;
            if !unprocessed.is_empty() {
                println!("  could not process {}", database.item_ids(unprocessed).join(", "));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "facetdb failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
