//! # Medlab CLI (`medlab`)
//!
//! Runs analyses and searches over the catalog declared in the config
//! file, or serves the same operations over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! medlab --config ./config/medlab.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medlab items` | List the seeded catalog |
//! | `medlab analyze` | Analyse every seeded item concurrently and print the summary |
//! | `medlab search [TEXT]` | Faceted search, optionally after analysing |
//! | `medlab serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Analyse with a fixed seed and JSON progress on stderr
//! medlab analyze --seed 42 --progress json
//!
//! # Painkillers in the top tier
//! medlab search --analyze --category Painkiller --tier A+
//!
//! # Image-derived search
//! medlab search --analyze --image ./sample.png
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use medlab::catalog::seed_catalog;
use medlab::config::{self, Config};
use medlab::progress::{NoProgress, ProgressMode};
use medlab::service::LabService;
use medlab::{server, stats};
use medlab_core::models::CatalogItem;
use medlab_core::recognition::ImageInput;
use medlab_core::search::{Facet, Facets, SearchMode, SearchQuery};

/// Medlab: quality analysis jobs and faceted search over a medicine
/// sample catalog.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/medlab.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "medlab",
    about = "Quality analysis jobs and faceted search over a medicine sample catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/medlab.toml`. Built-in defaults and an empty
    /// catalog are used when the file does not exist.
    #[arg(long, global = true, default_value = "./config/medlab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalog items declared in the config file.
    Items {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Analyse every catalog item concurrently.
    ///
    /// Each item runs on its own job. Progress goes to stderr, the final
    /// catalog and summary to stdout.
    Analyze {
        /// Seed the metric RNG (overrides `analysis.seed`).
        #[arg(long)]
        seed: Option<u64>,

        /// Progress output: `off`, `human`, or `json`. Defaults to human on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search the catalog by text or by image, narrowed by facets.
    ///
    /// Facet values compare exactly; `any` leaves a facet unconstrained.
    Search {
        /// Case-insensitive text matched against name, manufacturer, and category.
        text: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// Quality tier: A+, A, B+, B, or C.
        #[arg(long)]
        tier: Option<String>,

        #[arg(long)]
        manufacturer: Option<String>,

        /// Item status: pending, processing, or completed.
        #[arg(long)]
        status: Option<String>,

        /// Search by image instead of text.
        #[arg(long, conflicts_with = "text")]
        image: Option<PathBuf>,

        /// Analyse the catalog before searching.
        #[arg(long)]
        analyze: bool,

        /// Seed the metric RNG (overrides `analysis.seed`).
        #[arg(long)]
        seed: Option<u64>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = read_config(&cli.config)?;

    match cli.command {
        Commands::Items { json } => {
            let service = LabService::from_config(&cfg, Arc::new(NoProgress));
            seed_catalog(service.store().as_ref(), &cfg).await?;
            let items = service.list_items().await?;
            print_items(&items, json)?;
        }
        Commands::Analyze {
            seed,
            progress,
            json,
        } => {
            if seed.is_some() {
                cfg.analysis.seed = seed;
            }
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let service = LabService::from_config(&cfg, mode.reporter());
            seed_catalog(service.store().as_ref(), &cfg).await?;
            analyze_all(&service).await?;

            let summary = service.summary().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                stats::print_items(&service.list_items().await?);
                println!();
                stats::print_summary(&summary);
            }
        }
        Commands::Search {
            text,
            category,
            tier,
            manufacturer,
            status,
            image,
            analyze,
            seed,
            json,
        } => {
            if seed.is_some() {
                cfg.analysis.seed = seed;
            }
            let facets = Facets {
                category: parse_facet(category.as_deref())?,
                quality_tier: parse_facet(tier.as_deref())?,
                manufacturer: parse_facet(manufacturer.as_deref())?,
                status: parse_facet(status.as_deref())?,
            };
            let query = match image {
                Some(path) => SearchQuery {
                    mode: SearchMode::ImageDerived,
                    image: Some(read_image(&path)?),
                    facets,
                    ..Default::default()
                },
                None => SearchQuery::text(text.unwrap_or_default()).with_facets(facets),
            };

            let service = LabService::from_config(&cfg, Arc::new(NoProgress));
            seed_catalog(service.store().as_ref(), &cfg).await?;
            if analyze {
                analyze_all(&service).await?;
            }
            let results = service.search(&query).await?;
            print_items(&results, json)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// Load the config file, or fall back to defaults when it does not exist.
fn read_config(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

/// Start a job for every Pending item and wait for all of them.
///
/// Failed jobs are reported and leave their item Pending; they do not stop
/// the others.
async fn analyze_all(service: &LabService) -> Result<()> {
    let mut handles = Vec::new();
    for item in service.list_items().await? {
        handles.push(service.start_analysis(&item.id).await?);
    }
    for handle in handles {
        if let Err(e) = handle.wait().await {
            warn!(error = %e, "analysis did not complete");
        }
    }
    Ok(())
}

fn parse_facet<T>(value: Option<&str>) -> Result<Facet<T>>
where
    T: std::str::FromStr<Err = medlab_core::CatalogError>,
{
    match value {
        None => Ok(Facet::Any),
        Some(v) => Ok(Facet::parse(v)?),
    }
}

fn read_image(path: &Path) -> Result<ImageInput> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(ImageInput::new(bytes))
}

fn print_items(items: &[CatalogItem], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        stats::print_items(items);
    }
    Ok(())
}
