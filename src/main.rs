pub mod config;
pub mod data;
pub mod filter;
pub mod pipeline;
pub mod proximity;
pub mod render;
pub mod server;
pub mod store;
pub mod types;
pub mod view;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{AppConfig, RegionMode};
use filter::{FilterState, RegionFilter, Selection};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the filtered clients to a standalone HTML map
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Sales representative, or "Tous" for everyone
        #[arg(long, default_value = filter::ALL)]
        representative: String,
        /// Region to keep; repeat in multi-select mode
        #[arg(long)]
        region: Vec<String>,
        /// Company to center on, showing its nearby companies
        #[arg(long)]
        company: Option<String>,
        /// Overrides `output.html`
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Overrides `output.geojson`
        #[arg(long, value_name = "FILE")]
        geojson: Option<PathBuf>,
    },
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            config,
            representative,
            region,
            company,
            out,
            geojson,
        } => {
            let mut app_config = AppConfig::load_from_file(&config)?;
            if let Some(out) = out {
                app_config.output.html = out;
            }
            if geojson.is_some() {
                app_config.output.geojson = geojson;
            }

            let store = data::load_records(&app_config.input.data_csv, &app_config.input.columns)
                .context("Cannot render without a client table")?;

            let state = FilterState::new(
                Selection::parse(Some(representative.as_str())),
                region_filter(app_config.filters.region_mode, region),
                company.as_deref(),
            );
            let instr = pipeline::run(&store, &state, &app_config.view);

            for line in instr.summary_lines() {
                println!("{line}");
            }
            render::write_outputs(&app_config.output, &instr)?;
        }
        Commands::Serve { config } => {
            let app_config = AppConfig::load_from_file(&config)?;

            // A missing configured table is not fatal here: users can still upload one.
            let store = match data::load_records(&app_config.input.data_csv, &app_config.input.columns) {
                Ok(store) => Some(store),
                Err(e @ data::LoadError::MissingSource { .. }) => {
                    warn!(error = %e, "starting without a default client table");
                    None
                }
                Err(e) => return Err(e.into()),
            };
            info!(rows = store.as_ref().map_or(0, |s| s.len()), "client table ready");

            server::start_server(app_config, store).await?;
        }
    }

    Ok(())
}

fn region_filter(mode: RegionMode, regions: Vec<String>) -> RegionFilter {
    match mode {
        RegionMode::Multi => RegionFilter::Multi(
            regions
                .into_iter()
                .filter(|r| !r.trim().is_empty() && r != filter::ALL)
                .collect(),
        ),
        RegionMode::Single => {
            if regions.len() > 1 {
                warn!(count = regions.len(), "single-select regions: using the first --region only");
            }
            RegionFilter::Single(Selection::parse(regions.first().map(String::as_str)))
        }
    }
}
