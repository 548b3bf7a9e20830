//! # Coastal Tides Entry Point
//!
//! Loads the configuration and the harmonic tide model, computes the tide
//! columns for every coastal site and writes one JSON table per site. A missing
//! tide model is not fatal: tables are still produced, without tide columns.


use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;
use coastal_tides::config::{Config, CONFIG_FILE};
use coastal_tides::{load_catalog, pipeline};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Tide heights and high/low tide times for coastal forecast sites.
#[derive(Parser, Debug)]
#[command(name = "coastal-tides")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Forecast start date (YYYY-MM-DD), defaults to today.
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Override the tide model path from the configuration.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Print the tables to stdout instead of writing files.
    #[arg(long)]
    stdout: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_from_path(&cli.config);
    if let Some(model) = cli.model {
        config.tides.model_path = model;
    }
    let date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    info!(%date, sites = config.sites.len(), "starting tide forecast");

    // Tide data is optional: sites still get tables without it
    let catalog = match load_catalog(&config.tides.model_path, config.tides.n_constituents) {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            warn!("continuing without tides: {e}");
            None
        }
    };

    let tables = pipeline::run(catalog.as_ref(), date, &config)?;

    if cli.stdout {
        let json = serde_json::to_string_pretty(&tables).context("serialize site tables")?;
        println!("{json}");
        return Ok(());
    }

    let paths = pipeline::write_tables(&tables, &config.forecast.output_dir)?;
    info!(
        count = paths.len(),
        dir = %config.forecast.output_dir.display(),
        "saved site tables"
    );
    Ok(())
}
