//! Extractor Service - Downloads yearly PPM blocks from IBGE SIDRA
//!
//! Responsibilities:
//! - Request one block per year (table 74, municipalities of RO, all variables)
//! - Promote the first returned row to the header
//! - Write one `.xlsx` per year into the data directory
//! - Merge the yearly files into the consolidated file read by the loader
//!
//! Usage:
//!   # Download 2019 up to (not including) the current year:
//!   cargo run --bin extractor -- extract
//!
//!   # Merge the yearly files into <dataset>_FINAL.xlsx:
//!   cargo run --bin extractor -- consolidate --first-year 2019

mod error;
mod extract;
mod sidra;
mod workbook;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use extract::{consolidate, extract_years, Dataset};
use sidra::SidraClient;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "extractor", about = "Downloads yearly PPM blocks from IBGE SIDRA")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download one file per year
    Extract(YearRange),
    /// Merge yearly files into the consolidated file
    Consolidate(YearRange),
}

#[derive(clap::Args, Debug)]
struct YearRange {
    /// First year to include
    #[arg(long, default_value = "2019")]
    first_year: i32,

    /// Stop before this year (default: current year)
    #[arg(long)]
    until_year: Option<i32>,
}

impl YearRange {
    fn resolve(&self) -> Range<i32> {
        let until = self
            .until_year
            .unwrap_or_else(|| chrono::Local::now().year());
        self.first_year..until
    }
}

#[derive(Debug, Clone)]
struct Config {
    sidra_base_url: String,
    data_dir: PathBuf,
    rate_limit_ms: u64,
}

impl Config {
    fn from_env() -> Result<Self> {
        Ok(Self {
            sidra_base_url: std::env::var("SIDRA_BASE_URL")
                .unwrap_or_else(|_| sidra::DEFAULT_BASE_URL.to_string()),
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "./files".to_string()),
            ),
            rate_limit_ms: match std::env::var("RATE_LIMIT_MS") {
                Ok(v) => v.parse().context("RATE_LIMIT_MS must be a number of milliseconds")?,
                Err(_) => 1000,
            },
        })
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .init();
}

async fn run(args: Args, config: Config) -> Result<()> {
    let dataset = Dataset::ppm_animal_products();

    match args.command {
        Command::Extract(range) => {
            let years = range.resolve();
            if years.is_empty() {
                warn!(?years, "empty year range, nothing to download");
                return Ok(());
            }

            info!(
                ?years,
                dataset = %dataset.name,
                "downloading PPM animal-origin production by product type"
            );
            let client = SidraClient::new(&config.sidra_base_url)?;
            let report = extract_years(
                &client,
                &dataset,
                years,
                &config.data_dir,
                Duration::from_millis(config.rate_limit_ms),
            )
            .await
            .context("extraction aborted")?;

            println!("\n=== Extraction Summary ===");
            println!("Written: {}", report.written.len());
            println!("Failed: {}", report.failed.len());
            for (year, reason) in &report.failed {
                println!("  {}: {}", year, reason);
            }
        }
        Command::Consolidate(range) => {
            let report = consolidate(&dataset, range.resolve(), &config.data_dir)
                .context("consolidation failed")?;

            println!("\n=== Consolidation Complete ===");
            println!("Files merged: {}", report.files);
            println!("Rows: {}", report.rows);
            println!("Output: {}", report.output.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let args = Args::parse();

    let result = match Config::from_env() {
        Ok(config) => run(args, config).await,
        Err(e) => Err(e),
    };

    // Failures are reported, not turned into exit codes.
    if let Err(e) = result {
        error!("{:#}", e);
    }

    Ok(())
}
