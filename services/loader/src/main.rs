//! Usage:
//!   cargo run --bin loader -- ensure-schema
//!   cargo run --bin loader -- load [--file files/PPM_RO_PRODUCAO_ORIGEM_ANIMAL_FINAL.xlsx]
//!   cargo run --bin loader -- join [--replace]
//!   cargo run --bin loader -- run [--replace-map]
//!   cargo run --bin loader -- reset --yes

use anyhow::Result;
use clap::{Parser, Subcommand};
use loader::config::Config;
use loader::load::LoadOutcome;
use loader::pipeline::{Pipeline, StageOutcome};
use loader::transform::{transform, TransformedTable};
use loader::workbook::read_consolidated;
use std::path::PathBuf;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loader", about = "Loads PPM statistics into PostGIS and builds the map table")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the destination table if it does not exist
    EnsureSchema,
    /// Append the consolidated file to the destination table
    Load {
        /// Consolidated workbook (default: DATA_DIR/CONSOLIDATED_FILE)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Build the map table from the destination and boundary tables
    Join {
        /// Drop an existing map table first
        #[arg(long, default_value = "false")]
        replace: bool,
    },
    /// ensure-schema, load and join in order
    Run {
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, default_value = "false")]
        replace_map: bool,
    },
    /// Truncate the destination table and drop the map table
    Reset {
        /// Confirm the destructive reset
        #[arg(long, default_value = "false")]
        yes: bool,
    },
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

/// Read and transform the consolidated file before touching the database.
fn read_input(config: &Config, file: Option<&PathBuf>) -> Result<TransformedTable> {
    let path = file.cloned().unwrap_or_else(|| config.consolidated_path());
    info!(file = %path.display(), "processing consolidated file");

    let table = transform(read_consolidated(&path)?);
    info!(rows = table.rows.len(), "rows transformed");
    Ok(table)
}

async fn execute(
    pipeline: &Pipeline<'_>,
    command: &Command,
    input: Option<&TransformedTable>,
) -> Result<()> {
    match (command, input) {
        (Command::EnsureSchema, _) => {
            let outcome = pipeline.ensure_schema().await?;
            println!("Destination table: {:?}", outcome);
        }
        (Command::Load { .. }, Some(table)) => match pipeline.load(table).await? {
            LoadOutcome::NoRows => println!("No rows found in the consolidated file"),
            LoadOutcome::Appended(n) => println!("Rows loaded: {}", n),
        },
        (Command::Join { replace }, _) => {
            let report = pipeline.spatial_join(*replace).await?;
            println!("Map rows: {}", report.map_rows);
            println!("Excluded (no boundary): {}", report.excluded());
        }
        (Command::Run { replace_map, .. }, Some(table)) => {
            for outcome in pipeline.run(table, *replace_map).await? {
                match outcome {
                    StageOutcome::Schema(o) => println!("Destination table: {:?}", o),
                    StageOutcome::Load(LoadOutcome::NoRows) => println!("Rows loaded: 0"),
                    StageOutcome::Load(LoadOutcome::Appended(n)) => println!("Rows loaded: {}", n),
                    StageOutcome::Join(r) => {
                        println!("Map rows: {} ({} excluded)", r.map_rows, r.excluded())
                    }
                    StageOutcome::Reset(_) => {}
                }
            }
        }
        (Command::Reset { .. }, _) => {
            let report = pipeline.reset().await?;
            println!("Rows removed: {}", report.truncated_rows);
            println!("Map table dropped: {}", report.map_dropped);
        }
        (Command::Load { .. } | Command::Run { .. }, None) => {
            anyhow::bail!("no input was read for {:?}", command)
        }
    }
    Ok(())
}

async fn run(args: Args, config: Config) -> Result<()> {
    if let Command::Reset { yes: false } = args.command {
        warn!("reset is destructive; pass --yes to confirm");
        return Ok(());
    }

    let input = match &args.command {
        Command::Load { file } | Command::Run { file, .. } => {
            Some(read_input(&config, file.as_ref())?)
        }
        _ => None,
    };

    let pipeline = Pipeline::connect(&config).await?;
    let result = execute(&pipeline, &args.command, input.as_ref()).await;
    pipeline.close().await;
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let args = Args::parse();

    println!("=== PPM Loader ===");

    let result = match Config::from_env() {
        Ok(config) => run(args, config).await,
        Err(e) => Err(e),
    };

    // Failures are reported, not turned into exit codes.
    if let Err(e) = result {
        error!("{:#}", e);
    }

    info!("processing finished");
    Ok(())
}
