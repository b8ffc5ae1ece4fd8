//! roas-load - create the cohort table and bulk-insert a cohort CSV

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use roas_source::ClickHouseSource;
use roas_trainer::{load_csv, ClickHouseArgs};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "roas-load")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Load a cohort CSV into ClickHouse", long_about = None)]
struct Args {
    /// Cohort CSV export
    #[arg(long, env = "ROAS_CSV_PATH")]
    csv: PathBuf,

    #[command(flatten)]
    clickhouse: ClickHouseArgs,

    /// Do not issue CREATE DATABASE / CREATE TABLE
    #[arg(long)]
    skip_schema: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = args.clickhouse.config();
    info!(url = %config.url, database = %config.database, table = %config.table, "loading cohorts");
    let source = ClickHouseSource::new(config).context("invalid ClickHouse configuration")?;

    let inserted = load_csv(&source, &args.csv, !args.skip_schema)
        .await
        .with_context(|| format!("failed to load {}", args.csv.display()))?;
    info!(inserted, "done");
    Ok(())
}
