//! roas-train - fit one model bundle per (level, target)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use roas_model::{Loss, ModelStore};
use roas_source::{ClickHouseSource, CohortSource, CsvSource, RowFilter};
use roas_trainer::{
    ClickHouseArgs, GbdtConfig, PairStatus, TrainingPipeline, TreeConfig, DEFAULT_TEST_FRAC,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    Csv,
    Clickhouse,
}

#[derive(Parser, Debug)]
#[command(name = "roas-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train ROAS forecast models for every level and target", long_about = None)]
struct Args {
    /// Where cohort rows come from
    #[arg(long, env = "ROAS_SOURCE", value_enum, default_value = "csv")]
    source: SourceKind,

    /// Cohort CSV export (csv source)
    #[arg(short, long, env = "ROAS_CSV_PATH")]
    input: Option<PathBuf>,

    #[command(flatten)]
    clickhouse: ClickHouseArgs,

    /// Output directory for `{level}_{target}.json` artifacts
    #[arg(short, long, env = "MODEL_DIR", default_value = "models")]
    output: PathBuf,

    /// Number of boosting rounds
    #[arg(long, env = "TRAIN_TREES", default_value_t = 1500)]
    trees: usize,

    #[arg(long, env = "TRAIN_LR", default_value_t = 0.03)]
    learning_rate: f64,

    #[arg(long, env = "TRAIN_DEPTH", default_value_t = 8)]
    max_depth: usize,

    #[arg(long, default_value_t = 1)]
    min_samples_leaf: usize,

    /// Candidate thresholds per feature and node
    #[arg(long, default_value_t = 64)]
    max_bins: usize,

    /// mae or mse
    #[arg(long, default_value = "mae")]
    loss: Loss,

    /// Share of distinct days held out for evaluation
    #[arg(long, default_value_t = DEFAULT_TEST_FRAC)]
    test_frac: f64,

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

    info!("ROAS trainer v{}", env!("CARGO_PKG_VERSION"));

    let source: Box<dyn CohortSource> = match args.source {
        SourceKind::Csv => {
            let path = args
                .input
                .as_ref()
                .context("--input (or ROAS_CSV_PATH) is required for the csv source")?;
            Box::new(CsvSource::from_path(path).context("failed to load cohort csv")?)
        }
        SourceKind::Clickhouse => Box::new(
            ClickHouseSource::new(args.clickhouse.config())
                .context("invalid ClickHouse configuration")?,
        ),
    };

    let frame = source
        .query(&RowFilter::all())
        .await
        .with_context(|| format!("failed to read cohorts from {}", source.name()))?;
    if frame.is_empty() {
        bail!("cohort table is empty, load data first");
    }
    info!(rows = frame.len(), source = source.name(), "loaded cohort rows");

    let config = GbdtConfig {
        num_trees: args.trees,
        learning_rate: args.learning_rate,
        loss: args.loss,
        tree: TreeConfig {
            max_depth: args.max_depth,
            min_samples_leaf: args.min_samples_leaf,
            max_bins: args.max_bins,
            ..TreeConfig::default()
        },
    };
    config.validate()?;
    info!(
        trees = config.num_trees,
        learning_rate = config.learning_rate,
        max_depth = config.tree.max_depth,
        loss = %config.loss,
        "training configuration"
    );

    let store = ModelStore::new(&args.output);
    let pipeline = TrainingPipeline::new(config, args.test_frac);
    let reports = tokio::task::spawn_blocking(move || pipeline.run(&frame, &store))
        .await
        .context("training task panicked")?;

    let mut failed = 0;
    for report in &reports {
        match &report.status {
            PairStatus::Saved { hash, holdout_mae } => {
                info!(level = %report.level, target = %report.target, %hash, holdout_mae = ?holdout_mae, "saved")
            }
            PairStatus::Skipped => {
                warn!(level = %report.level, target = %report.target, "skipped: no finite target")
            }
            PairStatus::Failed(reason) => {
                failed += 1;
                warn!(level = %report.level, target = %report.target, %reason, "failed");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} level/target pairs failed", reports.len());
    }
    info!(output = %args.output.display(), "training completed");
    Ok(())
}
