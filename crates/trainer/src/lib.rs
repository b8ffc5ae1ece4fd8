//! ROAS trainer - deterministic offline GBDT training
//!
//! Fits one [`roas_model::ModelBundle`] per (level, target) from cohort
//! rows, using the same aggregation and feature path as serving. Also
//! loads cohort CSVs into ClickHouse for the service to query.

pub mod cart;
pub mod cli;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod trainer;

pub use cart::{CartBuilder, TreeConfig, MAX_TREE_DEPTH};
pub use cli::ClickHouseArgs;
pub use dataset::TrainingSet;
pub use deterministic::SplitTieBreaker;
pub use errors::{Result, TrainerError};
pub use loader::{load_csv, load_frame};
pub use pipeline::{
    labelled_matrix, LabelledMatrix, PairOutcome, PairReport, PairStatus, TrainingPipeline,
    DEFAULT_TEST_FRAC,
};
pub use trainer::{GbdtConfig, GbdtTrainer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
