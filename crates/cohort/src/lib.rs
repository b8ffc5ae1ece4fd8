//! Cohort aggregation and feature-derivation engine for ROAS forecasting
//!
//! The single source of truth for how raw cohort rows become model inputs.
//! Training and serving both run the same pipeline:
//!
//! ```text
//! CohortFrame → aggregate(level) → derive → select(level) → model → combine
//! ```
//!
//! Modules:
//! - `schema`: canonical columns, levels, targets and feature order
//! - `frame`: cohort rows and column-aware frames
//! - `ingest`: CSV reading
//! - `aggregate`: weighted re-aggregation to micro/mid/macro
//! - `derived`: growth ratios, payer rate, log transforms
//! - `select`: ordered feature matrix
//! - `combine`: cost-weighted combination of row predictions
//! - `split`: chronological train/test split
//!
//! Everything here is synchronous and free of I/O apart from `ingest`.

pub mod aggregate;
pub mod combine;
pub mod derived;
pub mod errors;
pub mod frame;
pub mod ingest;
pub mod schema;
pub mod select;
pub mod split;

pub use aggregate::aggregate;
pub use combine::combine;
pub use derived::{derive, DerivedFrame, DerivedValues};
pub use errors::{CohortError, Result};
pub use frame::{CohortFrame, CohortRow, DayValues};
pub use schema::{
    numeric_features, Column, Day, Derived, Dimension, Feature, Level, Metric, Target,
    GROWTH_EPSILON, SCHEMA_VERSION,
};
pub use select::{canonical_feature_names, select, FeatureMatrix, FeatureRow};
pub use split::{time_split, TimeSplit};

/// Aggregate, derive and select in one step; the path shared by training and serving
pub fn prepare(frame: &CohortFrame, level: Level) -> Result<(DerivedFrame, FeatureMatrix)> {
    let derived = derive(&aggregate(frame, level)?);
    let (matrix, _) = select(&derived, level)?;
    Ok((derived, matrix))
}

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
