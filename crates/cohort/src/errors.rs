//! Error types for the cohort engine

use thiserror::Error;

/// Structural errors raised by aggregation, derivation, selection and ingestion.
///
/// Numeric degeneracy (a zero denominator) is never an error here: it is
/// carried as a missing value in the resulting rows.
#[derive(Error, Debug)]
pub enum CohortError {
    /// Level name outside micro/mid/macro
    #[error("Unsupported aggregation level: {0}")]
    UnsupportedLevel(String),

    /// Target name outside iap/iaa
    #[error("Unsupported forecast target: {0}")]
    UnsupportedTarget(String),

    /// A column the operation depends on is absent from the frame
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Nothing left to work on
    #[error("No data: {0}")]
    NoData(String),

    /// Prediction vector and feature matrix disagree on row count
    #[error("Prediction count {predictions} does not match feature rows {rows}")]
    ShapeMismatch { predictions: usize, rows: usize },

    /// Invalid caller-supplied parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed input record
    #[error("Record {record}: {message}")]
    Parse { record: u64, message: String },

    /// CSV reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cohort operations
pub type Result<T> = std::result::Result<T, CohortError>;
