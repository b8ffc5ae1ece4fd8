use roas_cohort::CohortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid row filter: {0}")]
    InvalidFilter(String),

    #[error("invalid source configuration: {0}")]
    Config(String),

    #[error("query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not read cohort rows: {0}")]
    Cohort(#[from] CohortError),
}

pub type Result<T> = std::result::Result<T, SourceError>;
