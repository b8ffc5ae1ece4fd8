use roas_cohort::{CohortError, Level, Target};
use roas_model::ModelError;
use roas_source::SourceError;
use thiserror::Error;

/// Errors returned by the trainer
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("no trainable rows for level={level} target={target} after filtering")]
    EmptyTrainingSet { level: Level, target: Target },

    #[error(transparent)]
    Cohort(#[from] CohortError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
