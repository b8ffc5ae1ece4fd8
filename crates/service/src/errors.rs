use roas_cohort::{CohortError, Level, Target};
use roas_model::ModelError;
use roas_source::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or unsupported request; nothing was queried
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NoData(String),

    #[error("model for level={level} target={target} is not trained")]
    ModelNotTrained { level: Level, target: Target },

    #[error("data source error: {0}")]
    Source(SourceError),

    #[error("model error: {0}")]
    Model(ModelError),

    #[error("feature pipeline error: {0}")]
    Cohort(CohortError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotTrained { level, target } => ServiceError::ModelNotTrained { level, target },
            other => ServiceError::Model(other),
        }
    }
}

impl From<CohortError> for ServiceError {
    fn from(err: CohortError) -> Self {
        match err {
            CohortError::NoData(message) => ServiceError::NoData(message),
            CohortError::UnsupportedLevel(_) | CohortError::UnsupportedTarget(_) => {
                ServiceError::InvalidRequest(err.to_string())
            }
            other => ServiceError::Cohort(other),
        }
    }
}

impl From<SourceError> for ServiceError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidFilter(message) => ServiceError::InvalidRequest(message),
            other => ServiceError::Source(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_trained_stays_distinct() {
        let err: ServiceError = ModelError::NotTrained {
            level: Level::Mid,
            target: Target::Iap,
        }
        .into();
        assert!(matches!(err, ServiceError::ModelNotTrained { .. }));

        let err: ServiceError = CohortError::NoData("empty".to_string()).into();
        assert!(matches!(err, ServiceError::NoData(_)));
    }

    #[test]
    fn test_request_errors() {
        let err: ServiceError = CohortError::UnsupportedLevel("nano".to_string()).into();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        let err: ServiceError = SourceError::InvalidFilter("reversed".to_string()).into();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }
}
