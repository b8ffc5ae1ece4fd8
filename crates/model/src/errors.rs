//! Error types for model bundles, artifacts and inference

use std::path::PathBuf;

use roas_cohort::{CohortError, Level, Target};
use thiserror::Error;

use crate::canon::CanonicalError;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    /// No artifact for this (level, target); distinct from an empty query
    #[error("Model not trained for level={level} target={target}")]
    NotTrained { level: Level, target: Target },

    #[error("Model hash mismatch for {path}: expected {expected}, computed {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Schema version mismatch: model has {found}, running schema is {expected}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("Feature layout mismatch: model expects [{expected}], got [{found}]")]
    FeatureMismatch { expected: String, found: String },

    #[error("Bundle is for {found_level}/{found_target}, requested {level}/{target}")]
    WrongArtifact {
        level: Level,
        target: Target,
        found_level: Level,
        found_target: Target,
    },

    #[error("Missing value for feature {feature} in row {row}")]
    MissingFeature { row: usize, feature: String },

    #[error("Non-finite value for feature {feature}")]
    NonFinite { feature: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] CanonicalError),

    #[error(transparent)]
    Cohort(#[from] CohortError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
