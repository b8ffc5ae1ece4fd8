//! The persisted unit: one trained ensemble per (level, target)

use std::fmt;
use std::str::FromStr;

use roas_cohort::{FeatureMatrix, Level, Target, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

use crate::canon::{hash_canonical_hex, to_canonical_json};
use crate::encoder::FeatureEncoder;
use crate::ensemble::Ensemble;
use crate::errors::{ModelError, Result};

/// Boosting objective
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    SquaredError,
    #[default]
    AbsoluteError,
}

impl Loss {
    pub fn as_str(self) -> &'static str {
        match self {
            Loss::SquaredError => "squared_error",
            Loss::AbsoluteError => "absolute_error",
        }
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Loss {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "squared_error" | "mse" | "rmse" => Ok(Loss::SquaredError),
            "absolute_error" | "mae" => Ok(Loss::AbsoluteError),
            other => Err(format!("unknown loss '{other}', expected mae or mse")),
        }
    }
}

/// How the bundle was produced; informational only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingSummary {
    pub loss: Loss,
    pub num_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Rows removed for a missing feature or non-positive cost
    pub dropped_rows: usize,
    pub cut_date_idx: Option<i64>,
    /// Cost-weighted MAE on the chronological hold-out
    pub holdout_mae: Option<f64>,
    /// RFC 3339
    pub trained_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelBundle {
    pub schema_version: u32,
    pub level: Level,
    pub target: Target,
    /// Positional column names the ensemble was fitted on
    pub feature_names: Vec<String>,
    pub encoder: FeatureEncoder,
    pub ensemble: Ensemble,
    pub summary: TrainingSummary,
}

impl ModelBundle {
    pub fn new(
        level: Level,
        target: Target,
        encoder: FeatureEncoder,
        ensemble: Ensemble,
        summary: TrainingSummary,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            level,
            target,
            feature_names: encoder.feature_names(),
            encoder,
            ensemble,
            summary,
        }
    }

    /// Internal consistency plus compatibility with the running schema
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ModelError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        if self.feature_names != self.encoder.feature_names() {
            return Err(ModelError::ValidationFailed(
                "feature names disagree with encoder layout".to_string(),
            ));
        }
        self.ensemble.validate(self.encoder.width())
    }

    /// Fail unless `names` is exactly the fitted column order
    pub fn check_layout(&self, names: &[String]) -> Result<()> {
        if names != self.feature_names.as_slice() {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_names.join(","),
                found: names.join(","),
            });
        }
        Ok(())
    }

    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(to_canonical_json(self)?)
    }

    pub fn hash_hex(&self) -> Result<String> {
        Ok(hash_canonical_hex(self)?)
    }
}

/// Anything that turns a feature matrix into one prediction per row
pub trait Regressor {
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>>;
}

impl Regressor for ModelBundle {
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        self.check_layout(&matrix.feature_names())?;
        Ok(self
            .encoder
            .encode(matrix)?
            .iter()
            .map(|row| self.ensemble.predict(row))
            .collect())
    }
}
