//! Encoded training rows with labels and sample weights

use roas_cohort::FeatureMatrix;
use roas_model::FeatureEncoder;

use crate::errors::{Result, TrainerError};

#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    /// Fixed-point rows in encoder order
    pub features: Vec<Vec<i64>>,
    pub targets: Vec<f64>,
    pub weights: Vec<f64>,
    pub feature_count: usize,
}

impl TrainingSet {
    pub fn new(features: Vec<Vec<i64>>, targets: Vec<f64>, weights: Vec<f64>) -> Result<Self> {
        if features.len() != targets.len() || features.len() != weights.len() {
            return Err(TrainerError::Dataset(format!(
                "{} rows, {} targets, {} weights",
                features.len(),
                targets.len(),
                weights.len()
            )));
        }
        let feature_count = features.first().map_or(0, Vec::len);
        if let Some(bad) = features.iter().position(|r| r.len() != feature_count) {
            return Err(TrainerError::Dataset(format!(
                "row {bad} has {} features, expected {feature_count}",
                features[bad].len()
            )));
        }
        if let Some(bad) = targets.iter().position(|t| !t.is_finite()) {
            return Err(TrainerError::Dataset(format!("row {bad} has a non-finite target")));
        }
        if let Some(bad) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(TrainerError::Dataset(format!("row {bad} has an invalid weight")));
        }
        Ok(Self {
            features,
            targets,
            weights,
            feature_count,
        })
    }

    /// Encode `matrix` and attach labels and weights
    pub fn from_matrix(
        encoder: &FeatureEncoder,
        matrix: &FeatureMatrix,
        targets: Vec<f64>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        let features = encoder.encode(matrix)?;
        let mut set = Self::new(features, targets, weights)?;
        set.feature_count = encoder.width();
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Per-feature (min, max) over all rows
    pub fn feature_stats(&self) -> Vec<(i64, i64)> {
        (0..self.feature_count)
            .map(|col| {
                self.features.iter().fold((i64::MAX, i64::MIN), |(lo, hi), row| {
                    (lo.min(row[col]), hi.max(row[col]))
                })
            })
            .collect()
    }
}
