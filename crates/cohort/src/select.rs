//! Feature matrix assembly
//!
//! Column order is positional for the model: categorical dimensions of the
//! level first, then [`numeric_features`] intersected with what the frame
//! carries. The order depends only on the level and the frame's column set,
//! never on row content or row order.

use serde::{Deserialize, Serialize};

use crate::derived::DerivedFrame;
use crate::errors::{CohortError, Result};
use crate::schema::{numeric_features, Column, Dimension, Feature, Level, REQUIRED_COLUMNS};

/// One model input row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Labels of the categorical columns; `None` is a legitimate category
    pub categories: Vec<Option<String>>,
    /// Numeric values; `None` is a missing value
    pub numeric: Vec<Option<f64>>,
}

impl FeatureRow {
    pub fn is_complete(&self) -> bool {
        self.numeric.iter().all(Option::is_some)
    }
}

/// Ordered, schema-stable model input
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    categorical: Vec<Dimension>,
    numeric: Vec<Feature>,
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    /// Assemble a matrix directly; every row must match the declared widths
    pub fn new(categorical: Vec<Dimension>, numeric: Vec<Feature>, rows: Vec<FeatureRow>) -> Result<Self> {
        if let Some(bad) = rows
            .iter()
            .position(|r| r.categories.len() != categorical.len() || r.numeric.len() != numeric.len())
        {
            return Err(CohortError::InvalidParameter(format!(
                "feature row {bad} does not match {} categorical + {} numeric columns",
                categorical.len(),
                numeric.len()
            )));
        }
        Ok(Self {
            categorical,
            numeric,
            rows,
        })
    }

    pub fn categorical(&self) -> &[Dimension] {
        &self.categorical
    }

    pub fn numeric(&self) -> &[Feature] {
        &self.numeric
    }

    pub fn categorical_names(&self) -> Vec<&'static str> {
        self.categorical.iter().map(|d| d.name()).collect()
    }

    /// All column names in positional order
    pub fn feature_names(&self) -> Vec<String> {
        self.categorical
            .iter()
            .map(|d| d.name().to_string())
            .chain(self.numeric.iter().map(Feature::name))
            .collect()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of a numeric column, or `None` when the matrix lacks it
    pub fn numeric_column(&self, feature: Feature) -> Option<Vec<Option<f64>>> {
        let idx = self.numeric.iter().position(|f| *f == feature)?;
        Some(self.rows.iter().map(|r| r.numeric[idx]).collect())
    }

    /// Split off rows with a missing numeric value; returns the kept matrix
    /// and the number of rows dropped
    pub fn drop_incomplete(self) -> (Self, usize) {
        let before = self.rows.len();
        let rows: Vec<FeatureRow> = self.rows.into_iter().filter(FeatureRow::is_complete).collect();
        let dropped = before - rows.len();
        (
            Self {
                categorical: self.categorical,
                numeric: self.numeric,
                rows,
            },
            dropped,
        )
    }

    /// Keep rows whose index satisfies `predicate`
    pub fn retain_indices<F>(self, predicate: F) -> Self
    where
        F: Fn(usize) -> bool,
    {
        let rows = self
            .rows
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| predicate(*idx))
            .map(|(_, row)| row)
            .collect();
        Self {
            categorical: self.categorical,
            numeric: self.numeric,
            rows,
        }
    }
}

/// Build the feature matrix for `level`.
///
/// Returns the matrix and the names of its categorical columns. Fails when
/// a required column or a categorical column of the level is absent.
pub fn select(frame: &DerivedFrame, level: Level) -> Result<(FeatureMatrix, Vec<&'static str>)> {
    for required in REQUIRED_COLUMNS {
        frame.frame().require(required)?;
    }
    let categorical: Vec<Dimension> = level.categorical().to_vec();
    for &dim in &categorical {
        frame.frame().require(Column::Dimension(dim))?;
    }

    let numeric: Vec<Feature> = numeric_features()
        .into_iter()
        .filter(|f| frame.has_feature(*f))
        .collect();

    let rows = (0..frame.len())
        .zip(frame.rows())
        .map(|(idx, (row, _))| FeatureRow {
            categories: categorical
                .iter()
                .map(|&d| row.dimension(d).map(str::to_string))
                .collect(),
            numeric: numeric.iter().map(|&f| frame.feature_value(idx, f)).collect(),
        })
        .collect();

    let matrix = FeatureMatrix {
        categorical,
        numeric,
        rows,
    };
    let names = matrix.categorical_names();
    Ok((matrix, names))
}

/// Names the model will see for `level` given a full-schema input.
/// Used to check persisted models against the running schema.
pub fn canonical_feature_names(level: Level) -> Vec<String> {
    level
        .categorical()
        .iter()
        .map(|d| d.name().to_string())
        .chain(numeric_features().iter().map(Feature::name))
        .collect()
}
