//! Feature encoding: labels and reals → fixed-point integers
//!
//! Categorical columns use an ordinal vocabulary learned from the training
//! rows and stored with the model. Code 0 is a missing label, code 1 a label
//! never seen during training, known labels start at 2 in sorted order.

use std::collections::BTreeSet;

use roas_cohort::{FeatureMatrix, FeatureRow};
use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, Result};

pub const MISSING_CODE: i64 = 0;
pub const UNSEEN_CODE: i64 = 1;
const FIRST_LABEL_CODE: i64 = 2;

/// Ordinal codes for one categorical column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vocabulary {
    pub column: String,
    /// Sorted, deduplicated
    pub labels: Vec<String>,
}

impl Vocabulary {
    pub fn fit<'a>(column: impl Into<String>, labels: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let labels: BTreeSet<&str> = labels.into_iter().flatten().collect();
        Self {
            column: column.into(),
            labels: labels.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn code(&self, label: Option<&str>) -> i64 {
        match label {
            None => MISSING_CODE,
            Some(label) => match self.labels.binary_search_by(|l| l.as_str().cmp(label)) {
                Ok(idx) => FIRST_LABEL_CODE + idx as i64,
                Err(_) => UNSEEN_CODE,
            },
        }
    }
}

/// Maps a [`FeatureRow`] onto the integer row the ensemble scores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureEncoder {
    pub scale: i64,
    pub vocabularies: Vec<Vocabulary>,
    pub numeric: Vec<String>,
}

impl FeatureEncoder {
    /// Learn vocabularies from `matrix`
    pub fn fit(matrix: &FeatureMatrix, scale: i64) -> Self {
        let vocabularies = matrix
            .categorical()
            .iter()
            .enumerate()
            .map(|(col, dim)| {
                Vocabulary::fit(
                    dim.name(),
                    matrix.rows().iter().map(|r| r.categories[col].as_deref()),
                )
            })
            .collect();
        Self {
            scale,
            vocabularies,
            numeric: matrix.numeric().iter().map(|f| f.name()).collect(),
        }
    }

    /// Column names in encoded order: categorical first, then numeric
    pub fn feature_names(&self) -> Vec<String> {
        self.vocabularies
            .iter()
            .map(|v| v.column.clone())
            .chain(self.numeric.iter().cloned())
            .collect()
    }

    pub fn width(&self) -> usize {
        self.vocabularies.len() + self.numeric.len()
    }

    /// Encode one row; `row_idx` is only used in error messages
    pub fn encode_row(&self, row_idx: usize, row: &FeatureRow) -> Result<Vec<i64>> {
        if row.categories.len() != self.vocabularies.len() || row.numeric.len() != self.numeric.len() {
            return Err(ModelError::ValidationFailed(format!(
                "row {row_idx} has {} categorical + {} numeric values, encoder expects {} + {}",
                row.categories.len(),
                row.numeric.len(),
                self.vocabularies.len(),
                self.numeric.len()
            )));
        }

        let mut encoded = Vec::with_capacity(self.width());
        for (vocab, label) in self.vocabularies.iter().zip(&row.categories) {
            encoded.push(vocab.code(label.as_deref()));
        }
        for (name, value) in self.numeric.iter().zip(&row.numeric) {
            let value = value.ok_or_else(|| ModelError::MissingFeature {
                row: row_idx,
                feature: name.clone(),
            })?;
            encoded.push(to_fixed(value, self.scale).ok_or_else(|| ModelError::NonFinite {
                feature: name.clone(),
            })?);
        }
        Ok(encoded)
    }

    pub fn encode(&self, matrix: &FeatureMatrix) -> Result<Vec<Vec<i64>>> {
        matrix
            .rows()
            .iter()
            .enumerate()
            .map(|(idx, row)| self.encode_row(idx, row))
            .collect()
    }
}

/// Round to the nearest fixed-point integer; out-of-range values saturate
pub fn to_fixed(value: f64, scale: i64) -> Option<i64> {
    value.is_finite().then(|| (value * scale as f64).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roas_cohort::{Column, Dimension, Feature};

    fn matrix(rows: Vec<FeatureRow>) -> FeatureMatrix {
        FeatureMatrix::new(
            vec![Dimension::Country],
            vec![Feature::Column(Column::Cost)],
            rows,
        )
        .unwrap()
    }

    fn row(country: Option<&str>, cost: Option<f64>) -> FeatureRow {
        FeatureRow {
            categories: vec![country.map(str::to_string)],
            numeric: vec![cost],
        }
    }

    #[test]
    fn test_vocabulary_codes() {
        let vocab = Vocabulary::fit("country_map", [Some("US"), Some("DE"), None, Some("US")]);
        assert_eq!(vocab.labels, vec!["DE", "US"]);
        assert_eq!(vocab.code(Some("DE")), 2);
        assert_eq!(vocab.code(Some("US")), 3);
        assert_eq!(vocab.code(None), MISSING_CODE);
        assert_eq!(vocab.code(Some("FR")), UNSEEN_CODE);
    }

    #[test]
    fn test_encode_rows() {
        let m = matrix(vec![row(Some("US"), Some(1.5)), row(None, Some(0.25))]);
        let encoder = FeatureEncoder::fit(&m, 1_000_000);
        assert_eq!(encoder.feature_names(), vec!["country_map", "cost"]);
        let encoded = encoder.encode(&m).unwrap();
        assert_eq!(encoded, vec![vec![2, 1_500_000], vec![0, 250_000]]);
    }

    #[test]
    fn test_missing_numeric_is_error() {
        let m = matrix(vec![row(Some("US"), None)]);
        let encoder = FeatureEncoder::fit(&m, 1_000_000);
        let err = encoder.encode(&m).unwrap_err();
        assert!(matches!(err, ModelError::MissingFeature { row: 0, ref feature } if feature == "cost"));
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(0.1234564, 1_000_000), Some(123_456));
        assert_eq!(to_fixed(-2.0, 1_000_000), Some(-2_000_000));
        assert_eq!(to_fixed(f64::NAN, 1_000_000), None);
        assert_eq!(to_fixed(1e300, 1_000_000), Some(i64::MAX));
    }
}
