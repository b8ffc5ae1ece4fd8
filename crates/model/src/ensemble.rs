//! Fixed-point boosted ensemble
//!
//! Scores are integer sums: `bias + Σ leaf(tree)`, all at `scale`. The
//! learning rate is folded into leaf values at training time, so inference
//! never touches floating point until the final conversion.

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, Result};
use crate::tree::Tree;

/// Fixed-point scale (1e6, micro precision)
pub const SCALE: i64 = 1_000_000;

/// Artifact format revision understood by this build
pub const FORMAT_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ensemble {
    pub version: i32,
    pub scale: i64,
    pub bias: i64,
    pub trees: Vec<Tree>,
}

impl Ensemble {
    pub fn new(trees: Vec<Tree>, bias: i64) -> Self {
        Self {
            version: FORMAT_VERSION,
            scale: SCALE,
            bias,
            trees,
        }
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn validate(&self, num_features: usize) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "unsupported ensemble version {}",
                self.version
            )));
        }
        if self.scale <= 0 {
            return Err(ModelError::ValidationFailed(format!("invalid scale {}", self.scale)));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(num_features)
                .map_err(|e| ModelError::ValidationFailed(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }

    /// Integer score for one encoded row
    pub fn score(&self, features: &[i64]) -> i64 {
        let total = self
            .trees
            .iter()
            .fold(self.bias as i128, |acc, tree| acc + tree.evaluate(features) as i128);
        total.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Score converted back to a real value
    pub fn predict(&self, features: &[i64]) -> f64 {
        self.score(features) as f64 / self.scale as f64
    }
}
