//! Gradient boosting over [`CartBuilder`] trees
//!
//! Predictions during training are accumulated from the quantised trees,
//! so the residuals each round see exactly what inference will compute.

use roas_model::{to_fixed, Ensemble, Loss, SCALE};
use tracing::{debug, info};

use crate::cart::{CartBuilder, TreeConfig};
use crate::dataset::TrainingSet;
use crate::errors::{Result, TrainerError};
use crate::metrics::{weighted_mae, weighted_mean, weighted_median, weighted_mse};

#[derive(Clone, Debug)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub learning_rate: f64,
    pub loss: Loss,
    pub tree: TreeConfig,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 1500,
            learning_rate: 0.03,
            loss: Loss::AbsoluteError,
            tree: TreeConfig::default(),
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(TrainerError::InvalidConfig(format!(
                "learning rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        self.tree.validate()
    }
}

pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }

    pub fn train(&self, data: &TrainingSet) -> Result<Ensemble> {
        if data.is_empty() || data.total_weight() <= 0.0 {
            return Err(TrainerError::Dataset("no weighted rows to train on".to_string()));
        }

        let bias = fixed(self.initial_score(data));
        let mut predictions = vec![bias as f64 / SCALE as f64; data.len()];
        let rows: Vec<usize> = (0..data.len()).collect();
        let mut trees = Vec::with_capacity(self.config.num_trees);

        for round in 0..self.config.num_trees {
            let residuals: Vec<f64> = data
                .targets
                .iter()
                .zip(&predictions)
                .map(|(y, p)| y - p)
                .collect();
            let (gradients, hessians) = self.gradients(&residuals, &data.weights);

            let builder = CartBuilder::new(&data.features, &gradients, &hessians, &self.config.tree)?;
            let tree = builder.build(&rows, |leaf_rows| {
                let r: Vec<f64> = leaf_rows.iter().map(|&i| residuals[i]).collect();
                let w: Vec<f64> = leaf_rows.iter().map(|&i| data.weights[i]).collect();
                let step = match self.config.loss {
                    Loss::SquaredError => weighted_mean(&r, &w),
                    Loss::AbsoluteError => weighted_median(&r, &w),
                };
                fixed(self.config.learning_rate * step.unwrap_or(0.0))
            });

            if tree.nodes.len() == 1 && tree.nodes[0].leaf == Some(0) {
                debug!(round, "no further improvement, stopping early");
                break;
            }

            for (pred, row) in predictions.iter_mut().zip(&data.features) {
                *pred += tree.evaluate(row) as f64 / SCALE as f64;
            }
            trees.push(tree);

            if (round + 1) % 100 == 0 {
                debug!(round = round + 1, loss = self.training_loss(data, &predictions), "boosting");
            }
        }

        info!(
            trees = trees.len(),
            rows = data.len(),
            loss = %self.config.loss,
            training_loss = self.training_loss(data, &predictions),
            "ensemble trained"
        );
        Ok(Ensemble::new(trees, bias))
    }

    fn initial_score(&self, data: &TrainingSet) -> f64 {
        let score = match self.config.loss {
            Loss::SquaredError => weighted_mean(&data.targets, &data.weights),
            Loss::AbsoluteError => weighted_median(&data.targets, &data.weights),
        };
        score.unwrap_or(0.0)
    }

    /// Negative residual direction, weighted; hessian is the weight
    fn gradients(&self, residuals: &[f64], weights: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let gradients = residuals
            .iter()
            .zip(weights)
            .map(|(r, w)| match self.config.loss {
                Loss::SquaredError => -w * r,
                Loss::AbsoluteError => -w * sign(*r),
            })
            .collect();
        (gradients, weights.to_vec())
    }

    fn training_loss(&self, data: &TrainingSet, predictions: &[f64]) -> f64 {
        let loss = match self.config.loss {
            Loss::SquaredError => weighted_mse(predictions, &data.targets, &data.weights),
            Loss::AbsoluteError => weighted_mae(predictions, &data.targets, &data.weights),
        };
        loss.unwrap_or(f64::NAN)
    }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn fixed(value: f64) -> i64 {
    to_fixed(value, SCALE).unwrap_or(0)
}
