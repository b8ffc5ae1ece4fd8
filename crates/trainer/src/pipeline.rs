//! Per (level, target) training runs over one cohort dataset

use roas_cohort::{
    aggregate, derive, select, time_split, CohortFrame, DerivedFrame, FeatureMatrix, Level,
    Target,
};
use roas_model::{FeatureEncoder, ModelBundle, ModelStore, Regressor, TrainingSummary, SCALE};
use tracing::{error, info, instrument, warn};

use crate::dataset::TrainingSet;
use crate::errors::{Result, TrainerError};
use crate::metrics::weighted_mae;
use crate::trainer::{GbdtConfig, GbdtTrainer};

/// Default share of distinct days held out for evaluation
pub const DEFAULT_TEST_FRAC: f64 = 0.2;

/// Rows ready for fitting or scoring
#[derive(Debug, Clone)]
pub struct LabelledMatrix {
    pub matrix: FeatureMatrix,
    pub labels: Vec<f64>,
    pub weights: Vec<f64>,
    /// Rows removed for non-positive cost or a missing feature
    pub dropped: usize,
}

/// Keep `cost > 0` rows with every feature present; labels and cost
/// weights stay aligned with the matrix rows.
pub fn labelled_matrix(frame: &DerivedFrame, level: Level, target: Target) -> Result<LabelledMatrix> {
    let label = target.label_column();
    let positive = frame.filter(|row, _| row.cost > 0.0);
    let (matrix, _) = select(&positive, level)?;

    let keep: Vec<bool> = matrix.rows().iter().map(|r| r.is_complete()).collect();
    let mut labels = Vec::new();
    let mut weights = Vec::new();
    for ((row, _), &kept) in positive.rows().zip(&keep) {
        if kept {
            labels.push(row.value(label).unwrap_or(f64::NAN));
            weights.push(row.cost);
        }
    }

    let matrix = matrix.retain_indices(|idx| keep[idx]);
    Ok(LabelledMatrix {
        dropped: frame.len() - matrix.len(),
        matrix,
        labels,
        weights,
    })
}

/// Result of one (level, target) run
#[derive(Debug)]
pub enum PairOutcome {
    Trained(Box<ModelBundle>),
    /// No row carries a finite label
    Skipped,
}

#[derive(Debug)]
pub struct PairReport {
    pub level: Level,
    pub target: Target,
    pub status: PairStatus,
}

#[derive(Debug)]
pub enum PairStatus {
    Saved { hash: String, holdout_mae: Option<f64> },
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    pub config: GbdtConfig,
    pub test_frac: f64,
}

impl TrainingPipeline {
    pub fn new(config: GbdtConfig, test_frac: f64) -> Self {
        Self { config, test_frac }
    }

    /// Train one bundle from raw cohort rows
    #[instrument(skip(self, frame), fields(rows = frame.len()))]
    pub fn train_pair(&self, frame: &CohortFrame, level: Level, target: Target) -> Result<PairOutcome> {
        let derived = derive(&aggregate(frame, level)?);
        self.train_derived(&derived, level, target)
    }

    /// Train from an already aggregated and derived frame of `level`
    pub fn train_derived(&self, derived: &DerivedFrame, level: Level, target: Target) -> Result<PairOutcome> {
        let label = target.label_column();
        let labelled = derived.filter(|row, _| row.value(label).is_some_and(f64::is_finite));
        let positive_cost = labelled.rows().filter(|(row, _)| row.cost > 0.0).count();
        info!(%level, %target, rows = labelled.len(), positive_cost, "labelled rows");

        if labelled.is_empty() {
            warn!(%level, %target, label = %label, "no rows with a finite target, skipping");
            return Ok(PairOutcome::Skipped);
        }

        let split = time_split(&labelled, self.test_frac)?;
        info!(
            cut_date_idx = split.cut_date_idx,
            train = split.train.len(),
            test = split.test.len(),
            "chronological split"
        );

        let train = labelled_matrix(&split.train, level, target)?;
        if train.matrix.is_empty() {
            return Err(TrainerError::EmptyTrainingSet { level, target });
        }

        let encoder = FeatureEncoder::fit(&train.matrix, SCALE);
        let dataset = TrainingSet::from_matrix(&encoder, &train.matrix, train.labels, train.weights)?;
        let trainer = GbdtTrainer::new(self.config.clone())?;
        let ensemble = trainer.train(&dataset)?;

        let summary = TrainingSummary {
            loss: self.config.loss,
            num_trees: ensemble.num_trees(),
            max_depth: self.config.tree.max_depth,
            learning_rate: self.config.learning_rate,
            train_rows: dataset.len(),
            test_rows: 0,
            dropped_rows: train.dropped,
            cut_date_idx: (!split.test.is_empty()).then_some(split.cut_date_idx),
            holdout_mae: None,
            trained_at: chrono::Utc::now().to_rfc3339(),
        };
        let mut bundle = ModelBundle::new(level, target, encoder, ensemble, summary);

        if !split.test.is_empty() {
            let test = labelled_matrix(&split.test, level, target)?;
            if !test.matrix.is_empty() {
                let predictions = bundle.predict(&test.matrix)?;
                bundle.summary.test_rows = test.matrix.len();
                bundle.summary.holdout_mae = weighted_mae(&predictions, &test.labels, &test.weights);
                info!(holdout_mae = ?bundle.summary.holdout_mae, rows = test.matrix.len(), "hold-out evaluation");
            }
        }

        Ok(PairOutcome::Trained(Box::new(bundle)))
    }

    /// Train every (level, target) pair and persist what succeeds. A failure
    /// in one pair is logged and does not stop the others.
    pub fn run(&self, frame: &CohortFrame, store: &ModelStore) -> Vec<PairReport> {
        let mut reports = Vec::new();
        for level in Level::ALL {
            let derived = match aggregate(frame, level) {
                Ok(aggregated) => derive(&aggregated),
                Err(e) => {
                    error!(%level, error = %e, "aggregation failed");
                    for target in Target::ALL {
                        reports.push(PairReport { level, target, status: PairStatus::Failed(e.to_string()) });
                    }
                    continue;
                }
            };

            for target in Target::ALL {
                let status = match self
                    .train_derived(&derived, level, target)
                    .and_then(|outcome| persist(outcome, store))
                {
                    Ok(status) => status,
                    Err(e) => {
                        error!(%level, %target, error = %e, "training failed");
                        PairStatus::Failed(e.to_string())
                    }
                };
                reports.push(PairReport { level, target, status });
            }
        }
        reports
    }
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new(GbdtConfig::default(), DEFAULT_TEST_FRAC)
    }
}

fn persist(outcome: PairOutcome, store: &ModelStore) -> Result<PairStatus> {
    match outcome {
        PairOutcome::Trained(bundle) => {
            let hash = store.save(&bundle)?;
            Ok(PairStatus::Saved {
                hash,
                holdout_mae: bundle.summary.holdout_mae,
            })
        }
        PairOutcome::Skipped => Ok(PairStatus::Skipped),
    }
}
