//! Request → forecast
//!
//! One source query per request. The aggregation, model lookup and scoring
//! run on the blocking pool since artifact loads touch the filesystem and
//! scoring a large ensemble is CPU bound.

use std::sync::Arc;

use roas_cohort::{combine, prepare, CohortFrame, Level, Target};
use roas_model::{ModelCache, Regressor};
use roas_source::{CohortSource, RowFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::errors::{Result, ServiceError};

/// `/predict` body as it arrives on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub level: String,
    pub target: String,
    pub date_from: i64,
    pub date_to: i64,
    #[serde(default)]
    pub country_map: Option<String>,
    #[serde(default)]
    pub conv_window_map: Option<String>,
    #[serde(default)]
    pub opt_group_map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub level: Level,
    pub target: Target,
    pub date_from: i64,
    pub date_to: i64,
    pub prediction: f64,
    /// Raw rows returned by the source before aggregation
    pub rows: usize,
}

/// A request with its level and target parsed and its filter checked
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastQuery {
    pub level: Level,
    pub target: Target,
    pub filter: RowFilter,
}

impl TryFrom<PredictRequest> for ForecastQuery {
    type Error = ServiceError;

    fn try_from(request: PredictRequest) -> Result<Self> {
        let level: Level = request.level.trim().parse()?;
        let target: Target = request.target.trim().parse()?;
        let filter = RowFilter {
            date_from: request.date_from,
            date_to: request.date_to,
            opt_group_map: non_empty(request.opt_group_map),
            conv_window_map: non_empty(request.conv_window_map),
            country_map: non_empty(request.country_map),
        };
        filter.validate()?;
        Ok(Self {
            level,
            target,
            filter,
        })
    }
}

fn non_empty(label: Option<String>) -> Option<String> {
    label.filter(|l| !l.trim().is_empty())
}

#[derive(Clone)]
pub struct Forecaster {
    source: Arc<dyn CohortSource>,
    models: Arc<ModelCache>,
}

impl Forecaster {
    pub fn new(source: Arc<dyn CohortSource>, models: Arc<ModelCache>) -> Self {
        Self { source, models }
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    #[instrument(skip(self, request), fields(level = %request.level, target = %request.target))]
    pub async fn forecast(&self, request: PredictRequest) -> Result<PredictResponse> {
        let query = ForecastQuery::try_from(request)?;
        let frame = self.source.query(&query.filter).await?;
        debug!(source = self.source.name(), rows = frame.len(), "source query returned");
        if frame.is_empty() {
            return Err(ServiceError::NoData(
                "no rows found for the given filters and date range".to_string(),
            ));
        }

        let rows = frame.len();
        let models = Arc::clone(&self.models);
        let level = query.level;
        let target = query.target;
        let prediction = tokio::task::spawn_blocking(move || score(&models, &frame, level, target))
            .await
            .map_err(|e| ServiceError::Internal(format!("scoring task failed: {e}")))??;

        info!(%level, %target, rows, prediction, "forecast served");
        Ok(PredictResponse {
            level,
            target,
            date_from: query.filter.date_from,
            date_to: query.filter.date_to,
            prediction,
            rows,
        })
    }
}

fn score(models: &ModelCache, frame: &CohortFrame, level: Level, target: Target) -> Result<f64> {
    let (_, matrix) = prepare(frame, level)?;
    let (matrix, dropped) = matrix.drop_incomplete();
    if dropped > 0 {
        warn!(%level, dropped, kept = matrix.len(), "dropped rows with missing features");
    }
    if matrix.is_empty() {
        return Err(ServiceError::NoData(
            "no complete rows left after feature derivation".to_string(),
        ));
    }

    let bundle = models.get(level, target)?;
    let predictions = bundle.predict(&matrix)?;
    Ok(combine(&predictions, &matrix)?)
}
