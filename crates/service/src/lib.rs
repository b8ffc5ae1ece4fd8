//! HTTP prediction service
//!
//! `POST /predict` queries the configured [`roas_source::CohortSource`],
//! runs the shared cohort pipeline for the requested level, scores the
//! rows with the cached model for (level, target) and combines them into a
//! single cost-weighted ROAS forecast.

pub mod config;
pub mod errors;
pub mod forecaster;
pub mod server;

pub use config::{ServiceConfig, SourceKind, SourceSettings};
pub use errors::{Result, ServiceError};
pub use forecaster::{ForecastQuery, Forecaster, PredictRequest, PredictResponse};
pub use server::{build_router, start_server, AppState, ErrorResponse, HealthResponse};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
