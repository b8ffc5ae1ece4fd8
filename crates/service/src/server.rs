use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::forecaster::{Forecaster, PredictRequest, PredictResponse};

#[derive(Clone)]
pub struct AppState {
    pub forecaster: Forecaster,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(forecaster: Forecaster, request_timeout: Duration) -> Self {
        Self {
            forecaster,
            request_timeout,
        }
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable code, e.g. `no_data` or `model_not_trained`
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, code: &'static str, message: S) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidRequest(_) => Self::bad_request(message),
            ServiceError::NoData(_) => Self::new(StatusCode::NOT_FOUND, "no_data", message),
            ServiceError::ModelNotTrained { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "model_not_trained", message)
            }
            ServiceError::Source(_) => {
                warn!(error = %message, "data source failure");
                Self::new(StatusCode::BAD_GATEWAY, "source_error", message)
            }
            ServiceError::Config(_)
            | ServiceError::Model(_)
            | ServiceError::Cohort(_)
            | ServiceError::Internal(_) => {
                error!(error = %message, "prediction failed");
                Self::internal(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        });
        (self.status, payload).into_response()
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    info!(addr = %listener.local_addr().context("listener has no local address")?, "ROAS service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("ROAS service terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

pub fn build_router(state: AppState) -> Router {
    let timeout = state.request_timeout;
    Router::new()
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn handle_predict(
    State(state): State<SharedState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let response = state.forecaster.forecast(request).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roas_cohort::{CohortError, Level, Target};
    use roas_source::SourceError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST, "invalid_request"),
            (ServiceError::NoData("x".into()), StatusCode::NOT_FOUND, "no_data"),
            (
                ServiceError::ModelNotTrained {
                    level: Level::Macro,
                    target: Target::Iaa,
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "model_not_trained",
            ),
            (
                ServiceError::Source(SourceError::Config("down".into())),
                StatusCode::BAD_GATEWAY,
                "source_error",
            ),
            (
                ServiceError::Cohort(CohortError::InvalidParameter("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }
}
