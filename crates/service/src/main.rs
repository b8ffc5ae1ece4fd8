use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use roas_model::{ModelCache, ModelStore};
use roas_service::{start_server, AppState, Forecaster, ServiceConfig, SourceKind};
use roas_source::{ClickHouseSource, CohortSource, CsvSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("ROAS service v{}", roas_service::VERSION);

    let config = ServiceConfig::load().context("invalid service configuration")?;
    info!(
        bind = %config.bind_addr,
        model_dir = %config.model_dir.display(),
        source = %config.source.kind,
        "configuration loaded"
    );

    let source: Arc<dyn CohortSource> = match config.source.kind {
        SourceKind::Csv => {
            let path = config
                .source
                .csv_path
                .as_ref()
                .context("csv source requires a csv_path")?;
            let source = CsvSource::from_path(path)
                .with_context(|| format!("failed to load cohort CSV {}", path.display()))?;
            info!(rows = source.len(), path = %path.display(), "cohort CSV loaded");
            Arc::new(source)
        }
        SourceKind::Clickhouse => Arc::new(
            ClickHouseSource::new(config.source.clickhouse.clone())
                .context("failed to configure ClickHouse source")?,
        ),
    };

    let models = Arc::new(ModelCache::new(ModelStore::new(&config.model_dir)));
    if config.preload_models {
        let cache = Arc::clone(&models);
        tokio::task::spawn_blocking(move || cache.warm())
            .await
            .context("model preload task failed")?;
    }

    let state = AppState::new(
        Forecaster::new(source, models),
        Duration::from_secs(config.request_timeout_secs),
    );
    start_server(state, &config.bind_addr).await
}
