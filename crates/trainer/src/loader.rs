//! Bulk load of a cohort CSV into the ClickHouse table the service reads

use std::path::Path;

use roas_cohort::CohortFrame;
use roas_source::ClickHouseSource;
use tracing::info;

use crate::errors::Result;

/// Read `path`, optionally create the table, insert every row.
/// Returns the number of rows inserted.
pub async fn load_csv(source: &ClickHouseSource, path: &Path, create_schema: bool) -> Result<usize> {
    let frame = CohortFrame::from_csv_path(path)?;
    info!(rows = frame.len(), path = %path.display(), "read cohort csv");
    load_frame(source, &frame, create_schema).await
}

pub async fn load_frame(source: &ClickHouseSource, frame: &CohortFrame, create_schema: bool) -> Result<usize> {
    if create_schema {
        source.ensure_schema().await?;
    }
    let inserted = source.insert(frame).await?;
    let config = source.config();
    info!(inserted, table = %format!("{}.{}", config.database, config.table), "cohort rows loaded");
    Ok(inserted)
}
