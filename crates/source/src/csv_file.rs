//! In-memory source over a CSV export of the cohort table

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use roas_cohort::CohortFrame;
use tracing::{debug, info};

use crate::errors::Result;
use crate::filter::RowFilter;
use crate::CohortSource;

/// Loads the file once; every query filters the cached rows
#[derive(Debug, Clone)]
pub struct CsvSource {
    frame: Arc<CohortFrame>,
}

impl CsvSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let frame = CohortFrame::from_csv_path(path)?;
        info!(path = %path.display(), rows = frame.len(), "loaded cohort csv");
        Ok(Self::from_frame(frame))
    }

    pub fn from_frame(frame: CohortFrame) -> Self {
        Self {
            frame: Arc::new(frame),
        }
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}

#[async_trait]
impl CohortSource for CsvSource {
    async fn query(&self, filter: &RowFilter) -> Result<CohortFrame> {
        filter.validate()?;
        let rows = self.frame.filter(|row| filter.matches(row));
        debug!(matched = rows.len(), total = self.frame.len(), "csv query");
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
