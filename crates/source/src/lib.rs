//! Cohort row sources
//!
//! A [`CohortSource`] answers one [`RowFilter`] with a [`CohortFrame`] of
//! raw micro rows. Serving issues one query per request; training asks for
//! [`RowFilter::all`].

pub mod clickhouse;
pub mod csv_file;
pub mod errors;
pub mod filter;

use async_trait::async_trait;
use roas_cohort::CohortFrame;

pub use clickhouse::{BoundQuery, ClickHouseConfig, ClickHouseSource};
pub use csv_file::CsvSource;
pub use errors::{Result, SourceError};
pub use filter::RowFilter;

#[async_trait]
pub trait CohortSource: Send + Sync {
    /// Rows matching `filter`; an empty frame is not an error here
    async fn query(&self, filter: &RowFilter) -> Result<CohortFrame>;

    /// Short label for logs
    fn name(&self) -> &'static str;
}
