//! ClickHouse over its HTTP interface
//!
//! Filters are bound as server-side query parameters (`{name:Type}` in the
//! SQL, `param_name` in the URL), never spliced into the statement. Results
//! come back as `CSVWithNames` and go through the regular CSV ingestion.
//! The same client can create the cohort table and bulk-insert a frame.

use std::time::Duration;

use async_trait::async_trait;
use roas_cohort::{CohortFrame, Column, Dimension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use crate::errors::{Result, SourceError};
use crate::filter::RowFilter;
use crate::CohortSource;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    /// HTTP endpoint, e.g. `http://localhost:8123`
    pub url: String,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: "roas".to_string(),
            table: "cohort_metrics".to_string(),
            user: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

impl ClickHouseConfig {
    /// HTTP endpoint for a bare host and port
    pub fn url_from_host(host: &str, port: u16) -> String {
        format!("http://{host}:{port}")
    }

    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| SourceError::Config(format!("invalid ClickHouse url '{}': {e}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SourceError::Config(format!(
                "ClickHouse url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        for (what, ident) in [("database", &self.database), ("table", &self.table)] {
            if !is_identifier(ident) {
                return Err(SourceError::Config(format!("invalid {what} name '{ident}'")));
            }
        }
        if self.timeout_secs == 0 {
            return Err(SourceError::Config("query timeout must be positive".to_string()));
        }
        Ok(url)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// Statement text plus its `param_*` bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ClickHouseSource {
    client: reqwest::Client,
    endpoint: Url,
    config: ClickHouseConfig,
}

impl ClickHouseSource {
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        let endpoint = config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    pub fn build_query(&self, filter: &RowFilter) -> BoundQuery {
        let mut clauses = vec![
            "date_idx >= {date_from:Int64}".to_string(),
            "date_idx <= {date_to:Int64}".to_string(),
        ];
        let mut params = vec![
            ("param_date_from".to_string(), filter.date_from.to_string()),
            ("param_date_to".to_string(), filter.date_to.to_string()),
        ];
        for (dim, label) in filter.dimensions() {
            let name = param_name(dim);
            clauses.push(format!("{} = {{{name}:String}}", dim.name()));
            params.push((format!("param_{name}"), label.to_string()));
        }

        BoundQuery {
            sql: format!(
                "SELECT * FROM {}.{} WHERE {} FORMAT CSVWithNames",
                self.config.database,
                self.config.table,
                clauses.join(" AND ")
            ),
            params,
        }
    }
}

impl ClickHouseSource {
    /// `CREATE TABLE IF NOT EXISTS` covering every schema column
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = Column::all()
            .map(|column| format!("    {} {}", column.name(), column_type(column)))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {}.{} (\n{}\n) ENGINE = MergeTree ORDER BY date_idx",
            self.config.database,
            self.config.table,
            columns.join(",\n")
        )
    }

    /// Create the database and cohort table when absent
    #[instrument(skip(self), fields(table = %self.config.table))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {}", self.config.database);
        self.send(&[], create_db.into_bytes()).await?;
        self.send(&[], self.create_table_sql().into_bytes()).await?;
        debug!("cohort table ready");
        Ok(())
    }

    /// Bulk-insert `frame` as one `CSVWithNames` body; returns the row count
    #[instrument(skip(self, frame), fields(table = %self.config.table, rows = frame.len()))]
    pub async fn insert(&self, frame: &CohortFrame) -> Result<usize> {
        if frame.is_empty() {
            return Ok(0);
        }
        let mut body = Vec::new();
        frame.to_csv_writer(&mut body)?;
        let statement = format!(
            "INSERT INTO {}.{} FORMAT CSVWithNames",
            self.config.database, self.config.table
        );
        self.send(&[("query".to_string(), statement)], body).await?;
        info!(rows = frame.len(), "inserted cohort rows");
        Ok(frame.len())
    }

    async fn send(&self, params: &[(String, String)], body: Vec<u8>) -> Result<Vec<u8>> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .query(params)
            .body(body);
        if let Some(user) = &self.config.user {
            request = request.header("X-ClickHouse-User", user);
        }
        if let Some(password) = &self.config.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(SourceError::Query {
                status: status.as_u16(),
                message: text.chars().take(MAX_ERROR_BODY).collect::<String>().trim().to_string(),
            });
        }
        Ok(body.to_vec())
    }
}

fn column_type(column: Column) -> &'static str {
    match column {
        Column::DateIdx => "Int64",
        Column::Installs | Column::Cost => "Float64",
        Column::Dimension(_) => "Nullable(String)",
        Column::Cpi | Column::Metric(..) => "Nullable(Float64)",
    }
}

fn param_name(dim: Dimension) -> &'static str {
    match dim {
        Dimension::OptGroup => "opt",
        Dimension::ConvWindow => "cw",
        Dimension::Country => "geo",
    }
}

#[async_trait]
impl CohortSource for ClickHouseSource {
    #[instrument(skip(self), fields(table = %self.config.table))]
    async fn query(&self, filter: &RowFilter) -> Result<CohortFrame> {
        filter.validate()?;
        let query = self.build_query(filter);

        let body = self.send(&query.params, query.sql.into_bytes()).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            debug!("empty result set");
            return Ok(CohortFrame::with_all_columns(Vec::new()));
        }
        let frame = CohortFrame::from_csv_reader(body.as_slice())?;
        debug!(rows = frame.len(), "clickhouse query");
        Ok(frame)
    }

    fn name(&self) -> &'static str {
        "clickhouse"
    }
}
