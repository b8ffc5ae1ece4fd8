//! Command-line pieces shared by `roas-train` and `roas-load`

use clap::Args;
use roas_source::ClickHouseConfig;

/// ClickHouse connection flags, each backed by the same environment
/// variable the service reads. `--clickhouse-url` wins over host and port.
#[derive(Args, Debug, Clone)]
pub struct ClickHouseArgs {
    #[arg(long = "clickhouse-url", env = "CLICKHOUSE_URL")]
    pub url: Option<String>,

    #[arg(long = "clickhouse-host", env = "CLICKHOUSE_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long = "clickhouse-port", env = "CLICKHOUSE_PORT", default_value_t = 8123)]
    pub port: u16,

    #[arg(long = "clickhouse-db", env = "CLICKHOUSE_DB", default_value = "roas")]
    pub database: String,

    #[arg(long = "clickhouse-table", env = "CLICKHOUSE_TABLE", default_value = "cohort_metrics")]
    pub table: String,

    #[arg(long = "clickhouse-user", env = "CLICKHOUSE_USER")]
    pub user: Option<String>,

    #[arg(long = "clickhouse-password", env = "CLICKHOUSE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "clickhouse-timeout", env = "ROAS_QUERY_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl ClickHouseArgs {
    pub fn config(&self) -> ClickHouseConfig {
        let url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => ClickHouseConfig::url_from_host(self.host.trim(), self.port),
        };
        ClickHouseConfig {
            url,
            database: self.database.clone(),
            table: self.table.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}
