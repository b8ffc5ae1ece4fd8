//! Service configuration
//!
//! Layered as defaults, then an optional TOML file named by `ROAS_CONFIG`,
//! then environment overrides. The result is validated before start-up.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roas_source::ClickHouseConfig;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ServiceError};

pub const CONFIG_PATH_VAR: &str = "ROAS_CONFIG";
const DEFAULT_CLICKHOUSE_PORT: u16 = 8123;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Csv,
    Clickhouse,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Csv => f.write_str("csv"),
            SourceKind::Clickhouse => f.write_str("clickhouse"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(SourceKind::Csv),
            "clickhouse" | "ch" => Ok(SourceKind::Clickhouse),
            other => Err(ServiceError::Config(format!("unknown source kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Cohort CSV, required when `kind = "csv"`
    pub csv_path: Option<PathBuf>,
    pub clickhouse: ClickHouseConfig,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Csv,
            csv_path: Some(PathBuf::from("data/cohorts.csv")),
            clickhouse: ClickHouseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub model_dir: PathBuf,
    /// Load every artifact found in `model_dir` at start-up
    pub preload_models: bool,
    /// Upper bound on a whole `/predict` request
    pub request_timeout_secs: u64,
    pub source: SourceSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            model_dir: PathBuf::from("models"),
            preload_models: true,
            request_timeout_secs: 60,
            source: SourceSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults, `ROAS_CONFIG` file if set, process environment, validation
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ServiceError::Config(format!("failed to parse config: {e}")))
    }

    /// Overlay values from `lookup`; blank values are ignored
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(value) = var("ROAS_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Some(value) = var("MODEL_DIR") {
            self.model_dir = PathBuf::from(value);
        }
        if let Some(value) = var("ROAS_PRELOAD_MODELS") {
            if let Some(parsed) = parse_bool(&value) {
                self.preload_models = parsed;
            }
        }
        if let Some(value) = var("ROAS_SOURCE") {
            self.source.kind = value.parse()?;
        }
        if let Some(value) = var("ROAS_CSV_PATH") {
            self.source.csv_path = Some(PathBuf::from(value));
        }

        let clickhouse = &mut self.source.clickhouse;
        if let Some(value) = var("CLICKHOUSE_URL") {
            clickhouse.url = value;
        } else if let Some(host) = var("CLICKHOUSE_HOST") {
            let port = match var("CLICKHOUSE_PORT") {
                Some(value) => value.parse::<u16>().map_err(|_| {
                    ServiceError::Config(format!("CLICKHOUSE_PORT must be a port number, got '{value}'"))
                })?,
                None => DEFAULT_CLICKHOUSE_PORT,
            };
            clickhouse.url = ClickHouseConfig::url_from_host(&host, port);
        }
        if let Some(value) = var("CLICKHOUSE_DB") {
            clickhouse.database = value;
        }
        if let Some(value) = var("CLICKHOUSE_TABLE") {
            clickhouse.table = value;
        }
        if let Some(value) = var("CLICKHOUSE_USER") {
            clickhouse.user = Some(value);
        }
        if let Some(value) = var("CLICKHOUSE_PASSWORD") {
            clickhouse.password = Some(value);
        }
        if let Some(value) = var("ROAS_QUERY_TIMEOUT_SECS") {
            clickhouse.timeout_secs = value.parse().map_err(|_| {
                ServiceError::Config(format!("ROAS_QUERY_TIMEOUT_SECS must be an integer, got '{value}'"))
            })?;
        }
        if let Some(value) = var("ROAS_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = value.parse().map_err(|_| {
                ServiceError::Config(format!("ROAS_REQUEST_TIMEOUT_SECS must be an integer, got '{value}'"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(ServiceError::Config("bind_addr must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ServiceError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        match self.source.kind {
            SourceKind::Csv => {
                if self.source.csv_path.is_none() {
                    return Err(ServiceError::Config(
                        "csv source selected but no csv_path configured".to_string(),
                    ));
                }
            }
            SourceKind::Clickhouse => {
                if self.source.clickhouse.timeout_secs == 0 {
                    return Err(ServiceError::Config(
                        "ClickHouse timeout must be positive".to_string(),
                    ));
                }
                self.source
                    .clickhouse
                    .validate()
                    .map_err(|e| ServiceError::Config(e.to_string()))?;
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
