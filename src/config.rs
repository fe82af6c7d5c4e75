use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `API_ANALYTICS__DATABASE__URL`
pub const ENV_PREFIX: &str = "API_ANALYTICS";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Directory for the daily-rolling operational log file (disabled when unset)
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_dir: None,
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite connection string (default: "sqlite://data/analytics.db")
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Bounds for the paginated export path
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Rows fetched per page (default: 500000)
    #[serde(default = "default_row_cap")]
    pub page_size: usize,

    /// Overall safety cap across all pages (default: 500000)
    #[serde(default = "default_row_cap")]
    pub max_rows: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            page_size: default_row_cap(),
            max_rows: default_row_cap(),
        }
    }
}

/// Uptime prober settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Connection establishment timeout per probe (default: 2)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a whole probe including the response (default: 10)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Probes in flight at once (default: 8)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Ping history kept, in days (default: 60)
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Live targets allowed per account (default: 3)
    #[serde(default = "default_max_targets")]
    pub max_targets: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            concurrency: default_concurrency(),
            retention_days: default_retention_days(),
            max_targets: default_max_targets(),
        }
    }
}

/// Ingestion queue settings
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Queued batches before new ones are dropped (default: 10000)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Records per insert transaction (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Max time before a partial batch is flushed in milliseconds (default: 500)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_body_limit() -> usize {
    1024 * 1024
}

fn default_database_url() -> String {
    "sqlite://data/analytics.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_row_cap() -> usize {
    500_000
}

fn default_connect_timeout() -> u64 {
    2
}

fn default_request_timeout() -> u64 {
    10
}

fn default_concurrency() -> usize {
    8
}

fn default_retention_days() -> i64 {
    60
}

fn default_max_targets() -> i64 {
    3
}

fn default_buffer_size() -> usize {
    10_000
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    500
}

/// Load configuration from an optional file plus `API_ANALYTICS__*` environment overrides
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.database.url.is_empty() {
        anyhow::bail!("database.url cannot be empty");
    }

    if cfg.database.max_connections == 0 {
        anyhow::bail!("database.max_connections must be greater than 0");
    }

    if cfg.retrieval.page_size == 0 || cfg.retrieval.max_rows == 0 {
        anyhow::bail!("retrieval.page_size and retrieval.max_rows must be greater than 0");
    }

    if cfg.monitor.concurrency == 0 {
        anyhow::bail!("monitor.concurrency must be greater than 0");
    }

    if cfg.monitor.retention_days <= 0 {
        anyhow::bail!("monitor.retention_days must be greater than 0");
    }

    if cfg.ingest.buffer_size == 0 || cfg.ingest.batch_size == 0 {
        anyhow::bail!("ingest.buffer_size and ingest.batch_size must be greater than 0");
    }

    match cfg.server.log_format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("Invalid server.log_format: {}", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.retrieval.page_size, 500_000);
        assert_eq!(cfg.retrieval.max_rows, 500_000);
        assert_eq!(cfg.monitor.connect_timeout_secs, 2);
        assert_eq!(cfg.monitor.retention_days, 60);
        assert_eq!(cfg.monitor.max_targets, 3);
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut cfg = Config::default();
        cfg.retrieval.page_size = 0;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("retrieval.page_size"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut cfg = Config::default();
        cfg.server.log_format = "xml".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[retrieval]
page_size = 1000

[monitor]
concurrency = 2
"#
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.retrieval.page_size, 1000);
        assert_eq!(cfg.retrieval.max_rows, 500_000);
        assert_eq!(cfg.monitor.concurrency, 2);
        assert_eq!(cfg.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let cfg = load_config(Path::new("/nonexistent/api-analytics.toml")).unwrap();
        assert_eq!(cfg.database.url, "sqlite://data/analytics.db");
    }
}
