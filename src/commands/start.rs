use anyhow::Result;
use api_analytics::{config, logging, server};
use colored::Colorize;
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Loads configuration, installs logging and serves until a shutdown signal.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting API analytics server...".green());

    let cfg = config::load_config(config_path)?;
    let _log_guard = logging::init_tracing(&cfg.server);

    info!(
        config = %config_path.display(),
        page_size = cfg.retrieval.page_size,
        max_rows = cfg.retrieval.max_rows,
        "Configuration loaded"
    );

    server::start_server(cfg).await
}
