use anyhow::Result;
use api_analytics::monitor::{self, Prober};
use api_analytics::store::{now_millis, Database};
use api_analytics::{config, logging};
use colored::Colorize;
use std::path::Path;

/// Execute the monitor command
///
/// Runs exactly one probe cycle. Intended to be invoked by cron or a
/// systemd timer every few minutes.
pub async fn execute(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let _log_guard = logging::init_tracing(&cfg.server);

    let db = Database::connect(&cfg.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    let prober = Prober::new(&cfg.monitor)?;

    let result = monitor::run_cycle(&db, &prober, &cfg.monitor, now_millis()).await;
    db.close().await;
    let report = result?;

    println!(
        "{} probed {}, failed {}, stored {}, evicted {}",
        "✓ Probe cycle complete:".green(),
        report.probed,
        report.failed,
        report.inserted,
        report.evicted
    );

    Ok(())
}
