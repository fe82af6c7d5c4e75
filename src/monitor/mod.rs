//! Uptime prober cycle
//!
//! One invocation probes every registered target, stores one ping per
//! target in a single transaction and then evicts history past the
//! retention window. Scheduling is left to the caller.

pub mod prober;

pub use prober::{ProbeOutcome, Prober};

use futures::stream::{self, StreamExt};

use crate::config::MonitorConfig;
use crate::store::{Database, PingRecord, StoreError};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Summary of one probe cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    pub failed: usize,
    pub inserted: u64,
    pub evicted: u64,
}

/// Run one cycle stamped at `now` (Unix milliseconds)
///
/// Probes run concurrently up to `monitor.concurrency`. A failing target
/// still yields a ping carrying the failure sentinel.
pub async fn run_cycle(
    db: &Database,
    prober: &Prober,
    config: &MonitorConfig,
    now: i64,
) -> Result<CycleReport, StoreError> {
    let targets = db.all_monitors().await?;
    tracing::info!(targets = targets.len(), "Starting probe cycle");

    let outcomes: Vec<ProbeOutcome> = stream::iter(targets.iter())
        .map(|target| prober.probe(target))
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let mut report = CycleReport {
        probed: targets.len(),
        ..Default::default()
    };

    let pings: Vec<PingRecord> = targets
        .into_iter()
        .zip(outcomes)
        .map(|(target, outcome)| {
            if outcome == ProbeOutcome::Failed {
                report.failed += 1;
            }
            let (status, response_time) = outcome.as_ping_values();
            PingRecord {
                api_key: target.api_key,
                url: target.url,
                response_time,
                status,
                created_at: now,
            }
        })
        .collect();

    report.inserted = db.insert_pings(&pings).await?;
    let cutoff = now.saturating_sub(config.retention_days.saturating_mul(DAY_MS));
    report.evicted = db.delete_pings_before(cutoff).await?;

    tracing::info!(
        probed = report.probed,
        failed = report.failed,
        inserted = report.inserted,
        evicted = report.evicted,
        "Probe cycle complete"
    );

    Ok(report)
}
