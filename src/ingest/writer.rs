//! Bounded ingestion queue and batching writer
//!
//! The queue holds whole batches as posted. When it is full the newest
//! batch is dropped and counted; queued batches are never evicted.

use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::IngestConfig;
use crate::store::{Database, RequestRecord};

/// Producer side of the ingestion queue
#[derive(Clone, Debug)]
pub struct IngestSink {
    tx: mpsc::Sender<Vec<RequestRecord>>,
    dropped: Arc<AtomicU64>,
}

impl IngestSink {
    /// Queue plus an unattached receiver
    pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<Vec<RequestRecord>>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let sink = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// Queue plus a background writer draining it into `db`
    ///
    /// The writer exits after every sink clone is dropped and the queue is
    /// flushed; await the handle to wait for that.
    pub fn spawn(db: Database, config: IngestConfig) -> (Self, JoinHandle<()>) {
        let (sink, rx) = Self::channel(config.buffer_size);
        let batch_size = config.batch_size.max(1);
        let flush_interval = Duration::from_millis(config.flush_interval_ms.max(1));

        let handle = tokio::spawn(async move {
            let result = std::panic::AssertUnwindSafe(writer_task(db, rx, batch_size, flush_interval))
                .catch_unwind()
                .await;
            if let Err(e) = result {
                tracing::error!(panic = ?e, "Ingestion writer panicked");
            }
        });

        (sink, handle)
    }

    /// Queue a batch without waiting; `false` when it was dropped
    pub fn submit(&self, batch: Vec<RequestRecord>) -> bool {
        if batch.is_empty() {
            return true;
        }

        match self.tx.try_send(batch) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(batch)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    records = batch.len(),
                    dropped_batches = total,
                    "Ingestion queue full, dropping batch"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(batch)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(records = batch.len(), "Ingestion writer is gone, dropping batch");
                false
            }
        }
    }

    /// Batches dropped since startup
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn writer_task(
    db: Database,
    mut rx: mpsc::Receiver<Vec<RequestRecord>>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut pending: Vec<RequestRecord> = Vec::with_capacity(batch_size);

    let mut flush_timer = tokio::time::interval(flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(batch) => {
                    pending.extend(batch);
                    if pending.len() >= batch_size {
                        flush(&db, &mut pending, batch_size).await;
                    }
                }
                // Every sink is gone; write what is left and stop
                None => {
                    flush(&db, &mut pending, batch_size).await;
                    break;
                }
            },

            _ = flush_timer.tick() => {
                if !pending.is_empty() {
                    flush(&db, &mut pending, batch_size).await;
                }
            }
        }
    }

    tracing::info!("Ingestion writer shutting down");
}

/// Write everything pending in `batch_size` transactions; failures are logged and lost
async fn flush(db: &Database, pending: &mut Vec<RequestRecord>, batch_size: usize) {
    for chunk in pending.chunks(batch_size) {
        match db.insert_requests(chunk).await {
            Ok(inserted) => {
                let skipped = (chunk.len() as u64).saturating_sub(inserted);
                if skipped > 0 {
                    tracing::debug!(skipped = skipped, "Dropped records for unknown credentials");
                }
            }
            Err(e) => {
                tracing::error!(records = chunk.len(), error = %e, "Failed to write request batch");
            }
        }
    }
    pending.clear();
}
