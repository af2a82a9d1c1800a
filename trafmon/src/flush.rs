use crate::counters::CounterTable;
use crate::error::{Result, TrafmonError};
use crate::store::{TotalsStore, write_snapshot_file};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of one flush cycle. The two sinks succeed or fail independently.
#[derive(Debug)]
pub struct FlushReport {
    pub completed_at: DateTime<Utc>,
    pub users: usize,
    pub store: Result<u64>,
    /// `None` when no snapshot file is configured.
    pub file: Option<Result<()>>,
}

impl FlushReport {
    pub fn is_success(&self) -> bool {
        self.store.is_ok() && self.file.as_ref().is_none_or(|r| r.is_ok())
    }
}

/// Periodically copies the counter table to the store and the snapshot file.
pub struct FlushScheduler {
    counters: Arc<CounterTable>,
    store: Arc<dyn TotalsStore>,
    snapshot_file: Option<PathBuf>,
    period: Duration,
}

impl FlushScheduler {
    pub fn new(
        counters: Arc<CounterTable>,
        store: Arc<dyn TotalsStore>,
        snapshot_file: Option<PathBuf>,
        period: Duration,
    ) -> Self {
        Self {
            counters,
            store,
            snapshot_file,
            period,
        }
    }

    /// Seed the counter table with the persisted totals.
    ///
    /// Must succeed before anything is flushed: the store holds absolute
    /// values, so flushing a table that missed them would overwrite real
    /// history with smaller numbers.
    pub async fn initial_load(&self) -> Result<usize> {
        let entries = self
            .store
            .load_totals()
            .await
            .map_err(|e| TrafmonError::InitialLoad(Box::new(e)))?;
        let users = entries.len();
        self.counters.load(entries);
        Ok(users)
    }

    pub async fn flush_once(&self) -> FlushReport {
        let snapshot = self.counters.snapshot();

        let store = self.store.upsert_totals(&snapshot);
        let file = async {
            match &self.snapshot_file {
                Some(path) => Some(write_snapshot_file(path, &snapshot).await),
                None => None,
            }
        };
        let (store, file) = tokio::join!(store, file);

        let report = FlushReport {
            completed_at: Utc::now(),
            users: snapshot.len(),
            store,
            file,
        };
        log_report(&report);
        report
    }

    /// Flush every period until `shutdown` fires. The first cycle runs one
    /// full period after the call.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    // an abandoned cycle rolls back; stop() runs the final flush
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            warn!("Flush cycle interrupted by shutdown");
                            break;
                        }
                        _ = self.flush_once() => {}
                    }
                }
            }
        }
        info!("Flush scheduler stopped");
    }
}

fn log_report(report: &FlushReport) {
    match &report.store {
        Ok(rows) => info!(
            "{} - Data write to database (OK, {} row(s))",
            report.completed_at, rows
        ),
        Err(e) => error!(
            "{} - Data write to database FAILED, will retry next cycle: {}",
            report.completed_at, e
        ),
    }
    if let Some(Err(e)) = &report.file {
        warn!("Snapshot file not updated: {}", e);
    }
}
