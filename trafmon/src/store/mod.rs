//! Durable sinks for the counter table.

mod database;
mod snapshot_file;

pub use database::DatabaseStore;
pub use snapshot_file::{render_snapshot, write_snapshot_file};

use crate::counters::CounterEntry;
use crate::error::Result;
use async_trait::async_trait;

/// Keyed storage of absolute per-user totals.
///
/// `upsert_totals` overwrites both columns of an existing row with the given
/// values; it never adds to what is stored.
#[async_trait]
pub trait TotalsStore: Send + Sync {
    async fn load_totals(&self) -> Result<Vec<CounterEntry>>;

    /// Returns the number of rows written.
    async fn upsert_totals(&self, entries: &[CounterEntry]) -> Result<u64>;
}
