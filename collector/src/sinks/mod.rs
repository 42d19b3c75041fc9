use async_trait::async_trait;

use crate::error::CollectError;
use crate::reading::MetricReading;

pub mod csv;
pub mod jsonl;
pub mod sheets;

/// A local append-only history. Every reading of every run lands here,
/// regardless of the deduplication outcome.
pub trait HistorySink {
    fn append(&mut self, reading: &MetricReading) -> Result<(), CollectError>;
}

/// The remote table store: one unconditional "All Data" table, plus lazily
/// created per-metric tables that only receive changed readings.
#[async_trait]
pub trait RemoteSink {
    async fn append_all_data(&mut self, reading: &MetricReading) -> Result<(), CollectError>;

    async fn append_metric(&mut self, reading: &MetricReading) -> Result<(), CollectError>;
}
