use crate::BatchRecord;
use async_trait::async_trait;

/// Receiver of completed batches
///
/// Called once per batch after aggregation has finished. Whether the record
/// is persisted, transmitted or retried is up to the implementation.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn store(&self, record: &BatchRecord) -> anyhow::Result<()>;
}
