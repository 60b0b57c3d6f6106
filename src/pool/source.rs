use crate::ShipmentRecord;
use async_trait::async_trait;

/// Supplier of raw shipment records
///
/// A fetch hands over everything the source considers pending. Failures are
/// the source's own concern; the cycle runner only propagates them.
#[async_trait]
pub trait ShipmentSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<Vec<ShipmentRecord>>;

    /// Take back records from an earlier fetch that were not batched
    ///
    /// Sources whose fetch does not consume anything keep the default no-op.
    async fn requeue(&self, _records: Vec<ShipmentRecord>) -> anyhow::Result<()> {
        Ok(())
    }
}
