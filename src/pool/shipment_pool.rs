//! Shipment Pool Module
//!
//! In-memory queue of records waiting for the next processing cycle.
//! Records are stored in arrival order and drained in full by each fetch.

use crate::{
    ShipmentRecord,
    pool::{ShipmentIntake, ShipmentSource},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Pool for pending shipment records
///
/// Uses VecDeque for cheap pushes at the back and drains from the front.
/// Protected by RwLock for concurrent access from the API and the trigger.
#[derive(Default)]
pub struct ShipmentPool {
    records: RwLock<VecDeque<ShipmentRecord>>,
}

impl ShipmentPool {
    /// Creates a new empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record
    pub async fn add(&self, record: ShipmentRecord) {
        let mut records = self.records.write().await;
        records.push_back(record);
    }

    /// Append several records, keeping their order
    pub async fn add_all(&self, batch: Vec<ShipmentRecord>) {
        let mut records = self.records.write().await;
        records.extend(batch);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Remove and return every pending record
    pub async fn drain(&self) -> Vec<ShipmentRecord> {
        let mut records = self.records.write().await;
        records.drain(..).collect()
    }

    /// Put records back ahead of anything that arrived since, keeping their order
    pub async fn restore(&self, batch: Vec<ShipmentRecord>) {
        let mut records = self.records.write().await;
        for record in batch.into_iter().rev() {
            records.push_front(record);
        }
    }
}

#[async_trait]
impl ShipmentSource for ShipmentPool {
    async fn fetch(&self) -> anyhow::Result<Vec<ShipmentRecord>> {
        Ok(self.drain().await)
    }

    async fn requeue(&self, records: Vec<ShipmentRecord>) -> anyhow::Result<()> {
        self.restore(records).await;
        Ok(())
    }
}

#[async_trait]
impl ShipmentIntake for ShipmentPool {
    async fn submit(&self, records: Vec<ShipmentRecord>) -> anyhow::Result<usize> {
        let accepted = records.len();
        self.add_all(records).await;
        Ok(accepted)
    }
}
