use crate::{
    ShipmentRecord,
    config::SourceKind,
    pool::{ShipmentPool, ShipmentSource},
    registry::Registry,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Destination for submitted shipment records
///
/// Accepts all records or none. Returns how many were accepted.
#[async_trait]
pub trait ShipmentIntake: Send + Sync {
    async fn submit(&self, records: Vec<ShipmentRecord>) -> anyhow::Result<usize>;
}

/// Where submissions go in and where cycles read them back out
///
/// Both ends always point at the same store, so anything accepted through
/// `intake` is seen by the next fetch from `source`.
#[derive(Clone)]
pub struct ShipmentRoute {
    pub source: Arc<dyn ShipmentSource>,
    pub intake: Arc<dyn ShipmentIntake>,
}

impl ShipmentRoute {
    pub fn for_kind(kind: SourceKind, pool: Arc<ShipmentPool>, registry: Arc<Registry>) -> Self {
        match kind {
            SourceKind::Pool => Self {
                source: pool.clone(),
                intake: pool,
            },
            SourceKind::Database => Self {
                source: registry.clone(),
                intake: registry,
            },
        }
    }
}
