//! Batch Builder Module
//!
//! Greedy single-pass packing of an ordered shipment stream into batches.
//! No backtracking and no reordering: the order the shipments arrive in
//! decides the result.

use crate::{
    Shipment,
    batch::{Batch, Capacity},
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Result of one builder pass
#[derive(Debug)]
pub struct BuildOutcome<'a> {
    /// Sealed, non-empty batches in the order they were closed
    pub batches: Vec<Batch>,
    /// Shipments that did not fit even an empty batch
    pub rejected: Vec<&'a Shipment>,
}

/// Batch builder
///
/// Creates batches and names them from the run timestamp plus a sequential
/// counter, so names stay unique across every pass of the same run. The
/// timestamp carries nanoseconds so runs started within the same second
/// still get distinct names.
pub struct BatchBuilder {
    /// Timestamp stamped on every batch of this run
    created_at: DateTime<Utc>,
    /// Run label used as the name prefix
    label: String,
    /// Next batch number to assign (starts at 1)
    next_batch_id: u64,
}

impl BatchBuilder {
    /// Creates a builder for a run started at `created_at`
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            label: created_at.format("%Y%m%d%H%M%S-%9f").to_string(),
            created_at,
            next_batch_id: 1,
        }
    }

    /// Pack shipments in input order
    ///
    /// Each shipment goes into the open batch if both bounds allow it.
    /// Otherwise the open batch is sealed and the shipment starts a fresh
    /// one; if it does not fit an empty batch it is returned in
    /// [`BuildOutcome::rejected`]. Batches are opened on their first
    /// admission, so every name handed out belongs to a returned batch.
    ///
    /// # Arguments
    /// * `shipments` - ordered shipments to pack
    /// * `capacity` - targets for every batch of this pass
    /// * `zone` - tag for zone-specific passes, `None` for general batches
    pub fn build<'a, I>(&mut self, shipments: I, capacity: Capacity, zone: Option<&str>) -> BuildOutcome<'a>
    where
        I: IntoIterator<Item = &'a Shipment>,
    {
        let mut batches = Vec::new();
        let mut rejected = Vec::new();
        let mut current: Option<Batch> = None;

        for shipment in shipments {
            if let Some(batch) = current.as_mut() {
                if batch.add_shipment(shipment) {
                    continue;
                }
                batches.extend(current.take());
            }

            if !capacity.admits(shipment) {
                debug!(
                    "Shipment {} (volume={:.3}, weight={:.3}) exceeds batch capacity",
                    shipment.id(),
                    shipment.volume(),
                    shipment.weight()
                );
                rejected.push(shipment);
                continue;
            }

            let mut batch = self.open_batch(capacity, zone);
            batch.add_shipment(shipment);
            current = Some(batch);
        }

        batches.extend(current);

        debug!(
            "Builder pass{} produced {} batches, {} rejected",
            zone.map(|z| format!(" for zone {z}")).unwrap_or_default(),
            batches.len(),
            rejected.len()
        );

        BuildOutcome { batches, rejected }
    }

    fn open_batch(&mut self, capacity: Capacity, zone: Option<&str>) -> Batch {
        let name = format!("batch-{}-{:03}", self.label, self.next_batch_id);
        self.next_batch_id += 1;

        let batch = Batch::new(name, capacity, self.created_at);
        match zone {
            Some(zone) => batch.with_zone(zone),
            None => batch,
        }
    }
}
