//! Shipment Scheduler Module
//!
//! Wraps the configured ordering policy. The orchestrator hands it the full
//! shipment snapshot once per run and packs in the order it returns.

use crate::{Shipment, scheduler::SchedulingPolicy};
use tracing::debug;

/// Shipment scheduler
pub struct Scheduler {
    policy: Box<dyn SchedulingPolicy>,
}

impl Scheduler {
    /// Creates a new scheduler with the given policy
    pub fn new(policy: Box<dyn SchedulingPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Order a shipment snapshot for packing
    pub fn schedule(&self, shipments: Vec<Shipment>) -> Vec<Shipment> {
        debug!(
            "Scheduling {} shipments with {} policy",
            shipments.len(),
            self.policy.name()
        );
        self.policy.order_shipments(shipments)
    }
}
