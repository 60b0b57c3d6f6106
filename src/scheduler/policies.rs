//! Scheduling Policies Module
//!
//! Concrete ordering strategies and the factory that maps the configured
//! policy type to an instance.

use crate::Shipment;
use serde::Deserialize;

/// Strategy for ordering shipments before packing
pub trait SchedulingPolicy: Send + Sync {
    /// Human-readable policy name, used in logs
    fn name(&self) -> &'static str;

    /// Return the shipments in packing order
    fn order_shipments(&self, shipments: Vec<Shipment>) -> Vec<Shipment>;
}

/// Policy selector as it appears in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SchedulingPolicyType {
    #[default]
    PriorityValue,
    Arrival,
    HeaviestFirst,
}

/// Urgent shipments first; within a priority, higher value score first
pub struct PriorityValuePolicy;

impl SchedulingPolicy for PriorityValuePolicy {
    fn name(&self) -> &'static str {
        "PriorityValue"
    }

    fn order_shipments(&self, mut shipments: Vec<Shipment>) -> Vec<Shipment> {
        // sort_by is stable
        shipments.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| b.value_score().total_cmp(&a.value_score()))
        });
        shipments
    }
}

/// Keep shipments in the order the source delivered them
pub struct ArrivalPolicy;

impl SchedulingPolicy for ArrivalPolicy {
    fn name(&self) -> &'static str {
        "Arrival"
    }

    fn order_shipments(&self, shipments: Vec<Shipment>) -> Vec<Shipment> {
        shipments
    }
}

/// Heaviest shipments first
pub struct HeaviestFirstPolicy;

impl SchedulingPolicy for HeaviestFirstPolicy {
    fn name(&self) -> &'static str {
        "HeaviestFirst"
    }

    fn order_shipments(&self, mut shipments: Vec<Shipment>) -> Vec<Shipment> {
        shipments.sort_by(|a, b| b.weight().total_cmp(&a.weight()));
        shipments
    }
}

/// Create a policy instance from its configured type
pub fn create_policy(policy_type: SchedulingPolicyType) -> Box<dyn SchedulingPolicy> {
    match policy_type {
        SchedulingPolicyType::PriorityValue => Box::new(PriorityValuePolicy),
        SchedulingPolicyType::Arrival => Box::new(ArrivalPolicy),
        SchedulingPolicyType::HeaviestFirst => Box::new(HeaviestFirstPolicy),
    }
}
