//! Shipment Scheduling Module
//!
//! Ordering policies that decide the sequence shipments are fed to the batch
//! builder, using the Strategy design pattern:
//! - PriorityValue: priority first, value score breaking ties (default)
//! - Arrival: input order untouched
//! - HeaviestFirst: weight, heaviest first
//!
//! Every policy sorts stably so equal keys keep their input order.

mod scheduler;
mod policies;


pub use scheduler::Scheduler;
pub use policies::{
    SchedulingPolicy,
    SchedulingPolicyType,
    PriorityValuePolicy,
    ArrivalPolicy,
    HeaviestFirstPolicy,
    create_policy,
};
