//! Batch Formation Module
//!
//! This module turns shipment snapshots into delivery batches:
//! - Batch: capacity-bounded container and its derived metrics
//! - BatchBuilder: greedy single-pass packing
//! - AggregationOrchestrator: zone-aware passes, overflow pass and ranking
//! - CycleTrigger: periodic fetch / aggregate / persist cycles

#[allow(clippy::module_inception)]
mod batch;
mod builder;
mod trigger;
pub mod orchestrator;


pub use batch::{Batch, Capacity, DEFAULT_DENSITY_CEILING};
pub use builder::{BatchBuilder, BuildOutcome};
pub use orchestrator::{Aggregation, AggregationOrchestrator};
pub use trigger::CycleTrigger;
