//! Batch Registry Module
//!
//! Persistence for aggregation results:
//! - `BatchSink`: the collaborator seam completed batches are handed to
//! - `Registry`: SQLite store of batches and their members, which also
//!   serves pending bookings as a shipment source

mod database;
mod sink;

pub use database::Registry;
pub use sink::BatchSink;
