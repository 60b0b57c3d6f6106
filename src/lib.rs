//! This crate groups shipments into consolidated batches.
//! It includes modules for shipment types, validation, zone grouping,
//! ordering policies, batch formation, persistence, and the JSON-RPC API.

pub mod types; // Shipment, batch record and report types.
pub mod error; // Validation errors raised before a run starts.
pub mod api; // JSON-RPC server for submissions and ad-hoc aggregation.
pub mod validation; // Measurement, target and id checks.
pub mod state; // Latest cycle report.
pub mod pool; // In-memory shipment pool and the source seam.
pub mod zones; // Destination zone grouping.
pub mod scheduler; // Shipment ordering policies.
pub mod batch; // Batch container, greedy builder and orchestration.
pub mod registry; // SQLite persistence and the sink seam.
pub mod config; // Defines and loads service configuration.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use error::ValidationError;
pub use config::Config;
pub use batch::{AggregationOrchestrator, Batch, Capacity};
