//! Shipment Source Module
//!
//! Where a processing cycle gets its shipment records from:
//! - `ShipmentSource`: the collaborator seam the cycle runner fetches through
//! - `ShipmentIntake`: the seam the API submits through
//! - `ShipmentPool`: in-memory FIFO fed by the API
//! - `ShipmentRoute`: pairs the intake and source for the configured kind

mod intake;
mod shipment_pool;
mod source;

pub use intake::{ShipmentIntake, ShipmentRoute};
pub use shipment_pool::ShipmentPool;
pub use source::ShipmentSource;
