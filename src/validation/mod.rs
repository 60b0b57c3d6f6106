//! Input Validation Module
//!
//! Checks that run before any batch is formed: shipment measurements,
//! capacity targets and identifier uniqueness within a run.

mod validator;
pub use validator::{check_measurement, parse_measurement, validate_shipments, validate_targets};
