//! Error Module
//!
//! Validation failures raised before an aggregation run starts. Anything that
//! reaches the batching algorithm has already passed these checks.

use thiserror::Error;

/// Validation errors
///
/// Raised by record conversion, capacity construction and the orchestrator's
/// pre-flight checks. A run that hits one of these forms no batches at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("target volume must be positive, got {0}")]
    NonPositiveTargetVolume(f64),

    #[error("target weight must be positive, got {0}")]
    NonPositiveTargetWeight(f64),

    #[error("shipment {id}: {field} must not be negative, got {value}")]
    NegativeMeasurement {
        id: String,
        field: &'static str,
        value: f64,
    },

    #[error("shipment {id}: {field} is not a finite number")]
    NonFiniteMeasurement { id: String, field: &'static str },

    #[error("shipment {id}: {field} value {raw:?} is not numeric")]
    UnparseableMeasurement {
        id: String,
        field: &'static str,
        raw: String,
    },

    #[error("shipment id must not be empty")]
    EmptyShipmentId,

    #[error("shipment {0} appears more than once in the same run")]
    DuplicateShipmentId(String),
}
