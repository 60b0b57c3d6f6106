use crate::{Shipment, ValidationError};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Check a single physical measurement of a shipment
///
/// Zero is accepted (a zero-volume shipment has density 0); negative and
/// non-finite values are not.
pub fn check_measurement(id: &str, field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteMeasurement {
            id: id.to_string(),
            field,
        });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeMeasurement {
            id: id.to_string(),
            field,
            value,
        });
    }
    Ok(value)
}

/// Parse a measurement delivered as text by the shipment source
pub fn parse_measurement(id: &str, field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::UnparseableMeasurement {
            id: id.to_string(),
            field,
            raw: raw.to_string(),
        })?;
    check_measurement(id, field, value)
}

/// Validate the capacity targets of a run
///
/// `target_weight` is optional; when present it must be positive too.
pub fn validate_targets(target_volume: f64, target_weight: Option<f64>) -> Result<(), ValidationError> {
    if !(target_volume.is_finite() && target_volume > 0.0) {
        return Err(ValidationError::NonPositiveTargetVolume(target_volume));
    }
    if let Some(weight) = target_weight {
        if !(weight.is_finite() && weight > 0.0) {
            return Err(ValidationError::NonPositiveTargetWeight(weight));
        }
    }
    Ok(())
}

/// Validate a shipment snapshot before aggregation
///
/// Measurements are already checked at construction, so this only has to
/// guarantee that every identifier occurs once.
pub fn validate_shipments(shipments: &[Shipment]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(shipments.len());
    for shipment in shipments {
        if !seen.insert(shipment.id()) {
            warn!("Duplicate shipment id {} in aggregation input", shipment.id());
            return Err(ValidationError::DuplicateShipmentId(shipment.id().to_string()));
        }
    }
    debug!("Validated {} shipments", shipments.len());
    Ok(())
}
