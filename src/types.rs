//! Shipment and report types shared across the crate.

use crate::{
    ValidationError,
    validation::{check_measurement, parse_measurement},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Zone assigned when a shipment has no usable address
pub const UNKNOWN_ZONE: &str = "unknown";

/// Substituted for a dimension the source left out (centimeters)
pub const DEFAULT_DIMENSION_CM: f64 = 1.0;

/// Substituted for a weight the source left out (kilograms)
pub const DEFAULT_WEIGHT_KG: f64 = 0.1;

const CUBIC_CM_PER_CUBIC_M: f64 = 1_000_000.0;

/// Opaque shipment identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(String);

impl ShipmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShipmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ShipmentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for ShipmentId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Delivery priority
///
/// The discriminant is the ordinal used by the value score and by ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal = 1,
    High = 2,
    Urgent = 3,
}

impl Priority {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Map a categorical label from the shipment source
    ///
    /// Accepts the booking labels (`standard`, `express`, `priority`), the
    /// internal names and the bare ordinals, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "standard" | "normal" | "1" => Some(Priority::Normal),
            "express" | "high" | "2" => Some(Priority::High),
            "priority" | "urgent" | "3" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// Derive the coarse destination zone from a free-text address
///
/// Takes the second-to-last comma-separated segment ("Street, City, Country"
/// yields "City"). Addresses with a single segment are their own zone; empty
/// addresses fall into [`UNKNOWN_ZONE`]. This is a string heuristic, not
/// geocoding.
pub fn destination_zone(address: &str) -> String {
    let address = address.trim();
    if address.is_empty() {
        return UNKNOWN_ZONE.to_string();
    }

    let segments: Vec<&str> = address.split(',').collect();
    let zone = if segments.len() < 2 {
        address
    } else {
        segments[segments.len() - 2].trim()
    };

    if zone.is_empty() {
        UNKNOWN_ZONE.to_string()
    } else {
        zone.to_string()
    }
}

/// Raw identifier as delivered by a source (string or integer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Integer(i64),
    Text(String),
}

impl From<RecordId> for ShipmentId {
    fn from(value: RecordId) -> Self {
        match value {
            RecordId::Integer(n) => ShipmentId::from(n),
            RecordId::Text(s) => ShipmentId::from(s.trim().to_string()),
        }
    }
}

/// Raw measurement as delivered by a source (number or numeric string)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measurement {
    Number(f64),
    Text(String),
}

impl Measurement {
    fn resolve(&self, id: &str, field: &'static str) -> Result<f64, ValidationError> {
        match self {
            Measurement::Number(value) => check_measurement(id, field, *value),
            Measurement::Text(raw) => parse_measurement(id, field, raw),
        }
    }
}

/// Untyped shipment record from a [`ShipmentSource`](crate::pool::ShipmentSource)
///
/// Every field except `id` is optional; [`Shipment::from_record`] documents
/// the substitutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: RecordId,
    #[serde(default, alias = "dimension_height")]
    pub height: Option<Measurement>,
    #[serde(default, alias = "dimension_width")]
    pub width: Option<Measurement>,
    #[serde(default, alias = "dimension_length")]
    pub length: Option<Measurement>,
    #[serde(default)]
    pub weight: Option<Measurement>,
    #[serde(default, alias = "delivery_address")]
    pub destination: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A single parcel
///
/// Immutable once built; volume and zone are derived at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shipment {
    id: ShipmentId,
    height: f64,
    width: f64,
    length: f64,
    weight: f64,
    destination: String,
    priority: Priority,
    created_at: DateTime<Utc>,
    volume: f64,
    destination_zone: String,
}

impl Shipment {
    /// Creates a shipment with normal priority, stamped now
    ///
    /// # Arguments
    /// * `height`, `width`, `length` - centimeters
    /// * `weight` - kilograms
    /// * `destination` - free-text delivery address
    pub fn new(
        id: impl Into<ShipmentId>,
        height: f64,
        width: f64,
        length: f64,
        weight: f64,
        destination: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.as_str().is_empty() {
            return Err(ValidationError::EmptyShipmentId);
        }
        let height = check_measurement(id.as_str(), "height", height)?;
        let width = check_measurement(id.as_str(), "width", width)?;
        let length = check_measurement(id.as_str(), "length", length)?;
        let weight = check_measurement(id.as_str(), "weight", weight)?;
        let destination = destination.into();

        Ok(Self {
            destination_zone: destination_zone(&destination),
            volume: (height * width * length) / CUBIC_CM_PER_CUBIC_M,
            id,
            height,
            width,
            length,
            weight,
            destination,
            priority: Priority::default(),
            created_at: Utc::now(),
        })
    }

    /// Convert a raw source record
    ///
    /// Missing dimensions become [`DEFAULT_DIMENSION_CM`], a missing weight
    /// becomes [`DEFAULT_WEIGHT_KG`], a missing or unrecognised priority is
    /// normal and a missing timestamp is now.
    pub fn from_record(record: ShipmentRecord) -> Result<Self, ValidationError> {
        let id = ShipmentId::from(record.id);
        if id.as_str().is_empty() {
            return Err(ValidationError::EmptyShipmentId);
        }

        let resolve = |field: &'static str, value: &Option<Measurement>, default: f64| match value {
            Some(m) => m.resolve(id.as_str(), field),
            None => Ok(default),
        };
        let height = resolve("height", &record.height, DEFAULT_DIMENSION_CM)?;
        let width = resolve("width", &record.width, DEFAULT_DIMENSION_CM)?;
        let length = resolve("length", &record.length, DEFAULT_DIMENSION_CM)?;
        let weight = resolve("weight", &record.weight, DEFAULT_WEIGHT_KG)?;

        let priority = match record.priority.as_deref() {
            None => Priority::Normal,
            Some(label) => Priority::from_label(label).unwrap_or_else(|| {
                warn!("Shipment {}: unknown priority {:?}, using normal", id, label);
                Priority::Normal
            }),
        };

        let mut shipment = Shipment::new(id, height, width, length, weight, record.destination)?
            .with_priority(priority);
        if let Some(created_at) = record.created_at {
            shipment = shipment.with_created_at(created_at);
        }
        Ok(shipment)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> &ShipmentId {
        &self.id
    }

    pub fn dimensions(&self) -> (f64, f64, f64) {
        (self.height, self.width, self.length)
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Volume in cubic meters
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Weight per cubic meter, 0 for a zero-volume shipment
    pub fn density(&self) -> f64 {
        if self.volume > 0.0 {
            self.weight / self.volume
        } else {
            0.0
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn destination_zone(&self) -> &str {
        &self.destination_zone
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Composite ranking metric, scaled by the priority ordinal
    pub fn value_score(&self) -> f64 {
        (self.volume * 0.7 + self.weight * 0.3) * f64::from(self.priority.ordinal())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for Shipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shipment {}, volume = {:.2}, weight = {}, destination = {}",
            self.id, self.volume, self.weight, self.destination
        )
    }
}

/// Why a shipment could not be placed in any batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnallocatedReason {
    ExceedsVolume,
    ExceedsWeight,
    ExceedsVolumeAndWeight,
}

/// A shipment left out of every batch in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnallocatedShipment {
    pub shipment_id: ShipmentId,
    pub volume: f64,
    pub weight: f64,
    pub reason: UnallocatedReason,
}

impl UnallocatedShipment {
    /// Describe a shipment the builder rejected under the given targets
    pub fn new(shipment: &Shipment, target_volume: f64, target_weight: f64) -> Self {
        let over_volume = shipment.volume() > target_volume;
        let over_weight = shipment.weight() > target_weight;
        let reason = match (over_volume, over_weight) {
            (true, true) => UnallocatedReason::ExceedsVolumeAndWeight,
            (false, true) => UnallocatedReason::ExceedsWeight,
            _ => UnallocatedReason::ExceedsVolume,
        };
        Self {
            shipment_id: shipment.id().clone(),
            volume: shipment.volume(),
            weight: shipment.weight(),
            reason,
        }
    }
}

/// Exported view of a sealed batch, handed to a [`BatchSink`](crate::registry::BatchSink)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub name: String,
    pub zone: Option<String>,
    pub volume: f64,
    pub weight: f64,
    pub shipment_count: usize,
    pub zone_count: usize,
    pub efficiency: f64,
    pub fill_ratio: f64,
    pub weight_ratio: f64,
    pub delivery_window_days: u32,
    pub estimated_delivery_date: DateTime<Utc>,
    pub shipment_ids: Vec<ShipmentId>,
    pub created_at: DateTime<Utc>,
}

/// Serializable outcome of one aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub batches: Vec<BatchRecord>,
    pub unallocated: Vec<UnallocatedShipment>,
    pub generated_at: DateTime<Utc>,
}

/// Fetched record left out of a cycle because it failed conversion or
/// repeated an id already admitted in the same cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub shipment_id: ShipmentId,
    pub reason: String,
}

/// Summary of one scheduled processing cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub fetched: usize,
    /// Fetched records that never reached aggregation
    pub rejected: Vec<RejectedRecord>,
    pub persisted: usize,
    pub persist_failures: usize,
    /// Records handed back to the source because their batch was not stored
    pub requeued: usize,
    pub aggregation: AggregationReport,
}
