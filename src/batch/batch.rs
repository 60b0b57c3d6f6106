//! Batch Container Module
//!
//! A batch accumulates shipments up to a volume and a weight target and
//! derives the metrics used to rank and report it.

use crate::{BatchRecord, Shipment, ValidationError, validation::validate_targets};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Assumed average density ceiling (kg per m³) used when no weight target is given
pub const DEFAULT_DENSITY_CEILING: f64 = 250.0;

/// Volume and weight targets shared by every batch of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub volume: f64,
    pub weight: f64,
}

impl Capacity {
    /// Build validated targets
    ///
    /// # Arguments
    /// * `target_volume` - cubic meters, must be positive
    /// * `target_weight` - kilograms; `None` means `target_volume × 250`
    pub fn new(target_volume: f64, target_weight: Option<f64>) -> Result<Self, ValidationError> {
        validate_targets(target_volume, target_weight)?;
        Ok(Self {
            volume: target_volume,
            weight: target_weight.unwrap_or(target_volume * DEFAULT_DENSITY_CEILING),
        })
    }

    /// Whether the shipment fits an empty batch of this capacity
    pub fn admits(&self, shipment: &Shipment) -> bool {
        shipment.volume() <= self.volume && shipment.weight() <= self.weight
    }
}

/// Capacity-bounded group of shipments travelling together
///
/// `current_volume <= capacity.volume` and `current_weight <= capacity.weight`
/// hold at all times: [`Batch::add_shipment`] refuses anything that would
/// break either bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    name: String,
    zone: Option<String>,
    capacity: Capacity,
    current_volume: f64,
    current_weight: f64,
    shipments: Vec<Shipment>,
    destination_zones: BTreeSet<String>,
    created_at: DateTime<Utc>,
    /// Recomputed on every admission
    efficiency: f64,
}

impl Batch {
    /// Creates an empty batch
    pub fn new(name: impl Into<String>, capacity: Capacity, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            zone: None,
            capacity,
            current_volume: 0.0,
            current_weight: 0.0,
            shipments: Vec::new(),
            destination_zones: BTreeSet::new(),
            created_at,
            efficiency: 0.0,
        }
    }

    /// Tag the batch as formed for a single destination zone
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Check whether the shipment fits in the remaining volume and weight
    ///
    /// Both bounds are inclusive.
    pub fn can_add(&self, shipment: &Shipment) -> bool {
        self.current_volume + shipment.volume() <= self.capacity.volume
            && self.current_weight + shipment.weight() <= self.capacity.weight
    }

    /// Add a shipment if it fits
    ///
    /// # Returns
    /// `true` if the shipment was admitted, `false` if it was refused (the
    /// batch is left untouched)
    pub fn add_shipment(&mut self, shipment: &Shipment) -> bool {
        if !self.can_add(shipment) {
            return false;
        }

        self.current_volume += shipment.volume();
        self.current_weight += shipment.weight();
        self.destination_zones
            .insert(shipment.destination_zone().to_string());
        self.shipments.push(shipment.clone());
        self.efficiency = self.compute_efficiency();
        true
    }

    fn compute_efficiency(&self) -> f64 {
        if self.shipments.is_empty() {
            return 0.0;
        }
        let zone_penalty =
            (self.destination_zones.len() as f64 / self.shipments.len() as f64) * 0.2;
        (self.fill_ratio() * 0.6 + self.weight_ratio() * 0.4) * (1.0 - zone_penalty)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    /// Shipments in admission order
    pub fn shipments(&self) -> &[Shipment] {
        &self.shipments
    }

    pub fn len(&self) -> usize {
        self.shipments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shipments.is_empty()
    }

    pub fn destination_zones(&self) -> &BTreeSet<String> {
        &self.destination_zones
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn fill_ratio(&self) -> f64 {
        self.current_volume / self.capacity.volume
    }

    pub fn weight_ratio(&self) -> f64 {
        if self.capacity.weight == 0.0 {
            0.0
        } else {
            self.current_weight / self.capacity.weight
        }
    }

    /// Utilization score penalised by zone diversity
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Days from creation until the estimated delivery
    pub fn delivery_window_days(&self) -> u32 {
        let days = 3.0 + 0.5 * self.destination_zones.len() as f64 + 2.0 * self.fill_ratio();
        days.ceil() as u32
    }

    pub fn estimated_delivery_date(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(i64::from(self.delivery_window_days()))
    }

    /// Export the fields a batch sink persists
    pub fn to_record(&self) -> BatchRecord {
        BatchRecord {
            name: self.name.clone(),
            zone: self.zone.clone(),
            volume: self.current_volume,
            weight: self.current_weight,
            shipment_count: self.shipments.len(),
            zone_count: self.destination_zones.len(),
            efficiency: self.efficiency,
            fill_ratio: self.fill_ratio(),
            weight_ratio: self.weight_ratio(),
            delivery_window_days: self.delivery_window_days(),
            estimated_delivery_date: self.estimated_delivery_date(),
            shipment_ids: self.shipments.iter().map(|s| s.id().clone()).collect(),
            created_at: self.created_at,
        }
    }
}
