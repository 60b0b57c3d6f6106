//! Zone Grouping Module
//!
//! Partitions shipments by their heuristic destination zone and ranks the
//! resulting groups so the bulkiest zones are packed first.

use crate::Shipment;
use std::collections::BTreeMap;

/// Shipments sharing one destination zone, in input order
#[derive(Debug, Clone)]
pub struct ZoneGroup<'a> {
    pub zone: String,
    pub shipments: Vec<&'a Shipment>,
}

impl ZoneGroup<'_> {
    pub fn total_volume(&self) -> f64 {
        self.shipments.iter().map(|s| s.volume()).sum()
    }

    pub fn len(&self) -> usize {
        self.shipments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shipments.is_empty()
    }
}

/// Group shipments by destination zone
///
/// Order inside each group follows the input order. Keys iterate in
/// lexicographic order.
pub fn group_by_zone(shipments: &[Shipment]) -> BTreeMap<String, Vec<&Shipment>> {
    let mut groups: BTreeMap<String, Vec<&Shipment>> = BTreeMap::new();
    for shipment in shipments {
        groups
            .entry(shipment.destination_zone().to_string())
            .or_default()
            .push(shipment);
    }
    groups
}

/// Order zone groups by summed member volume, largest first
///
/// The sort is stable, so zones with equal volume keep lexicographic order.
pub fn rank_by_volume(groups: BTreeMap<String, Vec<&Shipment>>) -> Vec<ZoneGroup<'_>> {
    let mut ranked: Vec<ZoneGroup<'_>> = groups
        .into_iter()
        .map(|(zone, shipments)| ZoneGroup { zone, shipments })
        .collect();
    ranked.sort_by(|a, b| b.total_volume().total_cmp(&a.total_volume()));
    ranked
}
