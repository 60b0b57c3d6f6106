//! Batch Orchestrator Module
//!
//! Connects ordering, zone grouping and the batch builder into one
//! aggregation run, and drives the fetch / aggregate / persist cycle around
//! it.
//!
//! # Aggregation Flow
//! 1. Validate targets and shipment ids (fail before any batch is formed)
//! 2. Order shipments through the `Scheduler`
//! 3. Group by destination zone, bulkiest zone first
//! 4. Zone groups with enough members get dedicated, zone-tagged batches
//! 5. Everything else (small groups, zone overflow) goes through one general pass
//! 6. Rank all batches by efficiency, highest first

use crate::{
    AggregationReport, CycleReport, RejectedRecord, Shipment, ShipmentId, ShipmentRecord,
    UnallocatedShipment, ValidationError,
    batch::{Batch, BatchBuilder, Capacity},
    config::{AggregationConfig, SchedulingConfig},
    pool::ShipmentSource,
    registry::BatchSink,
    scheduler::{Scheduler, SchedulingPolicyType, create_policy},
    validation::validate_shipments,
    zones::{group_by_zone, rank_by_volume},
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Outcome of one aggregation run
///
/// Every input shipment is either in exactly one batch or listed in
/// `unallocated`.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Non-empty batches, highest efficiency first
    pub batches: Vec<Batch>,
    /// Shipments too large for an empty batch
    pub unallocated: Vec<UnallocatedShipment>,
    pub generated_at: DateTime<Utc>,
}

impl Aggregation {
    fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            batches: Vec::new(),
            unallocated: Vec::new(),
            generated_at,
        }
    }

    /// Number of shipments placed in a batch
    pub fn allocated_count(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    pub fn to_report(&self) -> AggregationReport {
        AggregationReport {
            batches: self.batches.iter().map(Batch::to_record).collect(),
            unallocated: self.unallocated.clone(),
            generated_at: self.generated_at,
        }
    }
}

/// Aggregation orchestrator
///
/// Stateless between runs: every call works on its own snapshot, so one
/// instance can be shared by the API and the trigger.
pub struct AggregationOrchestrator {
    /// Orders shipments before grouping
    scheduler: Scheduler,
    /// Default targets and zone threshold
    config: AggregationConfig,
}

impl AggregationOrchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    /// * `config` - default targets and the minimum zone group size
    /// * `policy` - ordering policy applied before grouping
    pub fn new(config: AggregationConfig, policy: SchedulingPolicyType) -> Self {
        Self {
            scheduler: Scheduler::new(create_policy(policy)),
            config,
        }
    }

    pub fn from_config(aggregation: &AggregationConfig, scheduling: &SchedulingConfig) -> Self {
        Self::new(aggregation.clone(), scheduling.policy_type)
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Group shipments into batches ranked by efficiency
    ///
    /// # Arguments
    /// * `shipments` - immutable snapshot, read only
    /// * `target_volume` - batch volume capacity, must be positive
    /// * `target_weight` - batch weight capacity; `None` derives it from the volume
    ///
    /// # Returns
    /// * `Ok(Aggregation)` - empty input yields an empty aggregation
    /// * `Err(ValidationError)` - bad targets or duplicate ids; nothing was batched
    pub fn aggregate(
        &self,
        shipments: &[Shipment],
        target_volume: f64,
        target_weight: Option<f64>,
    ) -> Result<Aggregation, ValidationError> {
        self.aggregate_at(shipments, target_volume, target_weight, Utc::now())
    }

    /// [`aggregate`](Self::aggregate) with an explicit run timestamp
    ///
    /// The timestamp is stamped on every batch and drives batch names and
    /// delivery dates.
    #[instrument(skip(self, shipments), fields(
        shipments = shipments.len(),
        policy = self.scheduler.policy_name()
    ))]
    pub fn aggregate_at(
        &self,
        shipments: &[Shipment],
        target_volume: f64,
        target_weight: Option<f64>,
        run_at: DateTime<Utc>,
    ) -> Result<Aggregation, ValidationError> {
        let capacity = Capacity::new(target_volume, target_weight)?;
        validate_shipments(shipments)?;

        if shipments.is_empty() {
            debug!("No shipments to aggregate");
            return Ok(Aggregation::empty(run_at));
        }

        let ordered = self.scheduler.schedule(shipments.to_vec());
        let mut builder = BatchBuilder::new(run_at);

        // Zone passes: dedicated batches for groups large enough to fill them
        let mut zone_batches = Vec::new();
        let mut deferred: HashSet<&ShipmentId> = HashSet::new();
        for group in rank_by_volume(group_by_zone(&ordered)) {
            if group.len() < self.config.min_zone_group_size {
                debug!(
                    "Zone {} has {} shipments, deferring to general batching",
                    group.zone,
                    group.len()
                );
                deferred.extend(group.shipments.iter().map(|&s| s.id()));
                continue;
            }

            let outcome = builder.build(group.shipments.iter().copied(), capacity, Some(group.zone.as_str()));
            debug!(
                "Zone {}: {} shipments -> {} batches, {} overflow",
                group.zone,
                group.len(),
                outcome.batches.len(),
                outcome.rejected.len()
            );
            deferred.extend(outcome.rejected.iter().map(|&s| s.id()));
            zone_batches.extend(outcome.batches);
        }

        // General pass over everything left, in scheduled order
        let remaining = ordered.iter().filter(|s| deferred.contains(s.id()));
        let general = builder.build(remaining, capacity, None);

        let unallocated: Vec<UnallocatedShipment> = general
            .rejected
            .iter()
            .map(|s| {
                warn!(
                    "Shipment {} cannot fit any batch (volume={:.3}/{}, weight={:.3}/{})",
                    s.id(),
                    s.volume(),
                    capacity.volume,
                    s.weight(),
                    capacity.weight
                );
                UnallocatedShipment::new(s, capacity.volume, capacity.weight)
            })
            .collect();

        let mut batches = zone_batches;
        batches.extend(general.batches);
        // Stable: equal efficiencies keep zone batches ahead of general ones
        batches.sort_by(|a, b| b.efficiency().total_cmp(&a.efficiency()));

        info!(
            "Aggregated {} shipments into {} batches ({} unallocated)",
            shipments.len(),
            batches.len(),
            unallocated.len()
        );

        Ok(Aggregation {
            batches,
            unallocated,
            generated_at: run_at,
        })
    }

    /// Run one processing cycle
    ///
    /// 1. Fetch records from the source
    /// 2. Convert them; invalid records and repeated ids are reported in
    ///    `CycleReport::rejected` and left out, the rest carry on
    /// 3. Aggregate with the configured targets
    /// 4. Hand each batch to the sink; failures are logged and counted, and
    ///    the remaining batches are still handed over
    ///
    /// Records are never dropped unreported: if aggregation fails every
    /// fetched record is requeued before the error is returned, and the
    /// members of a batch the sink refused are requeued as well.
    pub async fn run_cycle(
        &self,
        source: &dyn ShipmentSource,
        sink: &dyn BatchSink,
    ) -> anyhow::Result<CycleReport> {
        let started_at = Utc::now();
        let records = source.fetch().await?;
        let fetched = records.len();

        let admission = admit_records(&records);
        let aggregation = match self.aggregate_at(
            &admission.shipments,
            self.config.target_volume,
            self.config.target_weight,
            started_at,
        ) {
            Ok(aggregation) => aggregation,
            Err(e) => {
                warn!("Aggregation failed, returning {} records to the source", fetched);
                source
                    .requeue(records)
                    .await
                    .context("failed to requeue records after an aborted cycle")?;
                return Err(e.into());
            }
        };

        let mut persisted = 0;
        let mut persist_failures = 0;
        let mut unstored = Vec::new();
        for (i, batch) in aggregation.batches.iter().enumerate() {
            info!(
                "Batch {}: {} shipments, volume={:.2}m³, weight={:.1}kg, efficiency={:.3}",
                i + 1,
                batch.len(),
                batch.current_volume(),
                batch.current_weight(),
                batch.efficiency()
            );
            match sink.store(&batch.to_record()).await {
                Ok(()) => persisted += 1,
                Err(e) => {
                    warn!("Failed to store batch {}: {:?}", batch.name(), e);
                    persist_failures += 1;
                    unstored.extend(
                        batch
                            .shipments()
                            .iter()
                            .filter_map(|s| admission.origins.get(s.id()))
                            .map(|&index| records[index].clone()),
                    );
                }
            }
        }

        let requeued = unstored.len();
        if requeued > 0 {
            source
                .requeue(unstored)
                .await
                .context("failed to requeue members of unstored batches")?;
        }

        Ok(CycleReport {
            started_at,
            fetched,
            rejected: admission.rejected,
            persisted,
            persist_failures,
            requeued,
            aggregation: aggregation.to_report(),
        })
    }
}

/// Fetched records split into shipments ready to aggregate and rejections
struct Admission {
    shipments: Vec<Shipment>,
    /// Index into the fetched records for every admitted shipment
    origins: HashMap<ShipmentId, usize>,
    rejected: Vec<RejectedRecord>,
}

/// Convert fetched records, keeping the first record for each id
fn admit_records(records: &[ShipmentRecord]) -> Admission {
    let mut admission = Admission {
        shipments: Vec::with_capacity(records.len()),
        origins: HashMap::with_capacity(records.len()),
        rejected: Vec::new(),
    };

    for (index, record) in records.iter().enumerate() {
        let shipment_id = ShipmentId::from(record.id.clone());
        let outcome = Shipment::from_record(record.clone()).and_then(|shipment| {
            if admission.origins.contains_key(shipment.id()) {
                Err(ValidationError::DuplicateShipmentId(shipment.id().to_string()))
            } else {
                Ok(shipment)
            }
        });

        match outcome {
            Ok(shipment) => {
                admission.origins.insert(shipment.id().clone(), index);
                admission.shipments.push(shipment);
            }
            Err(e) => {
                warn!("Skipping record {}: {}", shipment_id, e);
                admission.rejected.push(RejectedRecord {
                    shipment_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    admission
}
