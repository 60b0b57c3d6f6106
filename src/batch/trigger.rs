//! Batch Trigger Module
//!
//! Runs processing cycles on a fixed interval. Each completed cycle's report
//! is stored in the `ReportCache`; a failed cycle is logged and the loop
//! carries on with the next tick.

use crate::{
    CycleReport,
    batch::AggregationOrchestrator,
    config::TriggerConfig,
    pool::ShipmentSource,
    registry::BatchSink,
    state::ReportCache,
};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Periodic cycle trigger
pub struct CycleTrigger {
    orchestrator: Arc<AggregationOrchestrator>,
    source: Arc<dyn ShipmentSource>,
    sink: Arc<dyn BatchSink>,
    reports: ReportCache,
}

impl CycleTrigger {
    /// Creates a trigger over the given collaborators
    ///
    /// The collaborators are owned by the caller and shared by reference.
    pub fn new(
        orchestrator: Arc<AggregationOrchestrator>,
        source: Arc<dyn ShipmentSource>,
        sink: Arc<dyn BatchSink>,
        reports: ReportCache,
    ) -> Self {
        Self {
            orchestrator,
            source,
            sink,
            reports,
        }
    }

    /// Run a single cycle and record its report
    pub async fn fire(&self) -> anyhow::Result<CycleReport> {
        let report = self
            .orchestrator
            .run_cycle(self.source.as_ref(), self.sink.as_ref())
            .await?;
        self.reports.update(report.clone()).await;
        Ok(report)
    }

    /// Run cycles forever at the configured interval
    ///
    /// Overlong cycles delay the next tick rather than causing a burst.
    pub async fn start(self, config: TriggerConfig) -> anyhow::Result<()> {
        let period = Duration::from_secs(config.interval_secs.max(1));
        info!(
            "Cycle trigger starting: interval={}s, run_on_start={}",
            period.as_secs(),
            config.run_on_start
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !config.run_on_start {
            // The first tick of a tokio interval completes immediately
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            debug!("Cycle trigger fired");

            match self.fire().await {
                Ok(report) if report.fetched == 0 => {
                    debug!("No shipments to process");
                }
                Ok(report) => {
                    info!(
                        "Cycle complete: {} fetched, {} rejected, {} batches, {} unallocated, {} persisted, {} failed, {} requeued",
                        report.fetched,
                        report.rejected.len(),
                        report.aggregation.batches.len(),
                        report.aggregation.unallocated.len(),
                        report.persisted,
                        report.persist_failures,
                        report.requeued
                    );
                }
                Err(e) => {
                    error!("Processing cycle failed: {:?}", e);
                }
            }
        }
    }
}
