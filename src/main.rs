use pooler::{
    AggregationOrchestrator,
    api::Server,
    batch::CycleTrigger,
    config::Config,
    pool::{ShipmentPool, ShipmentRoute},
    registry::Registry,
    state::ReportCache,
};
use std::sync::Arc;
use tracing::{error, info};

/// The main entry point for the pooler service.
///
/// Loads configuration, opens the registry, starts the periodic processing
/// cycle in the background and serves the API in the foreground.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&path)?;
    info!("Pooler starting with config: {:?}", config);

    let registry = Arc::new(Registry::connect(&config.database.url).await?);
    let pool = Arc::new(ShipmentPool::new());
    let reports = ReportCache::new();

    // Submissions and cycles share either the in-memory pool or the bookings table
    let route = ShipmentRoute::for_kind(config.source.kind, pool, registry.clone());

    let orchestrator = Arc::new(AggregationOrchestrator::from_config(
        &config.aggregation,
        &config.scheduling,
    ));

    let trigger = CycleTrigger::new(orchestrator.clone(), route.source, registry, reports.clone());
    let trigger_config = config.trigger.clone();
    tokio::spawn(async move {
        if let Err(e) = trigger.start(trigger_config).await {
            error!("Cycle trigger error: {:?}", e);
        }
    });
    info!("Cycle trigger started");

    let server = Server::new(config, orchestrator, route.intake, reports);
    server.start().await?;

    Ok(())
}
