//! API Server Module
//!
//! This module implements a JSON-RPC server in front of the aggregation
//! service. Clients submit shipment records for the next cycle, run ad-hoc
//! aggregations, and read the report of the last processing cycle.

use crate::{
    Shipment, ShipmentRecord,
    batch::AggregationOrchestrator,
    config::Config,
    pool::ShipmentIntake,
    state::ReportCache,
    validation::validate_shipments,
};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// Shared application state that is accessible across all request handlers
///
/// - `orchestrator`: runs aggregations with the configured defaults
/// - `intake`: store the next processing cycle reads from
/// - `reports`: outcome of the most recent cycle
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<AggregationOrchestrator>,
    intake: Arc<dyn ShipmentIntake>,
    reports: ReportCache,
}

/// The main API server struct
pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Server configuration (host, port)
    /// * `orchestrator` - shared with the cycle trigger
    /// * `intake` - must feed the source the trigger fetches from
    /// * `reports` - cache the trigger writes cycle reports into
    pub fn new(
        config: Config,
        orchestrator: Arc<AggregationOrchestrator>,
        intake: Arc<dyn ShipmentIntake>,
        reports: ReportCache,
    ) -> Self {
        let state = AppState {
            orchestrator,
            intake,
            reports,
        };
        Self { config, state }
    }

    /// Router with a single POST endpoint at "/"
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .with_state(self.state.clone())
    }

    /// Binds to the configured address and serves until the listener fails
    pub async fn start(self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` is populated, never both.
#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Json<Self> {
        Json(Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        })
    }

    fn failure(id: Value, code: i32, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
            id,
        })
    }

    /// Serializes `result`, reporting an internal error if that fails
    fn from_result<T: Serialize>(id: Value, result: &T) -> Json<Self> {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => {
                error!("Failed to serialize result: {}", e);
                Self::failure(id, INTERNAL_ERROR, format!("Internal error: {}", e))
            }
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// Parameters of the `aggregate` method
///
/// Missing targets fall back to the configured defaults.
#[derive(Debug, Deserialize)]
struct AggregateParams {
    shipments: Vec<ShipmentRecord>,
    #[serde(default)]
    target_volume: Option<f64>,
    #[serde(default)]
    target_weight: Option<f64>,
}

/// Main RPC request handler
///
/// Routes the request to the appropriate handler based on the method name.
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    info!("Received RPC request: {}", request.method);

    match request.method.as_str() {
        "submitShipments" => handle_submit_shipments(state, request).await,
        "aggregate" => handle_aggregate(state, request),
        "latestReport" => handle_latest_report(state, request).await,
        _ => JsonRpcResponse::failure(request.id, METHOD_NOT_FOUND, "Method not found"),
    }
}

/// Handles the "submitShipments" RPC method
///
/// Every record is converted and ids are checked for repeats before any is
/// handed to the intake, so one bad record rejects the whole submission.
async fn handle_submit_shipments(state: AppState, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    let records: Vec<ShipmentRecord> = match serde_json::from_value(request.params) {
        Ok(records) => records,
        Err(e) => {
            warn!("Failed to deserialize shipment records: {}", e);
            return JsonRpcResponse::failure(request.id, INVALID_PARAMS, format!("Invalid params: {}", e));
        }
    };

    let checked = records
        .iter()
        .cloned()
        .map(Shipment::from_record)
        .collect::<Result<Vec<_>, _>>()
        .and_then(|shipments| validate_shipments(&shipments));
    if let Err(e) = checked {
        warn!("Rejected submission of {} records: {}", records.len(), e);
        return JsonRpcResponse::failure(request.id, INVALID_PARAMS, e.to_string());
    }

    match state.intake.submit(records).await {
        Ok(accepted) => {
            info!("Accepted {} shipments", accepted);
            JsonRpcResponse::success(request.id, serde_json::json!({ "accepted": accepted }))
        }
        Err(e) => {
            error!("Failed to accept shipments: {:?}", e);
            JsonRpcResponse::failure(request.id, INTERNAL_ERROR, format!("Failed to accept shipments: {}", e))
        }
    }
}

/// Handles the "aggregate" RPC method
///
/// Runs a one-off aggregation over the given records without touching the
/// intake or the registry.
fn handle_aggregate(state: AppState, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    let params: AggregateParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => {
            warn!("Failed to deserialize aggregate params: {}", e);
            return JsonRpcResponse::failure(request.id, INVALID_PARAMS, format!("Invalid params: {}", e));
        }
    };

    let shipments = match params
        .shipments
        .into_iter()
        .map(Shipment::from_record)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(shipments) => shipments,
        Err(e) => return JsonRpcResponse::failure(request.id, INVALID_PARAMS, e.to_string()),
    };

    let defaults = state.orchestrator.config();
    let target_volume = params.target_volume.unwrap_or(defaults.target_volume);
    let target_weight = params.target_weight.or(defaults.target_weight);

    match state.orchestrator.aggregate(&shipments, target_volume, target_weight) {
        Ok(aggregation) => JsonRpcResponse::from_result(request.id, &aggregation.to_report()),
        Err(e) => {
            warn!("Aggregation rejected: {}", e);
            JsonRpcResponse::failure(request.id, INVALID_PARAMS, e.to_string())
        }
    }
}

/// Handles the "latestReport" RPC method
///
/// Returns `null` until the first cycle has completed.
async fn handle_latest_report(state: AppState, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    match state.reports.latest().await {
        Some(report) => JsonRpcResponse::from_result(request.id, &report),
        None => JsonRpcResponse::success(request.id, Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AggregationReport, CycleReport,
        config::{AggregationConfig, SourceKind},
        pool::{ShipmentPool, ShipmentRoute},
        registry::Registry,
        scheduler::SchedulingPolicyType,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use serde_json::json;
    use tower::ServiceExt;

    fn orchestrator() -> Arc<AggregationOrchestrator> {
        Arc::new(AggregationOrchestrator::new(
            AggregationConfig::default(),
            SchedulingPolicyType::PriorityValue,
        ))
    }

    fn test_server() -> (Server, Arc<ShipmentPool>, ReportCache) {
        let pool = Arc::new(ShipmentPool::new());
        let reports = ReportCache::new();
        let server = Server::new(Config::default(), orchestrator(), pool.clone(), reports.clone());
        (server, pool, reports)
    }

    async fn call(server: &Server, method: &str, params: Value) -> JsonRpcResponse {
        let body = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn record(id: &str, height: f64, address: &str) -> Value {
        json!({
            "id": id,
            "dimension_height": height,
            "dimension_width": 100,
            "dimension_length": 100,
            "weight": 12.5,
            "delivery_address": address,
        })
    }

    #[tokio::test]
    async fn test_submit_shipments_enqueues_records() {
        let (server, pool, _) = test_server();

        let response = call(
            &server,
            "submitShipments",
            json!([record("a", 50.0, "x, Oslo, NO"), record("b", 80.0, "x, Oslo, NO")]),
        )
        .await;

        assert!(response.error.is_none());
        assert_eq!(response.result, Some(json!({ "accepted": 2 })));
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn test_submit_shipments_is_all_or_nothing() {
        let (server, pool, _) = test_server();

        let response = call(
            &server,
            "submitShipments",
            json!([record("a", 50.0, "x, Oslo, NO"), record("b", -1.0, "x, Oslo, NO")]),
        )
        .await;

        assert_eq!(response.error.map(|e| e.code), Some(INVALID_PARAMS));
        assert!(pool.is_empty().await);

        let response = call(
            &server,
            "submitShipments",
            json!([record("c", 50.0, "x, Oslo, NO"), record("c", 60.0, "x, Oslo, NO")]),
        )
        .await;

        assert_eq!(response.error.map(|e| e.code), Some(INVALID_PARAMS));
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_database_mode_submissions_reach_the_cycle() {
        let pool = Arc::new(ShipmentPool::new());
        let registry = Arc::new(Registry::in_memory().await.unwrap());
        let route = ShipmentRoute::for_kind(SourceKind::Database, pool.clone(), registry.clone());
        let server = Server::new(Config::default(), orchestrator(), route.intake.clone(), ReportCache::new());

        let response = call(
            &server,
            "submitShipments",
            json!([record("a", 100.0, "x, Oslo, NO"), record("b", 100.0, "x, Oslo, NO")]),
        )
        .await;
        assert_eq!(response.result, Some(json!({ "accepted": 2 })));
        assert!(pool.is_empty().await);

        let report = orchestrator()
            .run_cycle(route.source.as_ref(), registry.as_ref())
            .await
            .unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.persisted, 1);
        assert!(registry.pending_bookings().await.unwrap().is_empty());

        // An id already booked rejects the whole submission
        let response = call(&server, "submitShipments", json!([record("a", 100.0, "x, Oslo, NO")])).await;
        assert_eq!(response.error.map(|e| e.code), Some(INTERNAL_ERROR));
    }

    #[tokio::test]
    async fn test_pool_mode_routes_through_the_pool() {
        let pool = Arc::new(ShipmentPool::new());
        let registry = Arc::new(Registry::in_memory().await.unwrap());
        let route = ShipmentRoute::for_kind(SourceKind::Pool, pool.clone(), registry.clone());
        let server = Server::new(Config::default(), orchestrator(), route.intake.clone(), ReportCache::new());

        call(&server, "submitShipments", json!([record("a", 100.0, "x, Oslo, NO")])).await;
        assert_eq!(pool.len().await, 1);

        let report = orchestrator()
            .run_cycle(route.source.as_ref(), registry.as_ref())
            .await
            .unwrap();
        assert_eq!(report.fetched, 1);
        assert!(pool.is_empty().await);
        assert_eq!(registry.batch_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_uses_configured_defaults() {
        let (server, pool, _) = test_server();

        let response = call(
            &server,
            "aggregate",
            json!({ "shipments": [record("a", 100.0, "x, Oslo, NO"), record("b", 250.0, "x, Oslo, NO")] }),
        )
        .await;

        let report: AggregationReport = serde_json::from_value(response.result.unwrap()).unwrap();
        // 1 m³ + 2.5 m³ cannot share a 3 m³ batch
        assert_eq!(report.batches.len(), 2);
        assert!(report.unallocated.is_empty());
        assert!(report.batches[0].efficiency >= report.batches[1].efficiency);
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_aggregate_rejects_invalid_target() {
        let (server, _, _) = test_server();

        let response = call(
            &server,
            "aggregate",
            json!({ "shipments": [record("a", 100.0, "x, Oslo, NO")], "target_volume": -2.0 }),
        )
        .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.contains("target volume"));
    }

    #[tokio::test]
    async fn test_latest_report() {
        let (server, _, reports) = test_server();

        // A null result reads back as `None`
        let response = call(&server, "latestReport", Value::Null).await;
        assert!(response.error.is_none());
        assert!(response.result.is_none());

        let report = CycleReport {
            started_at: Utc::now(),
            fetched: 0,
            rejected: Vec::new(),
            persisted: 0,
            persist_failures: 0,
            requeued: 0,
            aggregation: AggregationReport {
                batches: Vec::new(),
                unallocated: Vec::new(),
                generated_at: Utc::now(),
            },
        };
        reports.update(report.clone()).await;

        let response = call(&server, "latestReport", Value::Null).await;
        let served: CycleReport = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(served, report);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (server, _, _) = test_server();
        let response = call(&server, "sendTransaction", json!({})).await;
        assert_eq!(response.error.map(|e| e.code), Some(METHOD_NOT_FOUND));
        assert_eq!(response.id, json!(1));
    }
}
