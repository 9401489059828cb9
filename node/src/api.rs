//! # HTTP API
//!
//! The axum router exposing the node's interface: liveness, status,
//! point queries (latest or historical), account/rank/graph lookups,
//! transaction submission, and Prometheus metrics.
//!
//! | Method | Path                  | Description                        |
//! |--------|-----------------------|------------------------------------|
//! | GET    | `/health`             | Liveness probe                     |
//! | GET    | `/status`             | Node status summary                |
//! | POST   | `/txs`                | Queue a transaction for inclusion  |
//! | GET    | `/query/:store/:key`  | Raw store query (`?height=` opt.)  |
//! | GET    | `/accounts/:address`  | Balance and sequence               |
//! | GET    | `/rank/:cid`          | Latest rank score                  |
//! | GET    | `/graph/:cid`         | Outgoing/incoming neighbors        |
//! | GET    | `/metrics`            | Prometheus text exposition         |
//!
//! All reads go against committed state: either through `query` (which
//! never sees an open block) or through the mirror, which readers only
//! touch between blocks by way of the same lock the block loop holds
//! while processing.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cortex_core::app::{decode_score, CortexApp};
use cortex_core::config::{STORE_RANK, STORE_ORDER};
use cortex_core::graph::Cid;
use cortex_core::ledger::Address;
use cortex_core::tx::Transaction;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all request handlers. Cheap to clone — everything
/// behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g. "devnet").
    pub network: String,
    /// The core state machine. Writers: the block loop. Readers: here.
    pub app: Arc<RwLock<CortexApp>>,
    /// Raw transactions queued for the next development block.
    pub mempool: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Prometheus metrics.
    pub metrics: SharedMetrics,
}

/// Builds the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/txs", post(submit_tx_handler))
        .route("/query/:store/:key", get(query_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/rank/:cid", get(rank_handler))
        .route("/graph/:cid", get(graph_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    pub block_height: Option<u64>,
    pub app_hash: Option<String>,
    pub accounts: usize,
    pub cids: u64,
    pub links: u64,
    pub mempool_size: usize,
    pub timestamp: String,
}

/// Response payload for `POST /txs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitTxResponse {
    pub tx_id: String,
    pub queued: bool,
}

/// Request payload for `POST /txs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitTxRequest {
    /// Hex-encoded wire-format transaction.
    pub tx: String,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: String,
    pub balance: u64,
    pub sequence: u64,
}

/// Response payload for `GET /rank/:cid`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RankResponse {
    pub cid: String,
    pub id: u64,
    pub score: u64,
}

/// Response payload for `GET /graph/:cid`.
#[derive(Debug, Serialize, Deserialize)]
pub struct NeighborsResponse {
    pub cid: String,
    pub id: u64,
    pub out: Vec<String>,
    #[serde(rename = "in")]
    pub incoming: Vec<String>,
}

/// Uniform error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> &'static str {
    "ok"
}

async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let app = state.app.read();
    let block_height = app
        .latest_height()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let app_hash = match block_height {
        Some(height) => app
            .app_hash_at(height)
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .map(hex::encode),
        None => None,
    };

    Ok(Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        block_height,
        app_hash,
        accounts: app.mirror().account_count(),
        cids: app.mirror().cid_count(),
        links: app.mirror().link_count(),
        mempool_size: state.mempool.lock().len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn submit_tx_handler(
    State(state): State<AppState>,
    Json(request): Json<SubmitTxRequest>,
) -> Result<Json<SubmitTxResponse>, ApiError> {
    let raw = hex::decode(&request.tx)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("tx is not hex: {e}")))?;
    // Reject bytes that cannot even decode; everything else is judged
    // by the state machine at block time.
    let tx = Transaction::decode(&raw)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let tx_id = tx.id();
    state.mempool.lock().push(raw);
    tracing::debug!(tx = %tx_id, "transaction queued");
    Ok(Json(SubmitTxResponse { tx_id, queued: true }))
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    height: Option<u64>,
}

async fn query_handler(
    State(state): State<AppState>,
    Path((store, key)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !STORE_ORDER.contains(&store.as_str()) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("unknown store {store:?}"),
        ));
    }
    let key = hex::decode(&key)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("key is not hex: {e}")))?;

    let app = state.app.read();
    let value = app
        .query(&store, &key, params.height)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match value {
        Some(value) => Ok(Json(serde_json::json!({ "value": hex::encode(value) }))),
        None => Err(api_error(StatusCode::NOT_FOUND, "key not found")),
    }
}

async fn account_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let address = Address::from_hex(&address)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "invalid address"))?;

    let app = state.app.read();
    match app.mirror().account(&address) {
        Some(account) => Ok(Json(AccountResponse {
            address: address.to_hex(),
            balance: account.balance,
            sequence: account.sequence,
        })),
        None => Err(api_error(StatusCode::NOT_FOUND, "account not found")),
    }
}

async fn rank_handler(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Json<RankResponse>, ApiError> {
    let cid = Cid::new(cid).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let app = state.app.read();
    let id = app
        .mirror()
        .cid_number(&cid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "cid not registered"))?;
    let score = app
        .query(STORE_RANK, &id.to_be_bytes(), None)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .and_then(|bytes| decode_score(&bytes))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "cid not ranked yet"))?;

    Ok(Json(RankResponse {
        cid: cid.as_str().to_string(),
        id,
        score,
    }))
}

async fn graph_handler(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Json<NeighborsResponse>, ApiError> {
    let cid = Cid::new(cid).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let app = state.app.read();
    let mirror = app.mirror();
    let id = mirror
        .cid_number(&cid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "cid not registered"))?;

    let to_strings = |ids: Vec<u64>| -> Vec<String> {
        ids.into_iter()
            .filter_map(|n| mirror.cid(n).map(|c| c.as_str().to_string()))
            .collect()
    };
    let out = to_strings(mirror.out_neighbors(id).collect());
    let incoming = to_strings(mirror.in_neighbors(id).collect());

    Ok(Json(NeighborsResponse {
        cid: cid.as_str().to_string(),
        id,
        out,
        incoming,
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
