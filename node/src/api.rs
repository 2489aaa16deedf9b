// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # REST + JSON-RPC API
//!
//! Builds the axum router that exposes the exchange over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                 | Description                              |
//! |--------|----------------------|------------------------------------------|
//! | GET    | `/health`            | Liveness probe                           |
//! | GET    | `/status`            | Rate, reserve, supply, backing, root     |
//! | GET    | `/accounts/:address` | Native and credit balances               |
//! | GET    | `/events`            | Exchange events, `?since=<sequence>`     |
//! | POST   | `/rpc`               | JSON-RPC 2.0 gateway                     |
//!
//! ## JSON-RPC
//!
//! Params are a single object (or a one-element array holding it). Devnet
//! accounts are unlocked: mutating methods name their caller in `from`.
//!
//! | Method                    | Params                    | Result                |
//! |---------------------------|---------------------------|-----------------------|
//! | `ethx_exchangeRate`       |                           | rate                  |
//! | `ethx_reserve`            |                           | reserve               |
//! | `ethx_ledgerAddress`      |                           | address               |
//! | `ethx_balanceOf`          | `address`                 | credit balance        |
//! | `ethx_allowance`          | `owner`, `spender?`       | allowance             |
//! | `ethx_sendValue`          | `from`, `value`           | `{ credits }`         |
//! | `ethx_approve`            | `from`, `amount`          | `true`                |
//! | `ethx_transfer`           | `from`, `to`, `amount`    | `true`                |
//! | `ethx_exchangeTokenToEth` | `from`, `amount`          | `{ payout }`          |
//! | `ethx_setExchangeRate`    | `from`, `rate`            | `true`                |
//! | `ethx_emergencyWithdraw`  | `from`, `amount`          | `true`                |
//!
//! Amounts are decimal strings of 18-decimal base units, exactly as `Wad`
//! serializes.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ethx_contracts::{ExchangeError, ExchangeEvent, ExchangeHost, LogEntry};
use ethx_protocol::config::{NodeConfig, EXCHANGE_CONTRACT_KEY};
use ethx_protocol::storage::ExchangeDB;
use ethx_protocol::{Address, Wad};

use crate::metrics::{CallKind, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network name from the config.
    pub network: String,
    /// The live exchange. Writers hold the lock across persistence.
    pub host: Arc<RwLock<ExchangeHost>>,
    /// Persistent storage for the world and the engine.
    pub db: Arc<ExchangeDB>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Runs a mutating call under the write lock.
    ///
    /// The call runs against a copy of the host. The copy is committed to
    /// the database and only then replaces the live host, so memory and disk
    /// never disagree and a failed call leaves both untouched.
    async fn mutate<T, F>(&self, kind: CallKind, op: F) -> Result<T, JsonRpcError>
    where
        F: FnOnce(&mut ExchangeHost) -> Result<T, ExchangeError>,
    {
        let _timer = self.metrics.call_latency_seconds.start_timer();
        let mut live = self.host.write().await;
        let mut next = live.clone();

        let value = op(&mut next).map_err(|e| {
            self.metrics.rejected_calls_total.inc();
            JsonRpcError::exchange(&e)
        })?;

        persist(&self.db, &next).map_err(|e| {
            tracing::error!(error = %e, ?kind, "failed to persist exchange state");
            JsonRpcError::internal(e)
        })?;
        *live = next;

        self.metrics.record(kind);
        self.metrics.observe(&live);
        Ok(value)
    }
}

/// Writes the world and the engine snapshot in one atomic commit.
pub fn persist(db: &ExchangeDB, host: &ExchangeHost) -> Result<(), ethx_protocol::storage::DbError> {
    db.commit(host.world(), EXCHANGE_CONTRACT_KEY, host.engine())
}

/// Restores the exchange from `db`, or deploys and persists a fresh one from
/// `config` when the database is empty.
pub fn initialize_exchange(db: &ExchangeDB, config: &NodeConfig) -> anyhow::Result<ExchangeHost> {
    use anyhow::Context;

    if let Some(engine) = db
        .get_contract(EXCHANGE_CONTRACT_KEY)
        .context("failed to read exchange snapshot")?
    {
        let world = db.load_world().context("failed to load world state")?;
        let host = ExchangeHost::from_parts(world, engine);
        tracing::info!(
            engine = %host.engine().address(),
            rate = %host.rate(),
            reserve = %host.reserve(),
            commits = db.commit_count().unwrap_or(0),
            "exchange restored"
        );
        return Ok(host);
    }

    let host = ExchangeHost::deploy(&config.deployment, &config.genesis)
        .context("failed to deploy exchange")?;
    persist(db, &host).context("failed to persist deployed exchange")?;
    tracing::info!(
        engine = %host.engine().address(),
        ledger = %host.engine().ledger_address(),
        genesis_accounts = config.genesis.len(),
        "exchange deployed from config"
    );
    Ok(host)
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/events", get(events_handler))
        .route("/rpc", post(rpc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// Error code for calls the exchange rejected.
pub const EXCHANGE_ERROR: i32 = -32000;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Method parameters.
    pub params: Option<serde_json::Value>,
    /// Request identifier. Echoed back in the response.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn exchange(err: &ExchangeError) -> Self {
        Self {
            code: EXCHANGE_ERROR,
            message: err.to_string(),
            data: Some(serde_json::json!({ "kind": error_kind(err) })),
        }
    }

    fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: format!("Invalid params: {}", detail),
            data: None,
        }
    }

    fn internal(detail: impl std::fmt::Display) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: format!("Internal error: {}", detail),
            data: None,
        }
    }
}

/// Stable, machine-readable name of an exchange error.
fn error_kind(err: &ExchangeError) -> &'static str {
    match err {
        ExchangeError::InvalidAmount { .. } => "InvalidAmount",
        ExchangeError::SelfDeposit => "SelfDeposit",
        ExchangeError::InvalidRate => "InvalidRate",
        ExchangeError::Unauthorized { .. } => "Unauthorized",
        ExchangeError::InsufficientReserve { .. } => "InsufficientReserve",
        ExchangeError::InsufficientCredit { .. } => "InsufficientCredit",
        ExchangeError::Ledger(_) => "Ledger",
        ExchangeError::Native(_) => "Native",
        ExchangeError::PayoutFailed(_) => "PayoutFailed",
        ExchangeError::Arithmetic(_) => "Arithmetic",
    }
}

// -- Method params ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddressParams {
    address: Address,
}

#[derive(Debug, Deserialize)]
struct AllowanceParams {
    owner: Address,
    spender: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct SendValueParams {
    from: Address,
    value: Wad,
}

#[derive(Debug, Deserialize)]
struct AmountParams {
    from: Address,
    amount: Wad,
}

#[derive(Debug, Deserialize)]
struct TransferParams {
    from: Address,
    to: Address,
    amount: Wad,
}

#[derive(Debug, Deserialize)]
struct RateParams {
    from: Address,
    rate: Wad,
}

/// Decodes params given as an object or as a one-element array holding one.
fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, JsonRpcError> {
    let value = match params {
        Some(serde_json::Value::Array(mut items)) if items.len() == 1 => items.remove(0),
        Some(other) => other,
        None => return Err(JsonRpcError::invalid_params("missing params")),
    };
    serde_json::from_value(value).map_err(JsonRpcError::invalid_params)
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(JsonRpcError::internal)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network name.
    pub network: String,
    /// Exchange engine address.
    pub exchange: Address,
    /// Credit ledger address.
    pub ledger: Address,
    /// Account allowed to change the rate and withdraw.
    pub authority: Address,
    /// Credit token symbol.
    pub symbol: String,
    /// Current exchange rate.
    pub rate: Wad,
    /// Native currency held by the exchange.
    pub reserve: Wad,
    /// Outstanding credits.
    pub total_credit_supply: Wad,
    /// Reserve over the redemption value of all credits. Absent without credits.
    pub backing_ratio: Option<f64>,
    /// Hex-encoded state root.
    pub state_root: String,
    /// Number of exchange events emitted.
    pub event_count: usize,
    /// Number of commits applied to the database.
    pub commit_count: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    /// The queried account.
    pub address: Address,
    /// Native currency held.
    pub native_balance: Wad,
    /// Credits held.
    pub credit_balance: Wad,
    /// Credits the exchange may redeem on this account's behalf.
    pub exchange_allowance: Wad,
}

/// Query string for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events with `sequence >= since`.
    pub since: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: returns an exchange summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let host = state.host.read().await;
    let engine = host.engine();

    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        exchange: engine.address(),
        ledger: engine.ledger_address(),
        authority: engine.authority(),
        symbol: host.ledger().symbol().to_string(),
        rate: host.rate(),
        reserve: host.reserve(),
        total_credit_supply: host.total_credit_supply(),
        backing_ratio: host.backing_ratio(),
        state_root: hex::encode(host.state_root()),
        event_count: host.events().len(),
        commit_count: state.db.commit_count().unwrap_or(0),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /accounts/:address`: balances of one account.
///
/// Unknown accounts report zero balances. Malformed addresses get a 400.
async fn account_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let address: Address = match address.parse() {
        Ok(a) => a,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let host = state.host.read().await;
    let resp = AccountResponse {
        address,
        native_balance: host.native_balance(&address),
        credit_balance: host.credit_balance(&address),
        exchange_allowance: host.allowance(&address, &host.engine().address()),
    };
    (StatusCode::OK, Json(resp)).into_response()
}

/// `GET /events`: exchange events in emission order.
async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let host = state.host.read().await;
    let entries: Vec<LogEntry<ExchangeEvent>> =
        host.events().since(query.since.unwrap_or(0)).to_vec();
    Json(entries)
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
///
/// Unknown methods return error code -32601 (Method not found).
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code: INVALID_REQUEST,
                message: "Invalid Request: jsonrpc must be \"2.0\"".into(),
                data: None,
            }),
            id: req.id,
        });
    }

    let (result, error) = match dispatch(&state, &req.method, req.params).await {
        Ok(value) => (Some(value), None),
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, message = %e.message, "rpc call failed");
            (None, Some(e))
        }
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

async fn dispatch(
    state: &AppState,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        // -- Reads ----------------------------------------------------------
        "ethx_exchangeRate" => to_json(state.host.read().await.rate()),
        "ethx_reserve" => to_json(state.host.read().await.reserve()),
        "ethx_ledgerAddress" => to_json(state.host.read().await.engine().ledger_address()),
        "ethx_balanceOf" => {
            let p: AddressParams = parse_params(params)?;
            to_json(state.host.read().await.credit_balance(&p.address))
        }
        "ethx_allowance" => {
            let p: AllowanceParams = parse_params(params)?;
            let host = state.host.read().await;
            let spender = p.spender.unwrap_or_else(|| host.engine().address());
            to_json(host.allowance(&p.owner, &spender))
        }

        // -- Mutations ------------------------------------------------------
        "ethx_sendValue" => {
            let p: SendValueParams = parse_params(params)?;
            let credits = state
                .mutate(CallKind::Deposit, |host| host.receive(p.from, p.value))
                .await?;
            Ok(serde_json::json!({ "credits": credits }))
        }
        "ethx_approve" => {
            let p: AmountParams = parse_params(params)?;
            state
                .mutate(CallKind::Approval, |host| host.approve(p.from, p.amount))
                .await?;
            Ok(serde_json::json!(true))
        }
        "ethx_transfer" => {
            let p: TransferParams = parse_params(params)?;
            state
                .mutate(CallKind::Transfer, |host| {
                    host.transfer_credits(p.from, p.to, p.amount)
                })
                .await?;
            Ok(serde_json::json!(true))
        }
        "ethx_exchangeTokenToEth" => {
            let p: AmountParams = parse_params(params)?;
            let payout = state
                .mutate(CallKind::Redemption, |host| host.redeem(p.from, p.amount))
                .await?;
            Ok(serde_json::json!({ "payout": payout }))
        }
        "ethx_setExchangeRate" => {
            let p: RateParams = parse_params(params)?;
            state
                .mutate(CallKind::RateUpdate, |host| {
                    host.set_exchange_rate(p.from, p.rate)
                })
                .await?;
            Ok(serde_json::json!(true))
        }
        "ethx_emergencyWithdraw" => {
            let p: AmountParams = parse_params(params)?;
            state
                .mutate(CallKind::EmergencyWithdrawal, |host| {
                    host.emergency_withdraw(p.from, p.amount)
                })
                .await?;
            Ok(serde_json::json!(true))
        }

        _ => Err(JsonRpcError {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", method),
            data: None,
        }),
    }
}
