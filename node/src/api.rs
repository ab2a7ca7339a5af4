//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the node's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                      | Description                        |
//! |--------|---------------------------|------------------------------------|
//! | GET    | `/health`                 | Liveness probe                     |
//! | GET    | `/status`                 | Deployment summary                 |
//! | POST   | `/rpc`                    | JSON-RPC 2.0 gateway               |
//! | POST   | `/calls`                  | Submit a signed call envelope      |
//! | GET    | `/receipts/:id`           | Receipt of an executed call        |
//! | GET    | `/validators/:address`    | Validator membership               |
//! | GET    | `/employers/:address`     | Employer status and stake          |
//! | GET    | `/credentials/:token_id`  | Issued skill credential            |
//! | GET    | `/accounts/:address`      | Balance and nonce                  |
//! | POST   | `/faucet`                 | Devnet funding                     |
//! | GET    | `/ws`                     | WebSocket for live ledger events   |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use trinity_contracts::{SkillCredential, TokenId, TrinityEvent};
use trinity_protocol::amount::format_ether;
use trinity_protocol::{Address, Amount};

use crate::host::{CallEnvelope, Host, HostError, Receipt};
use crate::metrics::SharedMetrics;

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
    /// Network name (e.g. "localhost", "kovan").
    pub network: String,
    /// The deployment. Writes are serialised through the write lock.
    pub host: Arc<RwLock<Host>>,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<NodeEvent>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// A call emitted a ledger event.
    Ledger {
        receipt_id: Uuid,
        event: TrinityEvent,
    },
    /// A call reverted.
    CallReverted {
        receipt_id: Uuid,
        caller: Address,
        method: String,
        reason: String,
    },
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
        .route("/rpc", post(rpc_handler))
        .route("/calls", post(submit_call_handler))
        .route("/receipts/:id", get(receipt_handler))
        .route("/validators/:address", get(validator_handler))
        .route("/employers/:address", get(employer_handler))
        .route("/credentials/:token_id", get(credential_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/faucet", post(faucet_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// Malformed request envelope.
pub const RPC_INVALID_REQUEST: i32 = -32600;
/// Unknown method.
pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
/// Missing or malformed parameters.
pub const RPC_INVALID_PARAMS: i32 = -32602;
/// Internal failure.
pub const RPC_INTERNAL_ERROR: i32 = -32603;
/// Queried entity does not exist.
pub const RPC_NOT_FOUND: i32 = -32001;
/// The call executed and reverted.
pub const RPC_CALL_REVERTED: i32 = -32002;
/// The envelope was refused before execution.
pub const RPC_ENVELOPE_REJECTED: i32 = -32003;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Positional parameters.
    pub params: Option<serde_json::Value>,
    /// Request identifier. Echoed back in the response.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    pub chain_id: u64,
    /// Ledger custody address.
    pub contract: Address,
    pub owner: Address,
    /// Entrance fee in wei.
    #[serde(with = "trinity_protocol::amount::as_decimal_str")]
    pub entrance_fee: Amount,
    /// Entrance fee in ether, for humans.
    pub entrance_fee_ether: String,
    pub validators: usize,
    pub employers: usize,
    pub credentials: u64,
    #[serde(with = "trinity_protocol::amount::as_decimal_str")]
    pub total_staked: Amount,
    pub receipts: usize,
    pub faucet_enabled: bool,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /validators/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidatorResponse {
    pub address: Address,
    pub is_validator: bool,
}

/// Response payload for `GET /employers/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmployerResponse {
    pub address: Address,
    pub is_employer: bool,
    #[serde(with = "trinity_protocol::amount::as_decimal_str")]
    pub stake: Amount,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    /// Balance in wei.
    #[serde(with = "trinity_protocol::amount::as_decimal_str")]
    pub balance: Amount,
    /// Next nonce the account must sign with.
    pub nonce: u64,
}

/// Request body for `POST /faucet`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub address: Address,
    /// Wei to mint.
    #[serde(with = "trinity_protocol::amount::as_decimal_str")]
    pub amount: Amount,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn parse_address(raw: &str) -> Result<Address, Response> {
    raw.parse::<Address>().map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid address {:?}: {}", raw, e),
        )
    })
}

fn host_error_status(err: &HostError) -> StatusCode {
    match err {
        HostError::Nonce(_) => StatusCode::CONFLICT,
        HostError::FaucetDisabled(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    }
}

// ---------------------------------------------------------------------------
// Call Submission
// ---------------------------------------------------------------------------

/// Runs a signed call through the host and fans out its side effects:
/// metrics, and one [`NodeEvent`] per ledger event.
pub async fn submit_call(state: &AppState, envelope: &CallEnvelope) -> Result<Receipt, HostError> {
    let timer = state.metrics.call_latency_seconds.start_timer();
    let mut host = state.host.write().await;

    let receipt = match host.submit(envelope) {
        Ok(r) => r,
        Err(e) => {
            state.metrics.envelopes_rejected_total.inc();
            tracing::warn!(error = %e, "envelope rejected");
            return Err(e);
        }
    };

    state
        .metrics
        .calls_total
        .with_label_values(&[receipt.method.as_str()])
        .inc();
    state.metrics.observe_ledger(host.ledger());
    drop(host);
    timer.observe_duration();

    // Delivery is best effort; no subscribers is not an error.
    if let (Some(kind), Some(reason)) = (&receipt.error_kind, &receipt.error) {
        state
            .metrics
            .calls_reverted_total
            .with_label_values(&[kind.as_str()])
            .inc();
        let _ = state.event_tx.send(NodeEvent::CallReverted {
            receipt_id: receipt.id,
            caller: receipt.caller,
            method: receipt.method.clone(),
            reason: reason.clone(),
        });
    }
    for event in &receipt.events {
        state.metrics.observe_event(event);
        let _ = state.event_tx.send(NodeEvent::Ledger {
            receipt_id: receipt.id,
            event: event.clone(),
        });
    }

    Ok(receipt)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — deployment summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let host = state.host.read().await;
    let ledger = host.ledger();
    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        chain_id: host.chain_id(),
        contract: *ledger.address(),
        owner: *ledger.owner(),
        entrance_fee: ledger.entrance_fee(),
        entrance_fee_ether: format_ether(ledger.entrance_fee()),
        validators: ledger.validator_count(),
        employers: ledger.employer_count(),
        credentials: ledger.total_credentials(),
        total_staked: ledger.total_staked(),
        receipts: host.receipt_count(),
        faucet_enabled: host.faucet_enabled(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /calls` — executes a signed call and returns its receipt.
///
/// A reverted call is still a 200: the receipt says it reverted. Refused
/// envelopes get 400 (409 for a nonce mismatch).
async fn submit_call_handler(
    State(state): State<AppState>,
    Json(envelope): Json<CallEnvelope>,
) -> Response {
    match submit_call(&state, &envelope).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => error_response(host_error_status(&e), e.to_string()),
    }
}

/// `GET /receipts/:id`
async fn receipt_handler(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    let Ok(id) = id.parse::<Uuid>() else {
        return error_response(StatusCode::BAD_REQUEST, format!("invalid receipt id: {}", id));
    };
    let host = state.host.read().await;
    match host.receipt(&id) {
        Some(receipt) => (StatusCode::OK, Json(receipt.clone())).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("receipt not found: {}", id)),
    }
}

/// `GET /validators/:address`
async fn validator_handler(Path(raw): Path<String>, State(state): State<AppState>) -> Response {
    let address = match parse_address(&raw) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let host = state.host.read().await;
    Json(ValidatorResponse {
        address,
        is_validator: host.ledger().is_validator(&address),
    })
    .into_response()
}

/// `GET /employers/:address`
async fn employer_handler(Path(raw): Path<String>, State(state): State<AppState>) -> Response {
    let address = match parse_address(&raw) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let host = state.host.read().await;
    let ledger = host.ledger();
    Json(EmployerResponse {
        address,
        is_employer: ledger.is_employer(&address),
        stake: ledger.employer_stake(&address),
    })
    .into_response()
}

/// `GET /credentials/:token_id`
async fn credential_handler(Path(raw): Path<String>, State(state): State<AppState>) -> Response {
    let Ok(token_id) = raw.parse::<TokenId>() else {
        return error_response(StatusCode::BAD_REQUEST, format!("invalid token id: {}", raw));
    };
    let host = state.host.read().await;
    match host.ledger().credential(token_id) {
        Some(credential) => (StatusCode::OK, Json::<SkillCredential>(credential.clone())).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("credential not found: token {}", token_id),
        ),
    }
}

/// `GET /accounts/:address` — zeroed state for never-seen addresses.
async fn account_handler(Path(raw): Path<String>, State(state): State<AppState>) -> Response {
    let address = match parse_address(&raw) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let host = state.host.read().await;
    Json(AccountResponse {
        address,
        balance: host.accounts().balance_of(&address),
        nonce: host.accounts().nonce_of(&address),
    })
    .into_response()
}

/// `POST /faucet` — mints devnet funds.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Response {
    let mut host = state.host.write().await;
    match host.faucet(req.address, req.amount) {
        Ok(balance) => Json(AccountResponse {
            address: req.address,
            balance,
            nonce: host.accounts().nonce_of(&req.address),
        })
        .into_response(),
        Err(e) => error_response(host_error_status(&e), e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

/// `POST /rpc` — JSON-RPC 2.0 gateway.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let outcome = if req.jsonrpc != "2.0" {
        Err(JsonRpcError::new(
            RPC_INVALID_REQUEST,
            "Invalid Request: jsonrpc must be \"2.0\"",
        ))
    } else {
        dispatch_rpc(&state, &req).await
    };

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };
    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

/// Positional parameter `idx`, decoded as `T`.
fn param<T: DeserializeOwned>(req: &JsonRpcRequest, idx: usize, name: &str) -> Result<T, JsonRpcError> {
    let raw = req
        .params
        .as_ref()
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.get(idx))
        .ok_or_else(|| {
            JsonRpcError::new(RPC_INVALID_PARAMS, format!("Invalid params: missing {}", name))
        })?;
    serde_json::from_value(raw.clone()).map_err(|e| {
        JsonRpcError::new(RPC_INVALID_PARAMS, format!("Invalid params: {}: {}", name, e))
    })
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(RPC_INTERNAL_ERROR, format!("Internal error: {}", e)))
}

async fn dispatch_rpc(state: &AppState, req: &JsonRpcRequest) -> Result<serde_json::Value, JsonRpcError> {
    use serde_json::json;

    match req.method.as_str() {
        "trinity_getEntranceFee" => {
            let host = state.host.read().await;
            Ok(json!(host.ledger().entrance_fee().to_string()))
        }
        "trinity_isValidator" => {
            let address: Address = param(req, 0, "address")?;
            let host = state.host.read().await;
            Ok(json!(host.ledger().is_validator(&address)))
        }
        "trinity_isEmployer" => {
            let address: Address = param(req, 0, "address")?;
            let host = state.host.read().await;
            Ok(json!(host.ledger().is_employer(&address)))
        }
        "trinity_getEmployerStake" => {
            let address: Address = param(req, 0, "address")?;
            let host = state.host.read().await;
            Ok(json!(host.ledger().employer_stake(&address).to_string()))
        }
        "trinity_tokenURI" => {
            let token_id: TokenId = param(req, 0, "token_id")?;
            let host = state.host.read().await;
            host.ledger()
                .credential_uri(token_id)
                .map(|uri| json!(uri))
                .map_err(|e| JsonRpcError::new(RPC_NOT_FOUND, e.to_string()))
        }
        "trinity_ownerOf" => {
            let token_id: TokenId = param(req, 0, "token_id")?;
            let host = state.host.read().await;
            host.ledger()
                .owner_of(token_id)
                .map(|owner| json!(owner))
                .map_err(|e| JsonRpcError::new(RPC_NOT_FOUND, e.to_string()))
        }
        "trinity_getBalance" => {
            let address: Address = param(req, 0, "address")?;
            let host = state.host.read().await;
            Ok(json!(host.accounts().balance_of(&address).to_string()))
        }
        "trinity_getNonce" => {
            let address: Address = param(req, 0, "address")?;
            let host = state.host.read().await;
            Ok(json!(host.accounts().nonce_of(&address)))
        }
        "trinity_sendCall" => {
            let envelope: CallEnvelope = param(req, 0, "envelope")?;
            let receipt = submit_call(state, &envelope)
                .await
                .map_err(|e| JsonRpcError::new(RPC_ENVELOPE_REJECTED, e.to_string()))?;
            let value = to_value(&receipt)?;
            if receipt.is_success() {
                Ok(value)
            } else {
                Err(JsonRpcError {
                    code: RPC_CALL_REVERTED,
                    message: receipt
                        .error
                        .clone()
                        .unwrap_or_else(|| "call reverted".into()),
                    data: Some(value),
                })
            }
        }
        _ => Err(JsonRpcError::new(
            RPC_METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        )),
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws` — WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`]s. Client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Forwards broadcast events until the client disconnects or the channel
/// closes.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to serialize ws event");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "ws subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use trinity_contracts::TrinityCall;
    use trinity_protocol::amount::parse_ether;
    use trinity_protocol::config::CHAIN_ID_LOCALHOST;
    use trinity_protocol::{AccountBook, TrinityKeypair};

    use crate::metrics::NodeMetrics;

    fn owner_key() -> TrinityKeypair {
        TrinityKeypair::from_seed(&[1; 32])
    }

    fn alice_key() -> TrinityKeypair {
        TrinityKeypair::from_seed(&[2; 32])
    }

    fn fee() -> Amount {
        parse_ether("0.001").unwrap()
    }

    /// A localhost deployment with the owner and alice funded.
    fn test_app_state() -> AppState {
        let mut book = AccountBook::new();
        book.credit(owner_key().address(), parse_ether("10").unwrap()).unwrap();
        book.credit(alice_key().address(), parse_ether("10").unwrap()).unwrap();
        let host = Host::new(CHAIN_ID_LOCALHOST, owner_key().address(), fee(), book, true);
        let (event_tx, _) = broadcast::channel(16);
        AppState {
            version: "0.1.0-test".into(),
            network: "localhost".into(),
            host: Arc::new(RwLock::new(host)),
            event_tx,
            metrics: Arc::new(NodeMetrics::new().unwrap()),
        }
    }

    fn envelope(kp: &TrinityKeypair, nonce: u64, value: Amount, call: TrinityCall) -> serde_json::Value {
        let env = CallEnvelope::signed(kp, CHAIN_ID_LOCALHOST, nonce, value, call).unwrap();
        serde_json::to_value(env).unwrap()
    }

    fn rpc(method: &str, params: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 })
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn rpc_call(router: &Router, method: &str, params: serde_json::Value) -> JsonRpcResponse {
        let (status, body) = post_json(router, "/rpc", rpc(method, params)).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    // -- Health & status ------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_the_deployment() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.chain_id, CHAIN_ID_LOCALHOST);
        assert_eq!(resp.owner, owner_key().address());
        assert_eq!(resp.entrance_fee, fee());
        assert_eq!(resp.entrance_fee_ether, "0.001");
        assert_eq!(resp.validators, 0);
        assert!(resp.faucet_enabled);
    }

    // -- Calls ------------------------------------------------------------------

    #[tokio::test]
    async fn enlistment_via_calls_endpoint() {
        let router = create_router(test_app_state());
        let alice = alice_key();

        let (status, body) = post_json(
            &router,
            "/calls",
            envelope(&alice, 0, fee() * 2, TrinityCall::EnlistEmployer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: Receipt = serde_json::from_slice(&body).unwrap();
        assert!(receipt.is_success());

        let (status, body) = get(&router, &format!("/employers/{}", alice.address())).await;
        assert_eq!(status, StatusCode::OK);
        let resp: EmployerResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.is_employer);
        assert_eq!(resp.stake, fee() * 2);

        let (status, body) = get(&router, &format!("/receipts/{}", receipt.id)).await;
        assert_eq!(status, StatusCode::OK);
        let stored: Receipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(stored, receipt);
    }

    #[tokio::test]
    async fn replayed_envelope_conflicts() {
        let router = create_router(test_app_state());
        let env = envelope(&alice_key(), 0, fee(), TrinityCall::EnlistEmployer);

        let (status, _) = post_json(&router, "/calls", env.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_json(&router, "/calls", env).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("nonce"));
    }

    #[tokio::test]
    async fn unknown_receipt_is_404() {
        let router = create_router(test_app_state());
        let (status, _) = get(&router, &format!("/receipts/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&router, "/receipts/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn credential_lookup_after_issuance() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let owner = owner_key();

        let (status, _) = get(&router, "/credentials/0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(&router, "/credentials/first").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("first"));

        post_json(
            &router,
            "/calls",
            envelope(&owner, 0, 0, TrinityCall::AddValidator { validator: owner.address() }),
        )
        .await;
        post_json(
            &router,
            "/calls",
            envelope(
                &owner,
                1,
                0,
                TrinityCall::IssueSkillNft {
                    recipient: alice_key().address(),
                    metadata_uri: "uri://1".into(),
                },
            ),
        )
        .await;

        let (status, body) = get(&router, "/credentials/0").await;
        assert_eq!(status, StatusCode::OK);
        let cred: SkillCredential = serde_json::from_slice(&body).unwrap();
        assert_eq!(cred.metadata_uri, "uri://1");
        assert_eq!(cred.recipient, alice_key().address());

        let (_, body) = get(&router, &format!("/validators/{}", owner.address())).await;
        let resp: ValidatorResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.is_validator);
        assert_eq!(state.metrics.credentials_issued_total.get(), 1);
    }

    #[tokio::test]
    async fn bad_address_is_400() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/validators/nobody").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("invalid address"));
    }

    #[tokio::test]
    async fn faucet_funds_new_accounts() {
        let router = create_router(test_app_state());
        let who = Address::from_bytes([9; 20]);

        let (status, _) = post_json(
            &router,
            "/faucet",
            serde_json::json!({ "address": who, "amount": "1000" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, &format!("/accounts/{}", who)).await;
        let resp: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.balance, 1000);
        assert_eq!(resp.nonce, 0);
    }

    #[tokio::test]
    async fn calls_are_broadcast() {
        let state = test_app_state();
        let mut rx = state.event_tx.subscribe();
        let router = create_router(state);

        post_json(
            &router,
            "/calls",
            envelope(&alice_key(), 0, fee(), TrinityCall::EnlistEmployer),
        )
        .await;

        match rx.try_recv().unwrap() {
            NodeEvent::Ledger { event, .. } => assert_eq!(event.name(), "EmployerEnlisted"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    // -- JSON-RPC ---------------------------------------------------------------

    #[tokio::test]
    async fn rpc_entrance_fee() {
        let router = create_router(test_app_state());
        let resp = rpc_call(&router, "trinity_getEntranceFee", serde_json::json!([])).await;
        assert!(resp.error.is_none());
        assert_eq!(resp.result.unwrap(), fee().to_string());
    }

    #[tokio::test]
    async fn rpc_role_queries() {
        let router = create_router(test_app_state());
        let alice = alice_key().address();

        let resp = rpc_call(&router, "trinity_isValidator", serde_json::json!([alice])).await;
        assert_eq!(resp.result.unwrap(), false);
        let resp = rpc_call(&router, "trinity_isEmployer", serde_json::json!([alice])).await;
        assert_eq!(resp.result.unwrap(), false);
        let resp = rpc_call(&router, "trinity_getEmployerStake", serde_json::json!([alice])).await;
        assert_eq!(resp.result.unwrap(), "0");
        let resp = rpc_call(&router, "trinity_getNonce", serde_json::json!([alice])).await;
        assert_eq!(resp.result.unwrap(), 0);
    }

    #[tokio::test]
    async fn rpc_send_call_success_and_revert() {
        let router = create_router(test_app_state());
        let alice = alice_key();

        let env = envelope(&alice, 0, fee(), TrinityCall::EnlistEmployer);
        let resp = rpc_call(&router, "trinity_sendCall", serde_json::json!([env])).await;
        assert!(resp.error.is_none());

        let env = envelope(&alice, 1, 0, TrinityCall::KillSwitch);
        let resp = rpc_call(&router, "trinity_sendCall", serde_json::json!([env])).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, RPC_CALL_REVERTED);
        assert_eq!(err.data.unwrap()["error_kind"], "unauthorized");

        let resp = rpc_call(
            &router,
            "trinity_isEmployer",
            serde_json::json!([alice.address()]),
        )
        .await;
        assert_eq!(resp.result.unwrap(), true);
    }

    #[tokio::test]
    async fn rpc_rejected_envelope() {
        let router = create_router(test_app_state());
        let env = envelope(&alice_key(), 5, 0, TrinityCall::KillSwitch);
        let resp = rpc_call(&router, "trinity_sendCall", serde_json::json!([env])).await;
        assert_eq!(resp.error.unwrap().code, RPC_ENVELOPE_REJECTED);
    }

    #[tokio::test]
    async fn rpc_token_uri_not_found() {
        let router = create_router(test_app_state());
        let resp = rpc_call(&router, "trinity_tokenURI", serde_json::json!([0])).await;
        assert_eq!(resp.error.unwrap().code, RPC_NOT_FOUND);
        let resp = rpc_call(&router, "trinity_ownerOf", serde_json::json!([3])).await;
        assert_eq!(resp.error.unwrap().code, RPC_NOT_FOUND);
    }

    #[tokio::test]
    async fn rpc_bad_params() {
        let router = create_router(test_app_state());
        let resp = rpc_call(&router, "trinity_isValidator", serde_json::json!([])).await;
        assert_eq!(resp.error.unwrap().code, RPC_INVALID_PARAMS);
        let resp = rpc_call(&router, "trinity_isValidator", serde_json::json!(["0x12"])).await;
        assert_eq!(resp.error.unwrap().code, RPC_INVALID_PARAMS);
    }

    #[tokio::test]
    async fn rpc_unknown_method() {
        let router = create_router(test_app_state());
        let resp = rpc_call(&router, "eth_blockNumber", serde_json::json!([])).await;
        assert_eq!(resp.error.unwrap().code, RPC_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn rpc_invalid_version_returns_error() {
        let router = create_router(test_app_state());
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "method": "trinity_getEntranceFee",
            "params": [],
            "id": 20
        });
        let (_, body) = post_json(&router, "/rpc", body).await;
        let resp: JsonRpcResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.error.unwrap().code, RPC_INVALID_REQUEST);
    }
}
