//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC calls to the command handlers. A `subscribe`
//! call turns the connection into a stream of `event` notifications.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use wrb_board::{BoardError, PaymentError};
use wrb_feeds::FeedError;
use wrb_types::EventRecord;

use crate::commands;
use crate::events::EventFilter;
use crate::host::HostError;
use crate::NodeState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC notification pushed to subscribers.
#[derive(Debug, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Successful response to request `id`.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response to request `id`.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    fn detailed(code: i32, message: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            code,
            message,
            Some(serde_json::json!({"detail": detail.to_string()})),
        )
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            -32601,
            "METHOD_NOT_FOUND",
            Some(serde_json::json!({"method": method})),
        )
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::detailed(-32602, "INVALID_PARAMS", detail)
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::detailed(-32603, "INTERNAL_ERROR", detail)
    }

    // Board errors

    /// Unauthorized (-32001).
    pub fn unauthorized(detail: &str) -> Self {
        Self::detailed(-32001, "UNAUTHORIZED", detail)
    }

    /// Insufficient reward (-32004).
    pub fn insufficient_reward(paid: u128, required: u128) -> Self {
        Self::new(
            -32004,
            "INSUFFICIENT_REWARD",
            Some(serde_json::json!({"paid": paid.to_string(), "required": required.to_string()})),
        )
    }

    /// Insufficient balance (-32040).
    pub fn insufficient_balance(requested: u128, available: u128) -> Self {
        Self::new(
            -32040,
            "INSUFFICIENT_BALANCE",
            Some(serde_json::json!({
                "requested": requested.to_string(),
                "available": available.to_string(),
            })),
        )
    }

    /// Dev methods disabled (-32070).
    pub fn dev_disabled() -> Self {
        Self::new(-32070, "DEV_MODE_DISABLED", None)
    }
}

impl From<BoardError> for RpcError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::Unauthorized { .. } => Self::unauthorized(&e.to_string()),
            BoardError::InvalidSla(_) | BoardError::CallbackGasLimitTooHigh { .. } => {
                Self::detailed(-32002, "INVALID_SLA", e)
            }
            BoardError::InvalidCallbackRecipient(_) => {
                Self::detailed(-32003, "INVALID_CALLBACK_RECIPIENT", e)
            }
            BoardError::InsufficientReward { paid, required } => {
                Self::insufficient_reward(paid, required)
            }
            BoardError::NotPosted { .. } => Self::detailed(-32005, "NOT_POSTED", e),
            BoardError::UnknownQuery(_) => Self::detailed(-32006, "UNKNOWN_QUERY", e),
            BoardError::InvalidResult(_) | BoardError::FutureTimestamp { .. } => {
                Self::detailed(-32007, "INVALID_RESULT", e)
            }
            BoardError::InvalidQueryDefinition(_) => {
                Self::detailed(-32008, "INVALID_QUERY_DEFINITION", e)
            }
            BoardError::NotFetchable { .. } => Self::detailed(-32009, "NOT_FETCHABLE", e),
            BoardError::ZeroAddress => Self::invalid_params(&e.to_string()),
            BoardError::Payment(p) => p.into(),
            BoardError::EscrowInvariant(_)
            | BoardError::Codec(_)
            | BoardError::Overflow
            | BoardError::InvalidConfig(_) => Self::internal_error(&e.to_string()),
        }
    }
}

impl From<PaymentError> for RpcError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::InsufficientBalance {
                available,
                requested,
                ..
            } => Self::insufficient_balance(requested, available),
            _ => Self::detailed(-32041, "PAYMENT_FAILED", e),
        }
    }
}

impl From<FeedError> for RpcError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::UnknownFeed(_) => Self::detailed(-32050, "UNKNOWN_FEED", e),
            FeedError::StaleData { .. }
            | FeedError::Paused(_)
            | FeedError::InsufficientObservations { .. }
            | FeedError::EmptyWindow => Self::detailed(-32051, "FEED_UNAVAILABLE", e),
            _ => Self::internal_error(&e.to_string()),
        }
    }
}

impl From<HostError> for RpcError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Board(e) => e.into(),
            HostError::Payment(e) => e.into(),
            HostError::Feed(e) => e.into(),
        }
    }
}

impl From<wrb_db::DbError> for RpcError {
    fn from(e: wrb_db::DbError) -> Self {
        match e {
            wrb_db::DbError::NotFound(what) => Self::detailed(-32006, "NOT_FOUND", what),
            other => Self::internal_error(&format!("db error: {other}")),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<NodeState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Server listening on `socket_path` once [`run`](Self::run) is called.
    pub fn new(state: Arc<NodeState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("RPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    state: Arc<NodeState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let request = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => request,
            Err(_) => {
                let response = RpcResponse::error(serde_json::Value::Null, RpcError::parse_error());
                write_line(&mut writer, &response).await?;
                continue;
            }
        };

        if request.method == "subscribe" {
            let filter = if request.params.is_null() {
                Ok(EventFilter::default())
            } else {
                serde_json::from_value::<EventFilter>(request.params.clone())
            };
            match filter {
                Ok(filter) => {
                    // Subscribe before acknowledging so no event slips in between.
                    let events = state.event_bus.subscribe();
                    let response =
                        RpcResponse::success(request.id, serde_json::json!({"subscribed": true}));
                    write_line(&mut writer, &response).await?;
                    return stream_events(events, filter, reader, writer).await;
                }
                Err(e) => {
                    let response = RpcResponse::error(
                        request.id,
                        RpcError::invalid_params(&e.to_string()),
                    );
                    write_line(&mut writer, &response).await?;
                    continue;
                }
            }
        }

        let response = dispatch_request(&state, request).await;
        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

/// Push matching events until the client hangs up.
async fn stream_events(
    mut events: broadcast::Receiver<EventRecord>,
    filter: EventFilter,
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
) -> anyhow::Result<()> {
    let mut line = String::new();
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(record) => {
                    if filter.matches(&record) {
                        let notification = RpcNotification {
                            jsonrpc: "2.0".to_string(),
                            method: "event".to_string(),
                            params: serde_json::to_value(&record)?,
                        };
                        write_line(&mut writer, &notification).await?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            read = reader.read_line(&mut line) => {
                if read? == 0 {
                    break;
                }
                // Input on a subscription is ignored.
                line.clear();
            }
        }
    }
    Ok(())
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: &Arc<NodeState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    if method.starts_with("dev_") && !state.config.advanced.dev_mode {
        return RpcResponse::error(id, RpcError::dev_disabled());
    }

    let result = match method {
        // Requesters
        "post" => commands::queries::post(state, params).await,
        "upgradeReward" => commands::queries::upgrade_reward(state, params).await,
        "fetchQueryResponse" => commands::queries::fetch_query_response(state, params).await,

        // Reads
        "getQueryStatus" => commands::queries::get_query_status(state, params).await,
        "getQueryStatuses" => commands::queries::get_query_statuses(state, params).await,
        "getQuery" => commands::queries::get_query(state, params).await,
        "getQueryRequest" => commands::queries::get_query_request(state, params).await,
        "getQueryResponse" => commands::queries::get_query_response(state, params).await,
        "getQueryResultError" => commands::queries::get_query_result_error(state, params).await,
        "getNextQueryId" => commands::queries::get_next_query_id(state).await,
        "estimateBaseFee" => commands::queries::estimate_base_fee(state, params).await,
        "estimateBaseFeeWithCallback" => {
            commands::queries::estimate_base_fee_with_callback(state, params).await
        }
        "estimateReportEarnings" => {
            commands::queries::estimate_report_earnings(state, params).await
        }
        "getEvents" => commands::queries::get_events(state, params).await,
        "getQueryHistory" => commands::queries::get_query_history(state, params).await,
        "getIndexedQuery" => commands::queries::get_indexed_query(state, params).await,

        // Reporters
        "report" => commands::reporting::report(state, params).await,
        "reportBatch" => commands::reporting::report_batch(state, params).await,

        // Owner
        "setReporters" => commands::admin::set_reporters(state, params).await,
        "unsetReporters" => commands::admin::unset_reporters(state, params).await,
        "transferOwnership" => commands::admin::transfer_ownership(state, params).await,
        "acceptOwnership" => commands::admin::accept_ownership(state, params).await,
        "owner" => commands::admin::owner(state).await,
        "isReporter" => commands::admin::is_reporter(state, params).await,
        "isUpgradableFrom" => commands::admin::is_upgradable_from(state, params).await,
        "getEscrow" => commands::admin::get_escrow(state).await,

        // Feeds
        "listFeeds" => commands::feeds::list_feeds(state).await,
        "requestFeedUpdate" => commands::feeds::request_feed_update(state, params).await,
        "latestPrice" => commands::feeds::latest_price(state, params).await,
        "feedTwap" => commands::feeds::feed_twap(state, params).await,

        // Chain
        "balanceOf" => commands::dev::balance_of(state, params).await,
        "blockNumber" => commands::dev::block_number(state).await,

        // Dev-only
        "dev_faucet" => commands::dev::faucet(state, params).await,
        "dev_newAccount" => commands::dev::new_account(state, params).await,
        "dev_witness" => commands::dev::witness(state, params).await,
        "dev_rebuildIndex" => commands::dev::rebuild_index(state).await,
        "dev_shutdown" => commands::dev::shutdown(state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
