//! Development commands and chain reads.
//!
//! `dev_` methods are only dispatched when `advanced.dev_mode` is set.

use std::sync::Arc;

use serde_json::Value;
use wrb_board::ReportEntry;
use wrb_codec::{cbor, result::encode_error, ResultErrorCode, Value as CborValue};
use wrb_types::Address;

use super::{address, amount, query_id, to_json};
use crate::rpc::RpcError;
use crate::NodeState;

type Result = std::result::Result<Value, RpcError>;

/// Native balance of `address`.
pub async fn balance_of(state: &Arc<NodeState>, params: &Value) -> Result {
    let account = address(params, "address")?;
    let host = state.host.lock().await;
    Ok(serde_json::json!(host.chain.balance_of(&account).to_string()))
}

/// Height and time of the local chain.
pub async fn block_number(state: &Arc<NodeState>) -> Result {
    let host = state.host.lock().await;
    Ok(serde_json::json!({
        "height": host.chain.height(),
        "timestamp": host.chain.timestamp(),
    }))
}

/// Credit an account out of thin air.
pub async fn faucet(state: &Arc<NodeState>, params: &Value) -> Result {
    let account = address(params, "address")?;
    let amount = amount(params, "amount")?;
    let mut host = state.host.lock().await;
    let balance = host.chain.faucet(account, amount)?;
    tracing::info!(%account, amount = %amount, "Faucet drip");
    Ok(serde_json::json!({
        "address": account.to_string(),
        "balance": balance.to_string(),
    }))
}

/// Generate a fresh account, optionally funded.
pub async fn new_account(state: &Arc<NodeState>, params: &Value) -> Result {
    let account = Address::from(rand::random::<[u8; 20]>());
    let funding = if params.get("amount").is_some() {
        amount(params, "amount")?
    } else {
        0
    };
    let mut host = state.host.lock().await;
    let balance = host.chain.faucet(account, funding)?;
    Ok(serde_json::json!({
        "address": account.to_string(),
        "balance": balance.to_string(),
    }))
}

/// Play the witnessing network: encode a result, derive its tally hash
/// and report it.
///
/// Params: `query_id`, one of `value` (unsigned integer), `error` (error
/// code) or `payload` (hex CBOR), and an optional reporting account `from`
/// that defaults to the first configured reporter.
pub async fn witness(state: &Arc<NodeState>, params: &Value) -> Result {
    let query_id = query_id(params)?;
    let from = match params.get("from") {
        Some(_) => address(params, "from")?,
        None => state
            .config
            .chain
            .reporters
            .first()
            .copied()
            .ok_or_else(|| RpcError::invalid_params("from required: no reporters configured"))?,
    };
    let payload = witnessed_payload(params, query_id)?;
    let tally_hash = wrb_crypto::blake3::tally_digest(query_id, &payload);
    let entry = ReportEntry {
        query_id,
        timestamp: 0,
        tally_hash,
        payload,
    };

    let receipt = state
        .execute(from, 0, |board, env, tx| board.report(env, tx, entry))
        .await?;
    Ok(serde_json::json!({
        "query_id": query_id,
        "tally_hash": hex::encode(tally_hash),
        "reward": receipt.output.to_string(),
        "events": to_json(&receipt.events)?,
    }))
}

fn witnessed_payload(params: &Value, query_id: u64) -> std::result::Result<Vec<u8>, RpcError> {
    let codec = |e: wrb_codec::CodecError| RpcError::invalid_params(&e.to_string());
    if let Some(value) = params.get("value") {
        let value = value
            .as_u64()
            .ok_or_else(|| RpcError::invalid_params("value must be an unsigned integer"))?;
        return cbor::to_vec(&value).map_err(codec);
    }
    if let Some(code) = params.get("error") {
        let code = code
            .as_u64()
            .ok_or_else(|| RpcError::invalid_params("error must be a numeric code"))?;
        let context = [CborValue::Integer(query_id.into())];
        return encode_error(ResultErrorCode::from_u64(code), &context).map_err(codec);
    }
    let raw = params
        .get("payload")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("one of value, error or payload required"))?;
    hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| RpcError::invalid_params(&format!("payload: {e}")))
}

/// Drop the query index and replay it from the journaled events.
pub async fn rebuild_index(state: &Arc<NodeState>) -> Result {
    let mut journal = state
        .journal
        .as_ref()
        .ok_or_else(|| RpcError::internal_error("journal disabled"))?
        .lock()
        .await;
    let replayed = journal.rebuild_index()?;
    Ok(serde_json::json!({"replayed": replayed}))
}

/// Stop the node.
pub async fn shutdown(state: &Arc<NodeState>) -> Result {
    tracing::info!("Shutdown requested over RPC");
    let _ = state.shutdown_tx.send(());
    Ok(serde_json::json!({"shutting_down": true}))
}
