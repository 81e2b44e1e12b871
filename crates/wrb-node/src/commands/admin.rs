//! Owner commands and access-control reads.

use std::sync::Arc;

use serde_json::Value;

use super::{address, addresses};
use crate::rpc::RpcError;
use crate::NodeState;

type Result = std::result::Result<Value, RpcError>;

/// Authorize reporters. Owner only.
pub async fn set_reporters(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let reporters = addresses(params, "reporters")?;
    let receipt = state
        .execute(from, 0, |board, _env, tx| board.set_reporters(tx, &reporters))
        .await?;
    Ok(serde_json::json!({"block": receipt.tx.block}))
}

/// Revoke reporters. Owner only.
pub async fn unset_reporters(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let reporters = addresses(params, "reporters")?;
    let receipt = state
        .execute(from, 0, |board, _env, tx| {
            board.unset_reporters(tx, &reporters)
        })
        .await?;
    Ok(serde_json::json!({"block": receipt.tx.block}))
}

/// Propose a new owner. Takes effect once accepted.
pub async fn transfer_ownership(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let new_owner = address(params, "new_owner")?;
    let receipt = state
        .execute(from, 0, |board, _env, tx| {
            board.transfer_ownership(tx, new_owner)
        })
        .await?;
    Ok(serde_json::json!({"block": receipt.tx.block}))
}

/// Accept a proposed ownership transfer.
pub async fn accept_ownership(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let receipt = state
        .execute(from, 0, |board, _env, tx| board.accept_ownership(tx))
        .await?;
    Ok(serde_json::json!({"block": receipt.tx.block}))
}

/// Current and proposed owner.
pub async fn owner(state: &Arc<NodeState>) -> Result {
    let host = state.host.lock().await;
    Ok(serde_json::json!({
        "owner": host.board.owner().to_string(),
        "pending_owner": host.board.pending_owner().map(|a| a.to_string()),
    }))
}

/// Whether `address` may report results.
pub async fn is_reporter(state: &Arc<NodeState>, params: &Value) -> Result {
    let account = address(params, "address")?;
    let host = state.host.lock().await;
    Ok(serde_json::json!(host.board.is_reporter(&account)))
}

/// Whether `address` may upgrade the board.
pub async fn is_upgradable_from(state: &Arc<NodeState>, params: &Value) -> Result {
    let account = address(params, "address")?;
    let host = state.host.lock().await;
    Ok(serde_json::json!(host.board.is_upgradable_from(&account)))
}

/// Escrowed total, custody balance and the result of the escrow audit.
pub async fn get_escrow(state: &Arc<NodeState>) -> Result {
    let host = state.host.lock().await;
    let audit = host.board.audit_escrow();
    Ok(serde_json::json!({
        "held": host.board.escrow_held().to_string(),
        "custody": host.chain.custody().to_string(),
        "consistent": audit.is_ok(),
        "detail": audit.err().map(|e| e.to_string()),
    }))
}
