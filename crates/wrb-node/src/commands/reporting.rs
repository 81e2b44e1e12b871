//! Reporter commands.

use std::sync::Arc;

use serde_json::Value;
use wrb_board::ReportEntry;

use super::{address, field, to_json};
use crate::rpc::RpcError;
use crate::NodeState;

type Result = std::result::Result<Value, RpcError>;

/// Deliver one result and collect its reward.
///
/// Params: `from`, `query_id`, `tally_hash`, `payload` and an optional
/// `timestamp`.
pub async fn report(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let entry: ReportEntry = serde_json::from_value(params.clone())
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;
    let query_id = entry.query_id;

    let receipt = state
        .execute(from, 0, |board, env, tx| board.report(env, tx, entry))
        .await?;

    Ok(serde_json::json!({
        "query_id": query_id,
        "reward": receipt.output.to_string(),
        "block": receipt.tx.block,
        "events": to_json(&receipt.events)?,
    }))
}

/// Deliver a batch of results. Unreportable entries are skipped, and
/// logged as events when `verbose` is set.
pub async fn report_batch(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let entries: Vec<ReportEntry> = field(params, "entries")?;
    let verbose = params
        .get("verbose")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let receipt = state
        .execute(from, 0, |board, env, tx| {
            board.report_batch(env, tx, entries, verbose)
        })
        .await?;

    Ok(serde_json::json!({
        "reward": receipt.output.to_string(),
        "block": receipt.tx.block,
        "events": to_json(&receipt.events)?,
    }))
}
