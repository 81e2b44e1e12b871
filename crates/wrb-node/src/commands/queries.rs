//! Requester commands and board reads.

use std::sync::Arc;

use serde_json::Value;
use wrb_types::{QueryDefinition, Sla};

use super::{address, field, query_id, query_ids, to_json, u64_param, value};
use crate::rpc::RpcError;
use crate::NodeState;

type Result = std::result::Result<Value, RpcError>;

/// Default page size for event reads.
const EVENT_PAGE: u32 = 100;

/// Post a query paid with `value`.
pub async fn post(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let value = value(params)?;
    let definition: QueryDefinition = field(params, "definition")?;
    let sla: Sla = field(params, "sla")?;
    let callback_gas_limit = params
        .get("callback_gas_limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let receipt = state
        .execute(from, value, |board, env, tx| {
            board.post(env, tx, definition, sla, callback_gas_limit)
        })
        .await?;

    Ok(serde_json::json!({
        "query_id": receipt.output,
        "block": receipt.tx.block,
        "events": to_json(&receipt.events)?,
    }))
}

/// Add `value` to the reward of a posted query.
pub async fn upgrade_reward(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let value = value(params)?;
    let id = query_id(params)?;
    let receipt = state
        .execute(from, value, |board, _env, tx| board.upgrade_reward(tx, id))
        .await?;
    Ok(serde_json::json!({
        "query_id": id,
        "reward": receipt.output.to_string(),
        "block": receipt.tx.block,
    }))
}

/// Purge a terminal or expired query and return its response.
pub async fn fetch_query_response(state: &Arc<NodeState>, params: &Value) -> Result {
    let from = address(params, "from")?;
    let id = query_id(params)?;
    let receipt = state
        .execute(from, 0, |board, env, tx| {
            board.fetch_query_response(env, tx, id)
        })
        .await?;
    Ok(serde_json::json!({
        "query_id": id,
        "response": to_json(&receipt.output)?,
        "block": receipt.tx.block,
    }))
}

/// Status of one query.
pub async fn get_query_status(state: &Arc<NodeState>, params: &Value) -> Result {
    let id = query_id(params)?;
    let host = state.host.lock().await;
    to_json(&host.board.query_status(id))
}

/// Statuses of `query_ids`, in order.
pub async fn get_query_statuses(state: &Arc<NodeState>, params: &Value) -> Result {
    let ids = query_ids(params)?;
    let host = state.host.lock().await;
    to_json(&host.board.query_statuses(&ids))
}

/// Stored query with its derived status.
pub async fn get_query(state: &Arc<NodeState>, params: &Value) -> Result {
    let id = query_id(params)?;
    let host = state.host.lock().await;
    let query = host.board.query(id)?;
    Ok(serde_json::json!({
        "query_id": id,
        "status": host.board.query_status(id),
        "query": to_json(query)?,
    }))
}

/// Request of one stored query.
pub async fn get_query_request(state: &Arc<NodeState>, params: &Value) -> Result {
    let id = query_id(params)?;
    let host = state.host.lock().await;
    to_json(host.board.query_request(id)?)
}

/// Stored response, `null` while posted.
pub async fn get_query_response(state: &Arc<NodeState>, params: &Value) -> Result {
    let id = query_id(params)?;
    let host = state.host.lock().await;
    to_json(&host.board.query_response(id)?)
}

/// Decoded error report of a resolved query.
pub async fn get_query_result_error(state: &Arc<NodeState>, params: &Value) -> Result {
    let id = query_id(params)?;
    let host = state.host.lock().await;
    let error = host.board.query_result_error(id)?;
    Ok(serde_json::json!({
        "code": error.code,
        "raw_code": error.raw_code,
        "reason": error.reason(),
    }))
}

/// Identifier the next posted query will receive.
pub async fn get_next_query_id(state: &Arc<NodeState>) -> Result {
    let host = state.host.lock().await;
    Ok(serde_json::json!(host.board.next_query_id()))
}

/// Gas price parameter, defaulting to the chain's.
fn gas_price(params: &Value, default: u128) -> std::result::Result<u128, RpcError> {
    if params.get("gas_price").is_none() {
        return Ok(default);
    }
    super::amount(params, "gas_price")
}

fn result_size(params: &Value) -> std::result::Result<u16, RpcError> {
    u16::try_from(u64_param(params, "result_size")?)
        .map_err(|_| RpcError::invalid_params("result_size out of range"))
}

/// Minimum reward for `result_size` without callback.
pub async fn estimate_base_fee(state: &Arc<NodeState>, params: &Value) -> Result {
    let host = state.host.lock().await;
    let gas_price = gas_price(params, host.chain.gas_price())?;
    let fee = host.board.estimate_base_fee(gas_price, result_size(params)?);
    Ok(serde_json::json!(fee.to_string()))
}

/// Minimum reward for `result_size` with a callback of `callback_gas_limit`.
pub async fn estimate_base_fee_with_callback(state: &Arc<NodeState>, params: &Value) -> Result {
    let host = state.host.lock().await;
    let gas_price = gas_price(params, host.chain.gas_price())?;
    let callback_gas_limit = u64_param(params, "callback_gas_limit")?;
    let fee = host.board.estimate_base_fee_with_callback(
        gas_price,
        result_size(params)?,
        callback_gas_limit,
    );
    Ok(serde_json::json!(fee.to_string()))
}

/// Revenue and expense of reporting the given queries.
pub async fn estimate_report_earnings(state: &Arc<NodeState>, params: &Value) -> Result {
    let ids = query_ids(params)?;
    let nanowit_price = super::amount(params, "nanowit_price")?;
    let host = state.host.lock().await;
    let gas_price = gas_price(params, host.chain.gas_price())?;
    let (revenue, expense) = host
        .board
        .estimate_report_earnings(&ids, gas_price, nanowit_price);
    Ok(serde_json::json!({
        "revenue": revenue.to_string(),
        "expense": expense.to_string(),
    }))
}

/// Events after `after_seq`, read from the journal when one is enabled.
pub async fn get_events(state: &Arc<NodeState>, params: &Value) -> Result {
    let after = params.get("after_seq").and_then(|v| v.as_u64()).unwrap_or(0);
    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map_or(EVENT_PAGE, |l| l.min(u64::from(u32::MAX)) as u32);

    if let Some(journal) = &state.journal {
        let journal = journal.lock().await;
        return to_json(&journal.since(after, limit)?);
    }
    let host = state.host.lock().await;
    let records: Vec<_> = host
        .board
        .events_since(after)
        .iter()
        .take(limit as usize)
        .collect();
    to_json(&records)
}

/// All journaled events of one query.
pub async fn get_query_history(state: &Arc<NodeState>, params: &Value) -> Result {
    let id = query_id(params)?;
    let journal = state
        .journal
        .as_ref()
        .ok_or_else(|| RpcError::internal_error("journal disabled"))?
        .lock()
        .await;
    to_json(&journal.history(id)?)
}

/// Indexed summary of one query, kept after the query is purged.
pub async fn get_indexed_query(state: &Arc<NodeState>, params: &Value) -> Result {
    let journal = state
        .journal
        .as_ref()
        .ok_or_else(|| RpcError::internal_error("journal disabled"))?
        .lock()
        .await;
    if params.get("requester").is_some() {
        let requester = address(params, "requester")?;
        return to_json(&journal.by_requester(&requester)?);
    }
    let id = query_id(params)?;
    to_json(&journal.query(id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{node, REPORTER, REQUESTER};

    fn post_params(value: u64) -> Value {
        serde_json::json!({
            "from": REQUESTER.to_string(),
            "value": value.to_string(),
            "definition": {"bytecode": "0a0b"},
            "sla": {"committee_size": 10, "witness_reward": 1_000_000, "max_result_size": 32},
        })
    }

    #[tokio::test]
    async fn test_post_and_read() {
        let state = node();
        let result = post(&state, &post_params(200_000)).await.expect("post");
        assert_eq!(result["query_id"], 1);

        let status = get_query_status(&state, &serde_json::json!({"query_id": 1}))
            .await
            .expect("status");
        assert_eq!(status, "posted");

        let request = get_query_request(&state, &serde_json::json!({"query_id": 1}))
            .await
            .expect("request");
        assert_eq!(request["reward"], 200_000);

        let next = get_next_query_id(&state).await.expect("next");
        assert_eq!(next, 2);
    }

    #[tokio::test]
    async fn test_post_underpaid() {
        let state = node();
        let err = post(&state, &post_params(1)).await.expect_err("underpaid");
        assert_eq!(err.code, -32004);
        let statuses = get_query_statuses(&state, &serde_json::json!({"query_ids": [1]}))
            .await
            .expect("statuses");
        assert_eq!(statuses, serde_json::json!(["unknown"]));
    }

    #[tokio::test]
    async fn test_upgrade_reward() {
        let state = node();
        post(&state, &post_params(200_000)).await.expect("post");
        let result = upgrade_reward(
            &state,
            &serde_json::json!({"from": REPORTER.to_string(), "value": 0, "query_id": 1}),
        )
        .await
        .expect("zero value upgrade");
        assert_eq!(result["reward"], "200000");
    }

    #[tokio::test]
    async fn test_fetch_requires_resolution() {
        let state = node();
        post(&state, &post_params(200_000)).await.expect("post");
        let err = fetch_query_response(
            &state,
            &serde_json::json!({"from": REQUESTER.to_string(), "query_id": 1}),
        )
        .await
        .expect_err("still posted");
        assert_eq!(err.code, -32009);
    }

    #[tokio::test]
    async fn test_estimates() {
        let state = node();
        let fee = estimate_base_fee(&state, &serde_json::json!({"result_size": 32}))
            .await
            .expect("fee");
        let with_callback = estimate_base_fee_with_callback(
            &state,
            &serde_json::json!({"result_size": 32, "callback_gas_limit": 100_000}),
        )
        .await
        .expect("fee");
        let parse = |v: &Value| v.as_str().and_then(|s| s.parse::<u128>().ok()).expect("amount");
        assert!(parse(&with_callback) > parse(&fee));
        assert!(estimate_base_fee(&state, &serde_json::json!({"result_size": 70_000}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_events_and_history() {
        let state = node();
        post(&state, &post_params(200_000)).await.expect("post");
        let events = get_events(&state, &serde_json::json!({"after_seq": 2}))
            .await
            .expect("events");
        assert_eq!(events.as_array().map(Vec::len), Some(1));

        let history = get_query_history(&state, &serde_json::json!({"query_id": 1}))
            .await
            .expect("history");
        assert_eq!(history[0]["event"]["QueryPosted"]["query_id"], 1);

        let indexed = get_indexed_query(&state, &serde_json::json!({"query_id": 1}))
            .await
            .expect("indexed");
        assert_eq!(indexed["status"], "posted");
    }
}
