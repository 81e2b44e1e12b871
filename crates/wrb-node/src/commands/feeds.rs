//! Price feed commands.

use std::sync::Arc;

use serde_json::Value;

use super::to_json;
use crate::rpc::RpcError;
use crate::NodeState;

type Result = std::result::Result<Value, RpcError>;

fn caption(params: &Value) -> std::result::Result<&str, RpcError> {
    params
        .get("caption")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("caption required"))
}

/// Hosted feeds and their breaker state.
pub async fn list_feeds(state: &Arc<NodeState>) -> Result {
    let host = state.host.lock().await;
    let now = host.chain.timestamp();
    let feeds: Vec<Value> = host
        .feeds
        .feeds()
        .map(|feed| {
            let breaker = feed.breaker();
            serde_json::json!({
                "caption": feed.caption(),
                "address": feed.address().to_string(),
                "decimals": feed.config().decimals,
                "pending": feed.pending(),
                "observations": feed.observations().count(),
                "balance": host.chain.balance_of(&feed.address()).to_string(),
                "last_update": breaker.last_update(),
                "consecutive_errors": breaker.consecutive_errors(),
                "operational": breaker.check_operational(now).is_ok(),
                "last_error": feed.last_error().map(|e| e.reason()),
            })
        })
        .collect();
    Ok(serde_json::json!(feeds))
}

/// Post an update query for a feed, paid from the feed account.
pub async fn request_feed_update(state: &Arc<NodeState>, params: &Value) -> Result {
    let caption = caption(params)?;
    let mut host = state.host.lock().await;
    let receipt = host.request_feed_update(caption)?;
    state.publish(&host, &receipt.events, receipt.tx.block).await;
    Ok(serde_json::json!({
        "caption": caption,
        "query_id": receipt.output,
        "block": receipt.tx.block,
    }))
}

/// Latest price of a feed, if the feed is operational.
pub async fn latest_price(state: &Arc<NodeState>, params: &Value) -> Result {
    let caption = caption(params)?;
    let host = state.host.lock().await;
    let reading = host.feeds.get(caption)?.latest(host.chain.timestamp())?;
    to_json(&reading)
}

/// Time-weighted average over the feed window.
pub async fn feed_twap(state: &Arc<NodeState>, params: &Value) -> Result {
    let caption = caption(params)?;
    let host = state.host.lock().await;
    let feed = host.feeds.get(caption)?;
    let now = host.chain.timestamp();
    Ok(serde_json::json!({
        "caption": caption,
        "twap": feed.twap(now)?,
        "window_secs": feed.config().twap_window_secs,
        "decimals": feed.config().decimals,
    }))
}
