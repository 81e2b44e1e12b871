//! Integration tests for the witness request board.
//!
//! The flows under `tests/` drive a complete node (board, feeds, local
//! chain and journal) through its JSON-RPC dispatcher, the same way a
//! client on the Unix socket would.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p wrb-integration-tests
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use wrb_db::Journal;
use wrb_feeds::FeedConfig;
use wrb_node::config::{GenesisBalance, NodeConfig};
use wrb_node::rpc::{dispatch_request, RpcError, RpcRequest};
use wrb_node::NodeState;
use wrb_types::Address;

pub const OWNER: Address = Address::repeat(0x01);
pub const REPORTER: Address = Address::repeat(0x02);
pub const REQUESTER: Address = Address::repeat(0xAA);
pub const OTHER_REQUESTER: Address = Address::repeat(0xBB);
pub const ETH_USD: &str = "Price-ETH/USD-6";
pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const REQUESTER_FUNDS: u128 = 1_000_000_000;

/// Node configuration with two funded requesters and one feed.
pub fn config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.chain.balances = vec![
        GenesisBalance {
            address: REQUESTER,
            amount: REQUESTER_FUNDS,
        },
        GenesisBalance {
            address: OTHER_REQUESTER,
            amount: REQUESTER_FUNDS,
        },
    ];
    config.feeds = vec![FeedConfig::new(ETH_USD, vec![0x0A, 0x0B, 0x0C])];
    config
}

/// A node journaling to an in-memory database.
pub fn node_with(config: NodeConfig) -> Arc<NodeState> {
    let journal = Journal::open_memory().expect("journal");
    NodeState::new(config, Some(journal), GENESIS_TIME).expect("node")
}

/// Node built from [`config`] with an in-memory journal.
pub fn node() -> Arc<NodeState> {
    node_with(config())
}

/// Unique scratch path under the system temp directory.
pub fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("wrb-{}-{name}", rand::random::<u64>()))
}

/// Call a JSON-RPC method on the node.
pub async fn call(state: &Arc<NodeState>, method: &str, params: Value) -> Result<Value, RpcError> {
    let response = dispatch_request(
        state,
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: serde_json::json!(1),
            method: method.to_string(),
            params,
        },
    )
    .await;
    match (response.result, response.error) {
        (_, Some(error)) => Err(error),
        (Some(result), None) => Ok(result),
        (None, None) => Err(RpcError::internal_error("empty response")),
    }
}

/// Parse an amount rendered as a decimal string.
pub fn amount(value: &Value) -> u128 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("amount string")
}

/// Post a bytecode query from `from`, paying `value`.
pub async fn post(state: &Arc<NodeState>, from: Address, value: u128, callback_gas_limit: u64) -> Result<u64, RpcError> {
    let result = call(
        state,
        "post",
        serde_json::json!({
            "from": from.to_string(),
            "value": value.to_string(),
            "definition": {"bytecode": "0a0b0c0d"},
            "sla": {"committee_size": 10, "witness_reward": 1_000_000, "max_result_size": 32},
            "callback_gas_limit": callback_gas_limit,
        }),
    )
    .await?;
    Ok(result["query_id"].as_u64().expect("query id"))
}

/// Escrowed total must match the board's custody balance.
pub async fn assert_escrow_consistent(state: &Arc<NodeState>) {
    let escrow = call(state, "getEscrow", Value::Null).await.expect("escrow");
    assert_eq!(escrow["consistent"], true, "{escrow}");
    assert_eq!(escrow["held"], escrow["custody"], "{escrow}");
}
