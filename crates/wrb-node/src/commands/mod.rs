//! RPC command handlers.
//!
//! Each submodule implements the commands for one group of callers.
//! Mutating commands take the calling account as `from` and the attached
//! value as `value`; the node does not check signatures.

pub mod admin;
pub mod dev;
pub mod feeds;
pub mod queries;
pub mod reporting;

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use wrb_types::{Address, Amount, QueryId};

use crate::rpc::RpcError;

/// Required address parameter. Accepts an optional `0x` prefix.
pub(crate) fn address(params: &Value, key: &str) -> Result<Address, RpcError> {
    let raw = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))?;
    Address::from_str(raw).map_err(|e| RpcError::invalid_params(&format!("{key}: {e}")))
}

/// List of addresses.
pub(crate) fn addresses(params: &Value, key: &str) -> Result<Vec<Address>, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))?
        .iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| RpcError::invalid_params(&format!("{key}: expected strings")))
                .and_then(|s| {
                    Address::from_str(s)
                        .map_err(|e| RpcError::invalid_params(&format!("{key}: {e}")))
                })
        })
        .collect()
}

/// Amount given as a decimal string or a JSON number.
pub(crate) fn amount(params: &Value, key: &str) -> Result<Amount, RpcError> {
    match params.get(key) {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|e| RpcError::invalid_params(&format!("{key}: {e}"))),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Amount::from)
            .ok_or_else(|| RpcError::invalid_params(&format!("{key}: expected unsigned integer"))),
        _ => Err(RpcError::invalid_params(&format!("{key} required"))),
    }
}

/// Optional amount, zero when absent.
pub(crate) fn value(params: &Value) -> Result<Amount, RpcError> {
    if params.get("value").is_none() {
        return Ok(0);
    }
    amount(params, "value")
}

pub(crate) fn u64_param(params: &Value, key: &str) -> Result<u64, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

pub(crate) fn query_id(params: &Value) -> Result<QueryId, RpcError> {
    u64_param(params, "query_id")
}

pub(crate) fn query_ids(params: &Value) -> Result<Vec<QueryId>, RpcError> {
    field(params, "query_ids")
}

/// Deserialize a structured parameter.
pub(crate) fn field<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, RpcError> {
    let raw = params
        .get(key)
        .cloned()
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))?;
    serde_json::from_value(raw).map_err(|e| RpcError::invalid_params(&format!("{key}: {e}")))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_forms() {
        let params = serde_json::json!({
            "a": "340282366920938463463374607431768211455",
            "b": 42,
            "c": -1,
        });
        assert_eq!(amount(&params, "a").expect("string"), u128::MAX);
        assert_eq!(amount(&params, "b").expect("number"), 42);
        assert!(amount(&params, "c").is_err());
        assert!(amount(&params, "d").is_err());
        assert_eq!(value(&params).expect("absent"), 0);
    }

    #[test]
    fn test_address_prefix() {
        let params = serde_json::json!({
            "a": format!("0x{}", "aa".repeat(20)),
            "b": "aa".repeat(20),
            "c": "zz",
        });
        assert_eq!(address(&params, "a").expect("prefixed"), Address::repeat(0xAA));
        assert_eq!(address(&params, "b").expect("bare"), Address::repeat(0xAA));
        assert!(address(&params, "c").is_err());
    }
}
