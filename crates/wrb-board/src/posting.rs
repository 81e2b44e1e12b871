//! Posting Protocol.
//!
//! Admits new queries: validates the SLA, the query definition and the
//! callback request, checks the paid value covers the minimum fee, then
//! escrows the full value as reward under a fresh identifier.

use tracing::{debug, info};
use wrb_types::{Amount, BoardEvent, QueryDefinition, QueryId, QueryStatus, Request, Sla};

use crate::config::BoardConfig;
use crate::escrow::PricingPolicy;
use crate::host::{Env, TxContext};
use crate::state::BoardState;
use crate::{BoardError, Result};

/// Check `sla` against the policy bounds.
///
/// # Errors
///
/// - [`BoardError::InvalidSla`] if a parameter is out of bounds
pub fn validate_sla(config: &BoardConfig, sla: &Sla) -> Result<()> {
    if sla.committee_size < config.min_committee_size
        || sla.committee_size > config.max_committee_size
    {
        return Err(BoardError::InvalidSla(format!(
            "committee size {} outside {}..={}",
            sla.committee_size, config.min_committee_size, config.max_committee_size
        )));
    }
    if sla.witness_reward < config.min_witness_reward {
        return Err(BoardError::InvalidSla(format!(
            "witness reward {} below minimum {}",
            sla.witness_reward, config.min_witness_reward
        )));
    }
    if sla.max_result_size == 0 || sla.max_result_size > config.max_result_size {
        return Err(BoardError::InvalidSla(format!(
            "max result size {} outside 1..={}",
            sla.max_result_size, config.max_result_size
        )));
    }
    Ok(())
}

/// Result size bound used for pricing the query.
///
/// Verified definitions carry the bound recorded by the registry; raw
/// bytecode relies on the SLA.
fn resolve_result_size(
    config: &BoardConfig,
    env: &Env<'_>,
    definition: &QueryDefinition,
    sla: &Sla,
) -> Result<u16> {
    match definition {
        QueryDefinition::Verified(rad_hash) => {
            let entry = env.registry.lookup(rad_hash).ok_or_else(|| {
                BoardError::InvalidQueryDefinition(format!(
                    "unknown rad hash {}",
                    hex::encode(rad_hash)
                ))
            })?;
            if !entry.valid {
                return Err(BoardError::InvalidQueryDefinition(format!(
                    "rad hash {} is no longer valid",
                    hex::encode(rad_hash)
                )));
            }
            if entry.result_max_size > config.max_result_size {
                return Err(BoardError::InvalidQueryDefinition(format!(
                    "registered result size {} exceeds maximum {}",
                    entry.result_max_size, config.max_result_size
                )));
            }
            Ok(entry.result_max_size.max(1))
        }
        QueryDefinition::Bytecode(bytecode) => {
            if bytecode.is_empty() {
                return Err(BoardError::InvalidQueryDefinition(
                    "empty bytecode".to_string(),
                ));
            }
            if bytecode.len() > config.max_bytecode_size {
                return Err(BoardError::InvalidQueryDefinition(format!(
                    "bytecode of {} bytes exceeds maximum {}",
                    bytecode.len(),
                    config.max_bytecode_size
                )));
            }
            Ok(sla.max_result_size)
        }
    }
}

/// Post a new query, escrowing `tx.value` as its reward.
///
/// # Errors
///
/// - [`BoardError::ZeroAddress`] if the caller is the zero address
/// - [`BoardError::InvalidSla`] if the SLA is out of bounds
/// - [`BoardError::InvalidQueryDefinition`] if the definition is unknown,
///   invalidated or oversized
/// - [`BoardError::CallbackGasLimitTooHigh`] if the callback limit is too high
/// - [`BoardError::InvalidCallbackRecipient`] if a callback is requested by a
///   caller that does not expose the callback capability
/// - [`BoardError::InsufficientReward`] if `tx.value` is below the minimum fee
#[allow(clippy::too_many_arguments)]
pub fn post<P: PricingPolicy + ?Sized>(
    state: &mut BoardState,
    config: &BoardConfig,
    pricing: &P,
    env: &mut Env<'_>,
    tx: &TxContext,
    definition: QueryDefinition,
    sla: Sla,
    callback_gas_limit: u64,
) -> Result<QueryId> {
    if tx.caller.is_zero() {
        return Err(BoardError::ZeroAddress);
    }
    validate_sla(config, &sla)?;
    let result_size = resolve_result_size(config, env, &definition, &sla)?;

    let base_fee = if callback_gas_limit > 0 {
        if callback_gas_limit > config.max_callback_gas_limit {
            return Err(BoardError::CallbackGasLimitTooHigh {
                limit: callback_gas_limit,
                max: config.max_callback_gas_limit,
            });
        }
        if !env.consumers.probe(&tx.caller) {
            return Err(BoardError::InvalidCallbackRecipient(tx.caller));
        }
        pricing.base_fee_with_callback(tx.gas_price, result_size, callback_gas_limit)
    } else {
        pricing.base_fee(tx.gas_price, result_size)
    };

    // The reward must stay strictly positive while the query is posted.
    let required: Amount = base_fee.max(1);
    if tx.value < required {
        return Err(BoardError::InsufficientReward {
            paid: tx.value,
            required,
        });
    }

    let query_id = state.store.allocate_id()?;
    state.escrow.reserve(tx.value)?;
    state.store.put(
        query_id,
        Request {
            requester: tx.caller,
            reward: tx.value,
            definition,
            sla,
            callback_gas_limit,
        },
        tx.block,
    )?;
    state.events.emit(
        tx.block,
        tx.timestamp,
        BoardEvent::QueryPosted {
            query_id,
            requester: tx.caller,
            reward: tx.value,
            base_fee: required,
        },
    );

    info!(
        query_id,
        requester = %tx.caller,
        reward = %tx.value,
        base_fee = %required,
        callback_gas_limit,
        "Query posted"
    );
    Ok(query_id)
}

/// Add `tx.value` to the reward of a posted query. Anyone may top up.
///
/// # Errors
///
/// - [`BoardError::NotPosted`] if the query is not awaiting a report
pub fn upgrade_reward(state: &mut BoardState, tx: &TxContext, query_id: QueryId) -> Result<Amount> {
    let status = state.store.status(query_id);
    if status != QueryStatus::Posted {
        return Err(BoardError::NotPosted { query_id, status });
    }
    let reward = state.escrow.top_up(&mut state.store, query_id, tx.value)?;
    state.events.emit(
        tx.block,
        tx.timestamp,
        BoardEvent::QueryRewardUpgraded {
            query_id,
            from: tx.caller,
            value: tx.value,
            reward,
        },
    );
    debug!(query_id, value = %tx.value, reward = %reward, "Query reward upgraded");
    Ok(reward)
}
