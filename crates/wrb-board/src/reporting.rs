//! Reporting Protocol.
//!
//! Moves a query out of `Posted` exactly once:
//!
//! ```text
//! Posted --report--> Reported        (no callback, payload stored)
//!                  | Delivered       (callback succeeded, payload dropped)
//!                  | Undeliverable   (callback failed, payload dropped)
//! ```
//!
//! The reward is zeroed before the response is written and before any
//! callback runs. The reporter is paid by a single transfer at the very end,
//! for a batch as well as for a single report.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::{info, warn};
use wrb_codec::{classify, decode_error, ResultError, ResultKind};
use wrb_types::{
    Amount, BoardEvent, Bytes, CallbackReceipt, QueryId, QueryStatus, Request, Response,
    TallyHash, ZERO_HASH,
};

use crate::callback::{
    isolated_call, BoardView, CallOutcome, ConsumerDirectory, Delivery,
    MISSING_CAPABILITY_REASON,
};
use crate::host::{Env, TxContext};
use crate::state::BoardState;
use crate::store::QueryStore;
use crate::{BoardError, Result};

/// One result to deliver.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub query_id: QueryId,
    /// Resolution time attested by the witnessing network. Zero means the
    /// time of the reporting transaction.
    #[serde(default)]
    pub timestamp: u64,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub tally_hash: TallyHash,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub payload: Bytes,
}

/// Why an entry cannot be reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    NotPosted(QueryStatus),
    ZeroTallyHash,
    EmptyPayload,
    FutureTimestamp { timestamp: u64, now: u64 },
}

impl Rejection {
    /// Error returned when a single report is rejected.
    pub fn into_error(self, query_id: QueryId) -> BoardError {
        match self {
            Rejection::NotPosted(status) => BoardError::NotPosted { query_id, status },
            Rejection::ZeroTallyHash => BoardError::InvalidResult("zero tally hash".to_string()),
            Rejection::EmptyPayload => BoardError::InvalidResult("empty payload".to_string()),
            Rejection::FutureTimestamp { timestamp, now } => {
                BoardError::FutureTimestamp { timestamp, now }
            }
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotPosted(status) => write!(f, "query is {status}"),
            Rejection::ZeroTallyHash => f.write_str("zero tally hash"),
            Rejection::EmptyPayload => f.write_str("empty payload"),
            Rejection::FutureTimestamp { timestamp, now } => {
                write!(f, "timestamp {timestamp} is after {now}")
            }
        }
    }
}

/// Validate `entry` against the store, returning the resolution time to record.
pub fn check_entry(
    store: &QueryStore,
    entry: &ReportEntry,
    now: u64,
) -> std::result::Result<u64, Rejection> {
    let status = store.status(entry.query_id);
    if status != QueryStatus::Posted {
        return Err(Rejection::NotPosted(status));
    }
    if entry.tally_hash == ZERO_HASH {
        return Err(Rejection::ZeroTallyHash);
    }
    if entry.payload.is_empty() {
        return Err(Rejection::EmptyPayload);
    }
    match entry.timestamp {
        0 => Ok(now),
        timestamp if timestamp > now => Err(Rejection::FutureTimestamp { timestamp, now }),
        timestamp => Ok(timestamp),
    }
}

/// Report one result and pay the caller.
///
/// # Errors
///
/// - [`BoardError::Unauthorized`] if the caller is not a reporter
/// - [`BoardError::NotPosted`] if the query is not awaiting a report
/// - [`BoardError::InvalidResult`] on a zero tally hash or empty payload
/// - [`BoardError::FutureTimestamp`] if the timestamp is in the future
/// - [`BoardError::Payment`] if the reward cannot be paid
pub fn report(
    state: &mut BoardState,
    env: &mut Env<'_>,
    tx: &TxContext,
    entry: ReportEntry,
) -> Result<Amount> {
    state.acl.require_reporter(&tx.caller)?;
    let timestamp = check_entry(&state.store, &entry, tx.timestamp)
        .map_err(|rejection| rejection.into_error(entry.query_id))?;
    let reward = settle(state, env, tx, entry, timestamp)?;
    pay(env, tx, reward)?;
    Ok(reward)
}

/// Report several results, skipping unusable entries, and pay the caller
/// the sum of the settled rewards in one transfer.
///
/// # Errors
///
/// - [`BoardError::Unauthorized`] if the caller is not a reporter
/// - [`BoardError::Payment`] if the rewards cannot be paid
pub fn report_batch(
    state: &mut BoardState,
    env: &mut Env<'_>,
    tx: &TxContext,
    entries: Vec<ReportEntry>,
    verbose: bool,
) -> Result<Amount> {
    state.acl.require_reporter(&tx.caller)?;
    let mut total: Amount = 0;
    let mut skipped = 0usize;
    for entry in entries {
        match check_entry(&state.store, &entry, tx.timestamp) {
            Ok(timestamp) => {
                let reward = settle(state, env, tx, entry, timestamp)?;
                total = total.checked_add(reward).ok_or(BoardError::Overflow)?;
            }
            Err(rejection) => {
                skipped += 1;
                warn!(query_id = entry.query_id, reason = %rejection, "Skipping batch entry");
                if verbose {
                    state.events.emit(
                        tx.block,
                        tx.timestamp,
                        BoardEvent::BatchReportError {
                            query_id: entry.query_id,
                            reason: rejection.to_string(),
                        },
                    );
                }
            }
        }
    }
    pay(env, tx, total)?;
    info!(reporter = %tx.caller, total = %total, skipped, "Batch reported");
    Ok(total)
}

fn pay(env: &mut Env<'_>, tx: &TxContext, amount: Amount) -> Result<()> {
    if amount > 0 {
        env.payments.transfer(tx.caller, amount)?;
    }
    Ok(())
}

/// Write the response of a checked entry and dispatch its callback.
/// Returns the released reward; paying it is left to the caller.
fn settle(
    state: &mut BoardState,
    env: &mut Env<'_>,
    tx: &TxContext,
    entry: ReportEntry,
    timestamp: u64,
) -> Result<Amount> {
    let query_id = entry.query_id;
    let reward = state.escrow.release(&mut state.store, query_id)?;
    let request = state.store.query(query_id)?.request.clone();

    if !request.wants_callback() {
        state.store.attach_response(
            query_id,
            Response {
                reporter: tx.caller,
                timestamp,
                tally_hash: entry.tally_hash,
                payload: entry.payload,
                finality_block: tx.block,
                callback: None,
            },
        )?;
        state.events.emit(
            tx.block,
            tx.timestamp,
            BoardEvent::QueryReported {
                query_id,
                reporter: tx.caller,
                timestamp,
            },
        );
        info!(query_id, reporter = %tx.caller, reward = %reward, "Query reported");
        return Ok(reward);
    }

    // Written as undeliverable first so the consumer already sees a settled
    // query while its callback runs.
    state.store.attach_response(
        query_id,
        Response {
            reporter: tx.caller,
            timestamp,
            tally_hash: entry.tally_hash,
            payload: Vec::new(),
            finality_block: tx.block,
            callback: Some(CallbackReceipt {
                succeeded: false,
                gas_used: 0,
            }),
        },
    )?;

    let delivery = Delivery {
        query_id,
        timestamp,
        tally_hash: &entry.tally_hash,
        finality_block: tx.block,
        payload: &entry.payload,
    };
    let outcome = dispatch(&state.store, &mut *env.consumers, &request, &delivery);

    state.store.record_callback(
        query_id,
        CallbackReceipt {
            succeeded: outcome.succeeded,
            gas_used: outcome.gas_used,
        },
    )?;

    let event = if outcome.succeeded {
        info!(query_id, gas_used = outcome.gas_used, reward = %reward, "Response delivered");
        BoardEvent::ResponseDelivered {
            query_id,
            payload: entry.payload,
            callback_gas_used: outcome.gas_used,
        }
    } else {
        let reason = outcome.message.unwrap_or_default();
        warn!(
            query_id,
            requester = %request.requester,
            gas_used = outcome.gas_used,
            reason = %reason,
            "Response delivery failed"
        );
        BoardEvent::ResponseDeliveryFailed {
            query_id,
            payload: entry.payload,
            callback_gas_used: outcome.gas_used,
            reason,
        }
    };
    state.events.emit(tx.block, tx.timestamp, event);
    Ok(reward)
}

/// Hand `delivery` to the requester, choosing the error or value entry point
/// by the payload's leading byte.
fn dispatch(
    store: &QueryStore,
    consumers: &mut dyn ConsumerDirectory,
    request: &Request,
    delivery: &Delivery<'_>,
) -> CallOutcome {
    let Some(consumer) = consumers.consumer_mut(&request.requester) else {
        return CallOutcome::failed(0, MISSING_CAPABILITY_REASON);
    };
    if !consumer.supports_callbacks() {
        return CallOutcome::failed(0, MISSING_CAPABILITY_REASON);
    }
    let view = BoardView::new(store);
    match classify(delivery.payload) {
        Some(ResultKind::Error) => {
            let error = decode_error(delivery.payload).unwrap_or_else(|_| ResultError::unknown());
            isolated_call(request.callback_gas_limit, |gas| {
                consumer.report_error(delivery, &error, gas, &view)
            })
        }
        _ => isolated_call(request.callback_gas_limit, |gas| {
            consumer.report_result(delivery, gas, &view)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrb_types::{Address, QueryDefinition, Sla};

    fn store_with_posted() -> QueryStore {
        let mut store = QueryStore::new();
        let id = store.allocate_id().expect("id");
        store
            .put(
                id,
                Request {
                    requester: Address::repeat(1),
                    reward: 10,
                    definition: QueryDefinition::Verified([1; 32]),
                    sla: Sla {
                        committee_size: 1,
                        witness_reward: 1,
                        max_result_size: 8,
                    },
                    callback_gas_limit: 0,
                },
                1,
            )
            .expect("put");
        store
    }

    fn entry(query_id: QueryId, timestamp: u64) -> ReportEntry {
        ReportEntry {
            query_id,
            timestamp,
            tally_hash: [0xAB; 32],
            payload: vec![0x01],
        }
    }

    #[test]
    fn test_check_entry_order() {
        let store = store_with_posted();
        assert_eq!(check_entry(&store, &entry(1, 90), 100), Ok(90));
        assert_eq!(
            check_entry(&store, &entry(2, 90), 100),
            Err(Rejection::NotPosted(QueryStatus::Unknown))
        );

        let mut zero = entry(1, 90);
        zero.tally_hash = ZERO_HASH;
        assert_eq!(check_entry(&store, &zero, 100), Err(Rejection::ZeroTallyHash));

        let mut empty = entry(1, 90);
        empty.payload.clear();
        assert_eq!(check_entry(&store, &empty, 100), Err(Rejection::EmptyPayload));
    }

    #[test]
    fn test_zero_timestamp_uses_transaction_time() {
        let store = store_with_posted();
        assert_eq!(check_entry(&store, &entry(1, 0), 100), Ok(100));
        assert_eq!(check_entry(&store, &entry(1, 100), 100), Ok(100));
        assert_eq!(
            check_entry(&store, &entry(1, 101), 100),
            Err(Rejection::FutureTimestamp {
                timestamp: 101,
                now: 100
            })
        );
    }

    #[test]
    fn test_rejection_maps_to_error() {
        assert!(matches!(
            Rejection::EmptyPayload.into_error(1),
            BoardError::InvalidResult(_)
        ));
        assert!(matches!(
            Rejection::NotPosted(QueryStatus::Void).into_error(3),
            BoardError::NotPosted {
                query_id: 3,
                status: QueryStatus::Void
            }
        ));
        assert_eq!(
            Rejection::NotPosted(QueryStatus::Reported).to_string(),
            "query is reported"
        );
    }

    #[test]
    fn test_entry_json() {
        let json = serde_json::json!({
            "query_id": 4,
            "tally_hash": "ab".repeat(32),
            "payload": "1a0001e240",
        });
        let entry: ReportEntry = serde_json::from_value(json).expect("parse");
        assert_eq!(entry.timestamp, 0);
        assert_eq!(entry.payload, vec![0x1A, 0x00, 0x01, 0xE2, 0x40]);
    }
}
