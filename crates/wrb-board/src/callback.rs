//! Consumer callbacks and isolated dispatch.
//!
//! A requester that asks for a callback must expose the [`Consumer`]
//! capability. Delivery runs inside [`isolated_call`]: a gas-capped call
//! boundary whose failure, whether a revert, exhausted gas or a panic, is
//! turned into a [`CallOutcome`] and never unwinds into the board.
//!
//! During a callback the consumer may inspect the board through a read-only
//! [`BoardView`]. It cannot mutate the board, and by the time it runs the
//! query it is being told about has already left `Posted` with its reward
//! zeroed.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use wrb_codec::ResultError;
use wrb_types::{Address, Amount, Query, QueryId, QueryStatus, TallyHash};

use crate::store::QueryStore;

/// Reason reported when a callback fails without one of its own.
pub const DEFAULT_FAILURE_REASON: &str = "exceeded gas limit";

/// Reason reported when the requester no longer exposes the capability.
pub const MISSING_CAPABILITY_REASON: &str = "missing callback capability";

/// A failure raised by a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFault {
    /// The consumer aborted, optionally with a reason.
    Reverted(String),
    /// The consumer tried to use more gas than it was given.
    OutOfGas,
}

/// Result of a callback invocation.
pub type CallResult = std::result::Result<(), CallbackFault>;

/// Gas accounting for one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    /// A meter with nothing used yet.
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Consume `gas`. Exceeding the limit pins usage at the limit.
    pub fn charge(&mut self, gas: u64) -> CallResult {
        let used = self.used.saturating_add(gas);
        if used > self.limit {
            self.used = self.limit;
            return Err(CallbackFault::OutOfGas);
        }
        self.used = used;
        Ok(())
    }

    /// Gas consumed so far.
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Gas left before the limit.
    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

/// The recorded outcome of an isolated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub succeeded: bool,
    pub gas_used: u64,
    /// Failure reason. `None` on success.
    pub message: Option<String>,
}

impl CallOutcome {
    /// A failed call that consumed `gas_used`.
    pub fn failed(gas_used: u64, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            gas_used,
            message: Some(message.into()),
        }
    }
}

/// Run `call` under a gas cap of `limit`, converting any failure into a
/// recorded outcome.
pub fn isolated_call<F>(limit: u64, call: F) -> CallOutcome
where
    F: FnOnce(&mut GasMeter) -> CallResult,
{
    let mut meter = GasMeter::new(limit);
    let result = panic::catch_unwind(AssertUnwindSafe(|| call(&mut meter)));
    let gas_used = meter.used();
    match result {
        Ok(Ok(())) => CallOutcome {
            succeeded: true,
            gas_used,
            message: None,
        },
        Ok(Err(CallbackFault::OutOfGas)) => CallOutcome::failed(limit, DEFAULT_FAILURE_REASON),
        Ok(Err(CallbackFault::Reverted(reason))) => {
            CallOutcome::failed(gas_used, non_empty_reason(reason))
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            CallOutcome::failed(gas_used, non_empty_reason(reason))
        }
    }
}

fn non_empty_reason(reason: String) -> String {
    if reason.is_empty() {
        DEFAULT_FAILURE_REASON.to_string()
    } else {
        reason
    }
}

/// A result handed to a consumer.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    pub query_id: QueryId,
    pub timestamp: u64,
    pub tally_hash: &'a TallyHash,
    pub finality_block: u64,
    /// The full CBOR payload.
    pub payload: &'a [u8],
}

/// Read-only view of the board available during a callback.
#[derive(Clone, Copy)]
pub struct BoardView<'a> {
    store: &'a QueryStore,
}

impl<'a> BoardView<'a> {
    /// View over `store` as it stands mid-report.
    pub fn new(store: &'a QueryStore) -> Self {
        Self { store }
    }

    /// Derived status of `id`.
    pub fn status(&self, id: QueryId) -> QueryStatus {
        self.store.status(id)
    }

    /// The stored query, if any.
    pub fn query(&self, id: QueryId) -> Option<&'a Query> {
        self.store.get(id)
    }

    /// Reward still escrowed for `id`.
    pub fn reward(&self, id: QueryId) -> Amount {
        self.store
            .get(id)
            .map(|query| query.request.reward)
            .unwrap_or_default()
    }
}

/// Callback capability exposed by requesters.
///
/// A consumer's own state is outside the board's checkpoints: if the
/// report that delivered a callback is reverted afterwards, the board goes
/// back to *Posted* but the consumer keeps whatever it did. Hosts that own
/// their consumers snapshot them around each transaction.
pub trait Consumer: Send {
    /// Answer to the probe made when a callback is requested.
    fn supports_callbacks(&self) -> bool {
        true
    }

    /// Receive a successfully witnessed value.
    fn report_result(
        &mut self,
        delivery: &Delivery<'_>,
        gas: &mut GasMeter,
        board: &BoardView<'_>,
    ) -> CallResult;

    /// Receive an error report.
    fn report_error(
        &mut self,
        delivery: &Delivery<'_>,
        error: &ResultError,
        gas: &mut GasMeter,
        board: &BoardView<'_>,
    ) -> CallResult;
}

/// Resolves requester addresses to consumers.
pub trait ConsumerDirectory {
    /// Whether `address` exposes the callback capability.
    fn probe(&self, address: &Address) -> bool;

    fn consumer_mut(&mut self, address: &Address) -> Option<&mut dyn Consumer>;
}

/// Consumers registered by address.
#[derive(Default)]
pub struct Consumers {
    consumers: HashMap<Address, Box<dyn Consumer>>,
}

impl Consumers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `consumer` as the callback capability of `address`.
    pub fn register(&mut self, address: Address, consumer: Box<dyn Consumer>) {
        self.consumers.insert(address, consumer);
    }

    /// Withdraw the capability of `address`.
    pub fn remove(&mut self, address: &Address) -> Option<Box<dyn Consumer>> {
        self.consumers.remove(address)
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl ConsumerDirectory for Consumers {
    fn probe(&self, address: &Address) -> bool {
        self.consumers
            .get(address)
            .is_some_and(|consumer| consumer.supports_callbacks())
    }

    fn consumer_mut(&mut self, address: &Address) -> Option<&mut dyn Consumer> {
        let consumer = self.consumers.get_mut(address)?;
        Some(consumer.as_mut())
    }
}
