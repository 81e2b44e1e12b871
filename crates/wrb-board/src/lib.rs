//! # wrb-board
//!
//! Query lifecycle and reward/callback engine of the witness request board.
//!
//! A requester posts a query together with an escrowed reward; an authorized
//! reporter later delivers the witnessed result, optionally dispatching it to
//! the requester through a gas-capped callback, and collects the reward.
//!
//! ## Modules
//!
//! - [`store`] — Query Store and status derivation
//! - [`acl`] — Owner and reporter set
//! - [`escrow`] — Escrow Ledger and fee estimation
//! - [`posting`] — Admission of new queries
//! - [`reporting`] — Single and batched result delivery
//! - [`callback`] — Consumer capability and isolated callback dispatch
//! - [`registry`] — Query definition registry collaborator
//! - [`host`] — Transaction context and payment primitive
//! - [`events`] — Append-only event log
//! - [`state`] — Process-wide board state with transactional checkpoints
//! - [`board`] — Public facade
//! - [`config`] — Policy bounds and pricing constants

pub mod acl;
pub mod board;
pub mod callback;
pub mod config;
pub mod escrow;
pub mod events;
pub mod host;
pub mod posting;
pub mod registry;
pub mod reporting;
pub mod state;
pub mod store;

pub use board::RequestBoard;
pub use callback::{
    BoardView, CallOutcome, CallResult, CallbackFault, Consumer, ConsumerDirectory, Consumers,
    Delivery, GasMeter,
};
pub use config::BoardConfig;
pub use escrow::{GasPricing, PricingPolicy};
pub use host::{Balances, Env, PaymentError, PaymentGateway, TxContext};
pub use registry::{InMemoryRegistry, RegisteredRequest, RequestRegistry};
pub use reporting::{Rejection, ReportEntry};

use wrb_types::{Address, Amount, QueryId, QueryStatus};

/// Error types for board operations.
///
/// Every variant aborts the whole operation. Callback failures and rejected
/// batch entries are never surfaced here; they are recorded as events.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// The caller lacks the owner or reporter capability, or is not the
    /// requester of the query.
    #[error("unauthorized caller {caller}: {reason}")]
    Unauthorized {
        /// The offending caller.
        caller: Address,
        /// Which capability was missing.
        reason: &'static str,
    },

    /// The SLA is outside the policy bounds.
    #[error("invalid SLA: {0}")]
    InvalidSla(String),

    /// The requester does not expose the callback capability.
    #[error("invalid callback recipient: {0}")]
    InvalidCallbackRecipient(Address),

    /// The callback gas limit exceeds the policy bound.
    #[error("callback gas limit {limit} exceeds maximum {max}")]
    CallbackGasLimitTooHigh {
        /// Requested gas limit.
        limit: u64,
        /// Maximum allowed gas limit.
        max: u64,
    },

    /// The paid value does not cover the minimum fee.
    #[error("insufficient reward: paid {paid}, required {required}")]
    InsufficientReward {
        /// Value paid with the call.
        paid: Amount,
        /// Minimum value required.
        required: Amount,
    },

    /// The query definition is unknown, invalid or oversized.
    #[error("invalid query definition: {0}")]
    InvalidQueryDefinition(String),

    /// The query is not awaiting a report.
    #[error("query {query_id} is not posted (status: {status})")]
    NotPosted {
        /// The query identifier.
        query_id: QueryId,
        /// Its current status.
        status: QueryStatus,
    },

    /// The query identifier was never issued, or the query was purged.
    #[error("unknown query {0}")]
    UnknownQuery(QueryId),

    /// The reported result is unusable (zero tally hash or empty payload).
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// The reported resolution time lies in the future.
    #[error("timestamp {timestamp} is in the future (now {now})")]
    FutureTimestamp {
        /// Reported resolution time.
        timestamp: u64,
        /// Time of the reporting transaction.
        now: u64,
    },

    /// The query cannot be fetched in its current status.
    #[error("query {query_id} cannot be fetched (status: {status})")]
    NotFetchable {
        /// The query identifier.
        query_id: QueryId,
        /// Its current status.
        status: QueryStatus,
    },

    /// The zero address was supplied where an account is required.
    #[error("zero address not allowed")]
    ZeroAddress,

    /// The payment primitive failed; the operation is reverted.
    #[error("payment failed: {0}")]
    Payment(#[from] PaymentError),

    /// Escrow accounting does not match the stored rewards.
    #[error("escrow invariant violated: {0}")]
    EscrowInvariant(String),

    /// A stored payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] wrb_codec::CodecError),

    /// Arithmetic overflow.
    #[error("arithmetic overflow")]
    Overflow,

    /// Invalid board configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoardError::InsufficientReward {
            paid: 10,
            required: 25,
        };
        assert_eq!(err.to_string(), "insufficient reward: paid 10, required 25");

        let err = BoardError::NotPosted {
            query_id: 4,
            status: QueryStatus::Reported,
        };
        assert_eq!(err.to_string(), "query 4 is not posted (status: reported)");
    }
}
