//! # wrb-feeds
//!
//! Price feeds built on top of the request board.
//!
//! A feed owns a deterministic account, posts update queries with a callback
//! and receives witnessed prices through the [`Consumer`](wrb_board::Consumer)
//! capability. Accepted prices are kept as observations from which a
//! time-weighted average is computed; a circuit breaker stops serving prices
//! once data goes stale or the witnessing network keeps returning errors.
//!
//! ## Modules
//!
//! - [`twap`] — Time-weighted average over observations
//! - [`circuit_breaker`] — Staleness and error-streak breaker
//! - [`feed`] — A single price feed consumer
//! - [`router`] — Feeds keyed by account, exposed to the board as consumers
//! - [`config`] — Feed definitions

pub mod circuit_breaker;
pub mod config;
pub mod feed;
pub mod router;
pub mod twap;

pub use config::FeedConfig;
pub use feed::{Observation, PriceFeed, PriceReading};
pub use router::FeedRouter;

/// Error types for feed operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Not enough observations inside the averaging window.
    #[error("insufficient observations: need {required}, have {available}")]
    InsufficientObservations {
        /// Number of observations required.
        required: usize,
        /// Number of observations available.
        available: usize,
    },

    /// Observation timestamps must strictly increase.
    #[error("non-monotonic timestamp: {new} <= {last}")]
    NonMonotonicTimestamp {
        /// The rejected timestamp.
        new: u64,
        /// The last accepted timestamp.
        last: u64,
    },

    /// The observations span no time.
    #[error("no time elapsed in the averaging window")]
    EmptyWindow,

    /// The last accepted price is too old.
    #[error("feed data is stale: last update {last_update}, now {now}, threshold {threshold}")]
    StaleData {
        /// Timestamp of the last accepted price.
        last_update: u64,
        /// Current time.
        now: u64,
        /// Staleness threshold in seconds.
        threshold: u64,
    },

    /// The breaker tripped after consecutive error results.
    #[error("feed is paused after {0} consecutive error results")]
    Paused(u32),

    /// No feed with this caption.
    #[error("unknown feed: {0}")]
    UnknownFeed(String),

    /// A feed with this caption already exists.
    #[error("duplicate feed: {0}")]
    DuplicateFeed(String),

    /// The feed definition is invalid.
    #[error("invalid feed definition: {0}")]
    InvalidDefinition(String),

    /// A result payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] wrb_codec::CodecError),
}

/// Convenience result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
