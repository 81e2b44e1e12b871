//! # wrb-types
//!
//! Shared domain types used across the WRB workspace: addresses, query
//! records, statuses and the canonical board events.

pub mod address;
pub mod events;
pub mod query;

pub use address::Address;
pub use events::{BoardEvent, EventRecord};
pub use query::{
    CallbackReceipt, Query, QueryDefinition, QueryStatus, Request, Response, Sla,
};

/// Common type aliases.
pub type Hash = [u8; 32];
pub type RadHash = [u8; 32];
pub type TallyHash = [u8; 32];
pub type QueryId = u64;
pub type Bytes = Vec<u8>;

/// Native-token amount in the smallest denomination.
pub type Amount = u128;

/// The all-zero hash. Never a valid tally hash.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Identifier of the first query ever posted. Zero is never issued.
pub const FIRST_QUERY_ID: QueryId = 1;

/// Nanowits per wit.
pub const NANOWITS_PER_WIT: u64 = 1_000_000_000;

/// Parse error for textual identifiers.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Input is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Decoded input has the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },
}

/// Decode a `0x`-prefixed (or bare) hex string into a 32-byte hash.
pub fn parse_hash(s: &str) -> Result<Hash, ParseError> {
    let bytes = hex::decode(s.trim_start_matches("0x"))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ParseError::InvalidLength { expected: 32, actual })
}
