//! # wrb-codec
//!
//! Codec for witnessed result payloads.
//!
//! Results are self-describing CBOR (RFC 8949). A payload whose leading byte
//! is a one-byte-tag header ([`ERROR_TAG_BYTE`]) carries an error report
//! wrapped in CBOR tag [`ERROR_TAG`]; anything else is a plain value.
//!
//! ## Modules
//!
//! - [`cbor`] — Serialization helpers over [`ciborium`]
//! - [`result`] — Payload classification and error decoding
//! - [`error_codes`] — Witnessing error codes

pub mod cbor;
pub mod error_codes;
pub mod result;

pub use ciborium::Value;
pub use error_codes::ResultErrorCode;
pub use result::{classify, decode_error, ResultError, ResultKind};

/// CBOR tag marking an error report.
pub const ERROR_TAG: u64 = 39;

/// Leading byte of a payload tagged with a one-byte tag number.
pub const ERROR_TAG_BYTE: u8 = 0xD8;

/// Error types for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// CBOR serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CBOR deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The payload is empty.
    #[error("empty payload")]
    EmptyPayload,

    /// The payload is not an error report.
    #[error("payload is not an error report")]
    NotAnError,
}

/// Convenience result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
