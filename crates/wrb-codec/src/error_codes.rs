//! Error codes reported by the witnessing network.

use serde::{Deserialize, Serialize};

/// Error codes carried as the first element of an error report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ResultErrorCode {
    Unknown = 0x00,
    // Script format errors
    SourceScriptNotCbor = 0x01,
    SourceScriptNotArray = 0x02,
    SourceScriptNotRadon = 0x03,
    // Complexity errors
    RequestTooManySources = 0x10,
    ScriptTooManyCalls = 0x11,
    // Operator errors
    UnsupportedOperator = 0x20,
    // Retrieval errors
    HttpError = 0x30,
    RetrievalTimeout = 0x31,
    // Math errors
    Underflow = 0x40,
    Overflow = 0x41,
    DivisionByZero = 0x42,
    // Consensus errors
    NoReveals = 0x50,
    InsufficientConsensus = 0x51,
    InsufficientCommits = 0x52,
    TallyExecution = 0x53,
    MalformedReveal = 0x60,
    // Bridge errors
    BridgeMalformedRequest = 0xE0,
    BridgePoorIncentives = 0xE1,
    BridgeOversizedResult = 0xE2,
    UnhandledIntercept = 0xFF,
}

impl ResultErrorCode {
    /// Map a raw code to a known variant. Unrecognized codes become `Unknown`.
    pub fn from_u64(raw: u64) -> Self {
        match raw {
            0x01 => Self::SourceScriptNotCbor,
            0x02 => Self::SourceScriptNotArray,
            0x03 => Self::SourceScriptNotRadon,
            0x10 => Self::RequestTooManySources,
            0x11 => Self::ScriptTooManyCalls,
            0x20 => Self::UnsupportedOperator,
            0x30 => Self::HttpError,
            0x31 => Self::RetrievalTimeout,
            0x40 => Self::Underflow,
            0x41 => Self::Overflow,
            0x42 => Self::DivisionByZero,
            0x50 => Self::NoReveals,
            0x51 => Self::InsufficientConsensus,
            0x52 => Self::InsufficientCommits,
            0x53 => Self::TallyExecution,
            0x60 => Self::MalformedReveal,
            0xE0 => Self::BridgeMalformedRequest,
            0xE1 => Self::BridgePoorIncentives,
            0xE2 => Self::BridgeOversizedResult,
            0xFF => Self::UnhandledIntercept,
            _ => Self::Unknown,
        }
    }

    /// Numeric code as carried in the payload.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Errors raised by the bridge rather than by the witnessing network.
    pub fn is_bridge_error(self) -> bool {
        matches!(
            self,
            Self::BridgeMalformedRequest | Self::BridgePoorIncentives | Self::BridgeOversizedResult
        )
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Unknown => "unknown error",
            Self::SourceScriptNotCbor => "source script is not a valid CBOR value",
            Self::SourceScriptNotArray => "source script is not a CBOR array",
            Self::SourceScriptNotRadon => "source script is not a valid data request script",
            Self::RequestTooManySources => "request contains too many sources",
            Self::ScriptTooManyCalls => "script contains too many calls",
            Self::UnsupportedOperator => "operator is not supported",
            Self::HttpError => "source returned an HTTP error",
            Self::RetrievalTimeout => "source retrieval timed out",
            Self::Underflow => "arithmetic underflow",
            Self::Overflow => "arithmetic overflow",
            Self::DivisionByZero => "division by zero",
            Self::NoReveals => "no witness revealed a result",
            Self::InsufficientConsensus => "witnesses did not reach consensus",
            Self::InsufficientCommits => "not enough witnesses committed",
            Self::TallyExecution => "tally script failed",
            Self::MalformedReveal => "a witness revealed a malformed result",
            Self::BridgeMalformedRequest => "request is malformed and cannot be relayed",
            Self::BridgePoorIncentives => "reward is too low to relay the request",
            Self::BridgeOversizedResult => "result exceeds the allowed size",
            Self::UnhandledIntercept => "unhandled intercept",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u64_roundtrip() {
        for code in [
            ResultErrorCode::HttpError,
            ResultErrorCode::InsufficientConsensus,
            ResultErrorCode::BridgeOversizedResult,
            ResultErrorCode::UnhandledIntercept,
        ] {
            assert_eq!(ResultErrorCode::from_u64(u64::from(code.as_u8())), code);
        }
    }

    #[test]
    fn test_unrecognized_is_unknown() {
        assert_eq!(ResultErrorCode::from_u64(0x99), ResultErrorCode::Unknown);
        assert_eq!(ResultErrorCode::from_u64(1_000), ResultErrorCode::Unknown);
    }

    #[test]
    fn test_bridge_errors() {
        assert!(ResultErrorCode::BridgePoorIncentives.is_bridge_error());
        assert!(!ResultErrorCode::HttpError.is_bridge_error());
    }
}
