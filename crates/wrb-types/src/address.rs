//! Account addresses on the host ledger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::ParseError;

/// A 20-byte account address.
#[serde_as]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid owner, reporter or requester.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build an address whose every byte is `byte`. Handy in tests and configs.
    pub const fn repeat(byte: u8) -> Self {
        Address([byte; 20])
    }

    /// Whether this is the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let actual = bytes.len();
        let raw: [u8; 20] = bytes
            .try_into()
            .map_err(|_| ParseError::InvalidLength { expected: 20, actual })?;
        Ok(Address(raw))
    }
}

impl From<[u8; 20]> for Address {
    fn from(raw: [u8; 20]) -> Self {
        Address(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrip() {
        let addr = Address::repeat(0x11);
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 42);
        let parsed: Address = text.parse().expect("parse");
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_parse_without_prefix() {
        let parsed: Address = "22".repeat(20).parse().expect("parse");
        assert_eq!(parsed, Address::repeat(0x22));
    }

    #[test]
    fn test_parse_wrong_length() {
        let err = "0x1234".parse::<Address>().expect_err("short");
        assert!(matches!(err, ParseError::InvalidLength { expected: 20, actual: 2 }));
    }

    #[test]
    fn test_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::repeat(1).is_zero());
    }

    #[test]
    fn test_serde_hex() {
        let addr = Address::repeat(0xAB);
        let json = serde_json::to_string(&addr).expect("serialize");
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, addr);
    }
}
