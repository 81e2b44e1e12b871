//! Feed definitions.
//!
//! Loaded from `[[feeds]]` tables of the node configuration.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use wrb_types::{Address, Sla};

use crate::{FeedError, Result};

/// Definition of one price feed.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Unique caption, e.g. `Price-ETH/USD-6`.
    pub caption: String,
    /// Decimals of the integer price reported by the witnessing network.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Retrieval script, hex encoded.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub bytecode: Vec<u8>,
    #[serde(default = "default_committee_size")]
    pub committee_size: u8,
    #[serde(default = "default_witness_reward")]
    pub witness_reward: u64,
    #[serde(default = "default_max_result_size")]
    pub max_result_size: u16,
    #[serde(default = "default_callback_gas_limit")]
    pub callback_gas_limit: u64,
    /// Averaging window in seconds.
    #[serde(default = "default_twap_window_secs")]
    pub twap_window_secs: u64,
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
}

fn default_decimals() -> u8 {
    6
}

fn default_committee_size() -> u8 {
    10
}

fn default_witness_reward() -> u64 {
    1_000_000
}

fn default_max_result_size() -> u16 {
    16
}

fn default_callback_gas_limit() -> u64 {
    150_000
}

fn default_twap_window_secs() -> u64 {
    3600
}

fn default_staleness_threshold() -> u64 {
    crate::circuit_breaker::STALENESS_THRESHOLD
}

fn default_max_consecutive_errors() -> u32 {
    crate::circuit_breaker::MAX_CONSECUTIVE_ERRORS
}

impl FeedConfig {
    /// A feed with default parameters.
    pub fn new(caption: impl Into<String>, bytecode: Vec<u8>) -> Self {
        Self {
            caption: caption.into(),
            decimals: default_decimals(),
            bytecode,
            committee_size: default_committee_size(),
            witness_reward: default_witness_reward(),
            max_result_size: default_max_result_size(),
            callback_gas_limit: default_callback_gas_limit(),
            twap_window_secs: default_twap_window_secs(),
            staleness_threshold: default_staleness_threshold(),
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }

    /// # Errors
    ///
    /// - [`FeedError::InvalidDefinition`] on an empty caption or script, or
    ///   a zero callback gas limit
    pub fn validate(&self) -> Result<()> {
        if self.caption.trim().is_empty() {
            return Err(FeedError::InvalidDefinition("empty caption".to_string()));
        }
        if self.bytecode.is_empty() {
            return Err(FeedError::InvalidDefinition(format!(
                "feed {} has no retrieval script",
                self.caption
            )));
        }
        if self.callback_gas_limit == 0 {
            return Err(FeedError::InvalidDefinition(format!(
                "feed {} needs a callback gas limit",
                self.caption
            )));
        }
        Ok(())
    }

    /// Witnessing commitment requested by update queries.
    pub fn sla(&self) -> Sla {
        Sla {
            committee_size: self.committee_size,
            witness_reward: self.witness_reward,
            max_result_size: self.max_result_size,
        }
    }

    /// Account the feed posts from and receives callbacks on.
    pub fn address(&self) -> Address {
        wrb_crypto::blake3::feed_address(&self.caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults() {
        let config: FeedConfig = toml::from_str(
            r#"
            caption = "Price-ETH/USD-6"
            bytecode = "0a1b2c"
            "#,
        )
        .expect("parse");
        assert_eq!(config.decimals, 6);
        assert_eq!(config.bytecode, vec![0x0A, 0x1B, 0x2C]);
        assert_eq!(config.callback_gas_limit, 150_000);
        config.validate().expect("valid");
    }

    #[test]
    fn test_validate_rejects_empty_script() {
        let config = FeedConfig::new("Price-BTC/USD-6", Vec::new());
        assert!(matches!(
            config.validate(),
            Err(FeedError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_address_follows_caption() {
        let a = FeedConfig::new("Price-ETH/USD-6", vec![1]);
        let b = FeedConfig::new("Price-ETH/USD-6", vec![2]);
        assert_eq!(a.address(), b.address());
        assert_eq!(a.sla().committee_size, 10);
    }
}
