//! Board policy configuration.
//!
//! Bounds applied when admitting queries, and the constants of the default
//! gas-based pricing policy. Every field has a default so partial TOML
//! sections deserialize cleanly.

use serde::{Deserialize, Serialize};

use crate::escrow::GasPricing;
use crate::{BoardError, Result};

/// Policy bounds for the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Smallest witnessing committee accepted.
    #[serde(default = "default_min_committee_size")]
    pub min_committee_size: u8,
    /// Largest witnessing committee accepted.
    #[serde(default = "default_max_committee_size")]
    pub max_committee_size: u8,
    /// Minimum reward per witness, in nanowits.
    #[serde(default = "default_min_witness_reward")]
    pub min_witness_reward: u64,
    /// Largest result size an SLA may ask for, in bytes.
    #[serde(default = "default_max_result_size")]
    pub max_result_size: u16,
    /// Largest callback gas limit a requester may ask for.
    #[serde(default = "default_max_callback_gas_limit")]
    pub max_callback_gas_limit: u64,
    /// Largest unverified bytecode accepted inline, in bytes.
    #[serde(default = "default_max_bytecode_size")]
    pub max_bytecode_size: usize,
    /// Blocks after which an unreported query may be purged and refunded.
    /// Zero disables expiry.
    #[serde(default = "default_query_expiry_blocks")]
    pub query_expiry_blocks: u64,
    /// Constants of the default pricing policy.
    #[serde(default)]
    pub pricing: GasPricing,
}

fn default_min_committee_size() -> u8 {
    1
}

fn default_max_committee_size() -> u8 {
    127
}

fn default_min_witness_reward() -> u64 {
    1_000_000
}

fn default_max_result_size() -> u16 {
    2048
}

fn default_max_callback_gas_limit() -> u64 {
    3_000_000
}

fn default_max_bytecode_size() -> usize {
    16 * 1024
}

fn default_query_expiry_blocks() -> u64 {
    50_400
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            min_committee_size: default_min_committee_size(),
            max_committee_size: default_max_committee_size(),
            min_witness_reward: default_min_witness_reward(),
            max_result_size: default_max_result_size(),
            max_callback_gas_limit: default_max_callback_gas_limit(),
            max_bytecode_size: default_max_bytecode_size(),
            query_expiry_blocks: default_query_expiry_blocks(),
            pricing: GasPricing::default(),
        }
    }
}

impl BoardConfig {
    /// Check the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// - [`BoardError::InvalidConfig`] if a bound is empty or inverted
    pub fn validate(&self) -> Result<()> {
        if self.min_committee_size == 0 {
            return Err(BoardError::InvalidConfig(
                "min_committee_size must be at least 1".to_string(),
            ));
        }
        if self.min_committee_size > self.max_committee_size {
            return Err(BoardError::InvalidConfig(format!(
                "min_committee_size {} exceeds max_committee_size {}",
                self.min_committee_size, self.max_committee_size
            )));
        }
        if self.max_result_size == 0 {
            return Err(BoardError::InvalidConfig(
                "max_result_size must be at least 1".to_string(),
            ));
        }
        if self.max_bytecode_size == 0 {
            return Err(BoardError::InvalidConfig(
                "max_bytecode_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a query posted at `posted_block` has expired at `current_block`.
    pub fn is_expired(&self, posted_block: u64, current_block: u64) -> bool {
        self.query_expiry_blocks > 0
            && current_block >= posted_block.saturating_add(self.query_expiry_blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BoardConfig::default();
        config.validate().expect("default config should be valid");
        assert_eq!(config.min_committee_size, 1);
        assert_eq!(config.max_committee_size, 127);
        assert_eq!(config.max_result_size, 2048);
    }

    #[test]
    fn test_inverted_committee_bounds_rejected() {
        let config = BoardConfig {
            min_committee_size: 10,
            max_committee_size: 5,
            ..BoardConfig::default()
        };
        assert!(matches!(config.validate(), Err(BoardError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BoardConfig = toml::from_str("max_committee_size = 20").expect("parse");
        assert_eq!(config.max_committee_size, 20);
        assert_eq!(config.min_committee_size, 1);
        assert_eq!(config.pricing, GasPricing::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = BoardConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: BoardConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_expiry() {
        let config = BoardConfig {
            query_expiry_blocks: 100,
            ..BoardConfig::default()
        };
        assert!(!config.is_expired(10, 109));
        assert!(config.is_expired(10, 110));

        let never = BoardConfig {
            query_expiry_blocks: 0,
            ..BoardConfig::default()
        };
        assert!(!never.is_expired(0, u64::MAX));
    }
}
