//! Node configuration file.
//!
//! Loaded from `$WRB_DATA_DIR/config.toml`; every section falls back to its
//! defaults when absent.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use wrb_board::BoardConfig;
use wrb_feeds::FeedConfig;
use wrb_types::{Address, Amount};

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Board policy bounds and pricing constants.
    #[serde(default)]
    pub board: BoardConfig,
    /// Local chain settings.
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
    /// Price feeds hosted by the node.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

/// Local chain configuration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Deployer and first owner of the board.
    #[serde(default = "default_genesis_owner")]
    pub genesis_owner: Address,
    /// Reporters authorized at genesis.
    #[serde(default = "default_reporters")]
    pub reporters: Vec<Address>,
    /// Accounts funded at genesis.
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
    /// Balance credited to every hosted feed account at genesis.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_feed_funding")]
    pub feed_funding: Amount,
    /// Seconds between consecutive blocks.
    #[serde(default = "default_block_time")]
    pub block_time_secs: u64,
    /// Gas price charged to every transaction.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_gas_price")]
    pub gas_price: u128,
}

/// A funded genesis account. Amounts are decimal strings.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub address: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub amount: Amount,
}

/// JSON-RPC configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Unix socket path. Empty = `$data_dir/wrb.sock`.
    #[serde(default)]
    pub socket_path: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Persist board events to the SQLite journal.
    #[serde(default = "default_true")]
    pub journal_enabled: bool,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Enable the `dev_*` RPC methods (faucet, simulated witnessing).
    #[serde(default = "default_true")]
    pub dev_mode: bool,
}

fn default_genesis_owner() -> Address {
    Address::repeat(0x01)
}

fn default_reporters() -> Vec<Address> {
    vec![Address::repeat(0x02)]
}

fn default_feed_funding() -> Amount {
    1_000_000_000_000_000_000
}

fn default_block_time() -> u64 {
    15
}

fn default_gas_price() -> u128 {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_owner: default_genesis_owner(),
            reporters: default_reporters(),
            balances: Vec::new(),
            feed_funding: default_feed_funding(),
            block_time_secs: default_block_time(),
            gas_price: default_gas_price(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            journal_enabled: true,
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dev_mode: true,
        }
    }
}

impl NodeConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: NodeConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Check the board policy and every feed definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.board.validate()?;
        for feed in &self.feeds {
            feed.validate()?;
        }
        if self.chain.block_time_secs == 0 {
            anyhow::bail!("chain.block_time_secs must be positive");
        }
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Configured socket path, or `wrb.sock` under the data directory when unset.
    pub fn socket_path(&self) -> PathBuf {
        if self.rpc.socket_path.is_empty() {
            self.data_dir().join("wrb.sock")
        } else {
            PathBuf::from(&self.rpc.socket_path)
        }
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("WRB_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".wrb"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/wrb"))
    }
}
