//! # Node Configuration
//!
//! Defaults, then an optional JSON file, then `EVM_*` environment variables.
//!
//! | Variable | Field |
//! |---|---|
//! | `EVM_CHAIN_ID` | `chain.chain_id` |
//! | `EVM_GAS_LIMIT` | `chain.gas_limit` |
//! | `EVM_BASE_FEE` | `chain.base_fee` |
//! | `EVM_MINING_MODE` | `mining.mode` (`auto`, `manual`, `interval:<ms>`) |
//! | `EVM_LOG_LEVEL` | `logging.level` |
//! | `EVM_LOG_JSON` | `logging.json` |
//! | `EVM_STATE_FILE` | `state_file` |

use crate::errors::{NodeError, Result};
use evm_state::ForkConfig;
use evm_txpool::TxPoolConfig;
use serde::Deserialize;
use shared_types::{Address, U256};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Well-known development keys, funded at genesis by default.
pub const DEV_PRIVATE_KEYS: [&str; 3] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

const DEV_ADDRESSES: [&str; 3] = [
    "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
    "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
    "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc",
];

/// 10,000 ether.
const DEV_BALANCE_WEI: u128 = 10_000 * 1_000_000_000_000_000_000;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeConfig {
    pub chain: ChainConfig,
    pub mining: MiningConfig,
    pub txpool: TxPoolConfig,
    pub logging: LoggingConfig,
    /// Fork settings; the backend itself is supplied at construction.
    pub fork: Option<ForkConfig>,
    /// State dump loaded at startup and written on shutdown.
    pub state_file: Option<PathBuf>,
}

impl NodeConfig {
    /// Defaults overlaid with `EVM_*` environment variables.
    ///
    /// # Errors
    ///
    /// [`NodeError::Config`] for a variable that does not parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Overlay variables read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("EVM_CHAIN_ID") {
            self.chain.chain_id = parse_var("EVM_CHAIN_ID", &value)?;
        }
        if let Some(value) = lookup("EVM_GAS_LIMIT") {
            self.chain.gas_limit = parse_var("EVM_GAS_LIMIT", &value)?;
        }
        if let Some(value) = lookup("EVM_BASE_FEE") {
            let fee: u128 = parse_var("EVM_BASE_FEE", &value)?;
            self.chain.base_fee = U256::from(fee);
        }
        if let Some(value) = lookup("EVM_MINING_MODE") {
            self.mining.mode = value.parse()?;
        }
        if let Some(value) = lookup("EVM_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("EVM_LOG_JSON") {
            self.logging.json = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(value) = lookup("EVM_STATE_FILE") {
            self.state_file = Some(PathBuf::from(value));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NodeError::Config(format!("{key} has invalid value {value:?}")))
}

/// Genesis and fee market parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub gas_limit: u64,
    /// Base fee of the genesis block in wei.
    pub base_fee: U256,
    pub coinbase: Address,
    pub genesis_timestamp: u64,
    pub prefunded: Vec<GenesisAccount>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 900,
            gas_limit: 30_000_000,
            base_fee: U256::from(1_000_000_000u64),
            coinbase: Address::ZERO,
            genesis_timestamp: 0,
            prefunded: dev_accounts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub balance: U256,
}

/// The development accounts behind [`DEV_PRIVATE_KEYS`].
pub fn dev_accounts() -> Vec<GenesisAccount> {
    DEV_ADDRESSES
        .iter()
        .filter_map(|a| a.parse().ok())
        .map(|address| GenesisAccount {
            address,
            balance: U256::from(DEV_BALANCE_WEI),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub mode: MiningMode,
}

/// When blocks are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningMode {
    /// Mine every accepted transaction immediately.
    #[default]
    Auto,
    /// Only on explicit `mine` calls.
    Manual,
    /// On a fixed period.
    Interval { ms: u64 },
}

impl MiningMode {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::Interval { ms } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

impl FromStr for MiningMode {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => {
                let ms = other
                    .strip_prefix("interval:")
                    .and_then(|ms| ms.parse().ok())
                    .filter(|ms| *ms > 0)
                    .ok_or_else(|| NodeError::Config(format!("unknown mining mode {s:?}")))?;
                Ok(Self::Interval { ms })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
