//! # EVM Node Library
//!
//! The node context object and everything the binary wires around it.
//!
//! ```text
//!   send_transaction / send_raw_transaction
//!              │
//!              ▼
//!           TxPool ──txs_by_price_and_nonce──→ BlockBuilder ──→ Blockchain
//!                                                   │
//!   call / estimate_gas ──→ run_tx (reverted)       ▼
//!                                              StateManager
//! ```
//!
//! ## Modules
//!
//! - `config` - `NodeConfig` with defaults, JSON and `EVM_*` overrides
//! - `logging` - tracing subscriber setup
//! - `node` - `EvmNode`, the single owner of state, chain and pool
//! - `tasks` - interval miner and call timeouts on tokio
//! - `domain` - genesis and request/response shapes
//! - `adapters` - the pool's view of node state

#![allow(clippy::module_name_repetitions)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod node;
pub mod tasks;

pub use config::{
    ChainConfig, GenesisAccount, LoggingConfig, MiningConfig, MiningMode, NodeConfig,
    DEV_PRIVATE_KEYS,
};
pub use domain::{BlockTag, CallParams, CallResult, TransactionReceipt, TransactionRequest};
pub use errors::{NodeError, Result};
pub use logging::init_tracing;
pub use node::EvmNode;
pub use tasks::{call_with_timeout, spawn_interval_miner};
