//! # Node Errors
//!
//! Transport-level failures (`InvalidParams`, `Timeout`) stay distinct from
//! the validation and storage errors wrapped from the crates below.

use evm_block::BlockError;
use evm_chain::ChainError;
use evm_interpreter::EvmError;
use evm_state::StateError;
use evm_txpool::TxPoolError;
use shared_types::TxError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Block error: {0}")]
    Block(#[from] BlockError),

    #[error("Pool error: {0}")]
    Pool(#[from] TxPoolError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("EVM error: {0}")]
    Evm(#[from] EvmError),

    #[error("Transaction error: {0}")]
    Tx(#[from] TxError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
