//! Transaction pool error types.

use evm_state::StateError;
use shared_types::{Address, Hash, TxError, U256};
use thiserror::Error;

/// Reasons a transaction is refused by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxPoolError {
    #[error("Transaction is not signed")]
    NotSigned,

    #[error("Invalid sender: {0}")]
    InvalidSender(#[from] TxError),

    #[error("Transaction too large: {size} bytes exceeds max data size of {max} bytes")]
    DataTooLarge { size: usize, max: usize },

    #[error("Transaction pool is full: {capacity} transactions")]
    PoolFull { capacity: usize },

    #[error("Underpriced: tip {tip} below minimum {minimum}")]
    Underpriced { tip: U256, minimum: U256 },

    #[error("Sender limit reached: {sender} already has {count} transactions")]
    SenderLimit { sender: Address, count: usize },

    #[error("Already known: {0}")]
    AlreadyKnown(Hash),

    #[error("Replacement underpriced: tip {tip} (min {min_tip}), max fee {max_fee} (min {min_max_fee})")]
    ReplacementUnderpriced {
        tip: U256,
        min_tip: U256,
        max_fee: U256,
        min_max_fee: U256,
    },

    #[error("Replacement blob gas underpriced: got {got}, min {min}")]
    ReplacementBlobUnderpriced { got: U256, min: U256 },

    #[error("Fee cap too low: {max_fee} not within 50% of base fee {base_fee}")]
    FeeCapTooLow { max_fee: U256, base_fee: U256 },

    #[error("Gas limit exceeds block gas limit: {gas_limit} > {block_gas_limit}")]
    GasLimitExceeded { gas_limit: u64, block_gas_limit: u64 },

    #[error("Nonce too low: account nonce {account}, got {got}")]
    NonceTooLow { account: u64, got: u64 },

    #[error("Insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: U256, have: U256 },

    #[error("Transaction pool is closed")]
    Closed,

    #[error("State error: {0}")]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, TxPoolError>;
