use shared_types::{Hash, U256};
use thiserror::Error;

/// Errors raised by the chain store and header validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Block not found: {hash:?}")]
    BlockNotFound { hash: Hash },

    #[error("Unknown parent: {parent_hash:?}")]
    UnknownParent { parent_hash: Hash },

    #[error("Genesis block cannot be removed")]
    GenesisImmutable,

    #[error("Invalid block number: expected {expected}, got {got}")]
    InvalidNumber { expected: u64, got: u64 },

    #[error("Parent hash mismatch: expected {expected:?}, got {got:?}")]
    ParentHashMismatch { expected: Hash, got: Hash },

    #[error("Timestamp not increasing: parent {parent}, got {got}")]
    TimestampNotIncreasing { parent: u64, got: u64 },

    #[error("Gas used exceeds limit: {used} > {limit}")]
    GasUsedExceedsLimit { used: u64, limit: u64 },

    #[error("Gas limit out of bounds: parent {parent}, got {got}")]
    GasLimitOutOfBounds { parent: u64, got: u64 },

    #[error("Base fee mismatch: expected {expected}, got {got}")]
    BaseFeeMismatch { expected: U256, got: U256 },
}

pub type Result<T> = std::result::Result<T, ChainError>;
