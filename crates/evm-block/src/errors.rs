//! # Error Types
//!
//! [`InvalidTransaction`] is a rejection before any state change.
//! [`BlockError`] wraps it together with block-level failures and the
//! backend errors of the crates below.

use evm_chain::ChainError;
use evm_interpreter::EvmError;
use evm_state::StateError;
use shared_types::{Address, Hash, TxError, U256};
use thiserror::Error;

/// Why a transaction cannot be executed in the current block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransaction {
    #[error("Invalid sender: {0}")]
    Sender(#[from] TxError),

    #[error("Gas limit {gas_limit} below intrinsic gas {intrinsic}")]
    IntrinsicGasTooLow { gas_limit: u64, intrinsic: u64 },

    #[error("Max fee per gas {max_fee} below block base fee {base_fee}")]
    FeeCapBelowBaseFee { max_fee: U256, base_fee: U256 },

    #[error("Max priority fee {tip} above max fee {max_fee}")]
    TipAboveFeeCap { tip: U256, max_fee: U256 },

    #[error("Chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch { expected: u64, got: u64 },

    #[error("Sender {0} has deployed code")]
    SenderNotEoa(Address),

    #[error("Nonce too low: account {account}, tx {tx}")]
    NonceTooLow { account: u64, tx: u64 },

    #[error("Nonce too high: account {account}, tx {tx}")]
    NonceTooHigh { account: u64, tx: u64 },

    #[error("Sender nonce at maximum")]
    NonceOverflow,

    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: U256, available: U256 },

    #[error("Max fee per blob gas {max_fee} below blob gas price {blob_gas_price}")]
    BlobFeeCapTooLow { max_fee: U256, blob_gas_price: U256 },

    #[error("Blob transaction without versioned hashes")]
    EmptyBlobs,

    #[error("Transaction type cannot create contracts")]
    CreateNotAllowed,

    #[error("Set-code transaction without authorizations")]
    EmptyAuthorizationList,

    #[error("Init code size {size} exceeds {max}")]
    InitCodeTooLarge { size: usize, max: usize },
}

/// Errors raised by the block pipeline.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] InvalidTransaction),

    #[error("Block gas limit exceeded: tx gas {tx_gas} with {used} used exceeds {limit}")]
    BlockGasLimitExceeded { tx_gas: u64, used: u64, limit: u64 },

    #[error("Blob gas limit exceeded: {used} + {blob_gas} > {limit}")]
    BlobGasLimitExceeded { blob_gas: u64, used: u64, limit: u64 },

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Root mismatch for {field}: header {expected:?}, computed {computed:?}")]
    RootMismatch {
        field: &'static str,
        expected: Hash,
        computed: Hash,
    },

    #[error("Block builder is {0:?}")]
    BuilderClosed(crate::builder::BuildStatus),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("EVM error: {0}")]
    Evm(#[from] EvmError),
}

impl From<TxError> for BlockError {
    fn from(err: TxError) -> Self {
        Self::InvalidTransaction(InvalidTransaction::Sender(err))
    }
}

pub type Result<T> = std::result::Result<T, BlockError>;
