//! # Error Types
//!
//! Two families with different lifetimes:
//!
//! - [`ExceptionError`]: terminal to one frame. Stored in
//!   `ExecResult::exception`, never returned as `Err`.
//! - [`EvmError`]: host failures (state backend). Always propagated.

use evm_state::StateError;
use thiserror::Error;

// =============================================================================
// EXECUTION EXCEPTIONS
// =============================================================================

/// Frame-local execution failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExceptionError {
    #[error("out of gas")]
    OutOfGas,

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    #[error("invalid JUMP")]
    InvalidJump,

    /// Explicit REVERT; gas left over is returned to the caller.
    #[error("revert")]
    Revert,

    #[error("static state change")]
    StaticStateChange,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("max call depth exceeded")]
    CallDepthExceeded,

    #[error("create collision")]
    CreateCollision,

    #[error("code size to deposit exceeds maximum code size")]
    CodeSizeExceeded,

    #[error("initcode exceeds max initcode size")]
    InitCodeSizeExceeded,

    #[error("invalid contract code: starts with 0xEF")]
    InvalidCodePrefix,

    #[error("code store out of gas")]
    CodeStoreOutOfGas,

    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,

    #[error("nonce overflow")]
    NonceOverflow,

    #[error("precompile failed: {0}")]
    PrecompileFailed(String),
}

impl ExceptionError {
    /// Every exception except REVERT burns the frame's remaining gas.
    #[must_use]
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(self, Self::Revert)
    }
}

// =============================================================================
// PRECOMPILE ERRORS
// =============================================================================

/// Failure reported by a precompile handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecompileError {
    #[error("out of gas")]
    OutOfGas,

    #[error("Invalid precompile input: {0}")]
    InvalidInput(String),

    #[error("Precompile error: {0}")]
    Custom(String),
}

impl From<PrecompileError> for ExceptionError {
    fn from(err: PrecompileError) -> Self {
        match err {
            PrecompileError::OutOfGas => Self::OutOfGas,
            other => Self::PrecompileFailed(other.to_string()),
        }
    }
}

// =============================================================================
// HOST ERRORS
// =============================================================================

/// Failure outside the EVM's own semantics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Unwinds the current frame: either a frame-local exception or a host
/// error that must escape every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Exception(ExceptionError),
    Host(EvmError),
}

impl From<ExceptionError> for Interrupt {
    fn from(err: ExceptionError) -> Self {
        Self::Exception(err)
    }
}

impl From<StateError> for Interrupt {
    fn from(err: StateError) -> Self {
        Self::Host(EvmError::State(err))
    }
}

impl From<EvmError> for Interrupt {
    fn from(err: EvmError) -> Self {
        Self::Host(err)
    }
}
