//! Error types for decoding and transaction handling.

use shared_crypto::CryptoError;
use thiserror::Error;

/// RLP decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RlpError {
    /// Input ended inside an item
    #[error("Unexpected end of input")]
    UnexpectedEnd,

    /// Length prefix not in its shortest form
    #[error("Non-canonical encoding")]
    NonCanonical,

    /// Bytes left over after the top-level item
    #[error("Trailing bytes: {0}")]
    TrailingBytes(usize),

    /// Lists nested deeper than the decoder allows
    #[error("Nesting too deep: more than {0} levels")]
    TooDeep(usize),

    /// A list was found where a string was expected
    #[error("Expected byte string")]
    ExpectedBytes,

    /// A string was found where a list was expected
    #[error("Expected list")]
    ExpectedList,

    /// Integer wider than the target type, or with leading zeros
    #[error("Invalid integer: {0}")]
    InvalidInteger(&'static str),

    /// Fixed-width field has the wrong length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// List has the wrong number of fields
    #[error("Invalid field count: expected {expected}, got {actual}")]
    FieldCount {
        /// Expected number of fields
        expected: usize,
        /// Actual number of fields
        actual: usize,
    },
}

/// Hex quantity / data parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Not valid hex
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Value does not fit the target type
    #[error("Quantity overflow: {0}")]
    Overflow(String),

    /// Fixed-size value has the wrong length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },
}

/// Transaction decoding, signing and recovery failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// Malformed RLP
    #[error("RLP error: {0}")]
    Rlp(#[from] RlpError),

    /// Unknown EIP-2718 type byte
    #[error("Unsupported transaction type: {0:#x}")]
    UnsupportedType(u8),

    /// Transaction carries no signature and no impersonated sender
    #[error("Transaction is not signed")]
    MissingSignature,

    /// Legacy `v` value is not 27/28 or EIP-155 encoded
    #[error("Invalid v value: {0}")]
    InvalidV(u64),

    /// Signature recovery failed
    #[error("Invalid signature: {0}")]
    Crypto(#[from] CryptoError),
}
