//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Invalid signature (r or s out of range)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Recovery id is not 0 or 1
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Public key could not be recovered from the signature
    #[error("Signature recovery failed")]
    RecoveryFailed,

    /// Signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}
