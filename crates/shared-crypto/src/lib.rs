//! # Shared Crypto
//!
//! Hash functions and secp256k1 signing used across the runtime.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256, SHA-256, RIPEMD-160 | Addresses, tries, precompiles |
//! | `ecdsa` | secp256k1 | Transaction signing, ecrecover |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S signatures (EIP-2)
//! - **Recovery**: high-S inputs are normalized before public key recovery

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{recover_address, RecoverableSignature, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{keccak256, keccak256_many, ripemd160, sha256, KeccakHasher, KECCAK_EMPTY};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
