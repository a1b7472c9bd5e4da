//! # Hashing
//!
//! Keccak-256 is the workhorse: addresses, trie keys, code hashes and
//! transaction hashes all go through it. SHA-256 and RIPEMD-160 back the
//! `0x02` and `0x03` precompiles.

use ripemd::Ripemd160;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// keccak256 of the empty byte string.
pub const KECCAK_EMPTY: [u8; 32] = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Stateful Keccak-256 hasher.
#[derive(Clone, Default)]
pub struct KeccakHasher {
    inner: Keccak256,
}

impl KeccakHasher {
    /// Create new hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return hash.
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

/// Keccak-256 (one-shot).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Keccak-256 over the concatenation of several inputs.
pub fn keccak256_many(inputs: &[&[u8]]) -> [u8; 32] {
    let mut hasher = KeccakHasher::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize()
}

/// SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// RIPEMD-160 (one-shot).
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}
