//! # Logs Bloom
//!
//! The 2048-bit Ethereum bloom. Each input sets three bits chosen by the
//! first three byte pairs of its keccak256, taken modulo 2048. Bit 0 is the
//! least significant bit of the last byte.

use crate::log::Log;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Bloom size in bytes.
pub const BLOOM_BYTES: usize = 256;

/// 2048-bit logs bloom.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bloom(pub [u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; BLOOM_BYTES])
    }
}

impl Bloom {
    fn positions(input: &[u8]) -> [(usize, u8); 3] {
        let hash = shared_crypto::keccak256(input);
        let mut out = [(0usize, 0u8); 3];
        for (i, slot) in out.iter_mut().enumerate() {
            let bit = ((usize::from(hash[2 * i]) << 8) | usize::from(hash[2 * i + 1])) & 2047;
            *slot = (BLOOM_BYTES - 1 - bit / 8, 1u8 << (bit % 8));
        }
        out
    }

    /// Add an input.
    pub fn accrue(&mut self, input: &[u8]) {
        for (byte, mask) in Self::positions(input) {
            self.0[byte] |= mask;
        }
    }

    /// Add a log's address and each of its topics.
    pub fn accrue_log(&mut self, log: &Log) {
        self.accrue(log.address.as_bytes());
        for topic in &log.topics {
            self.accrue(topic.as_bytes());
        }
    }

    /// Merge another bloom into this one.
    pub fn or(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
    }

    /// Possibly-contains check (no false negatives).
    pub fn contains_input(&self, input: &[u8]) -> bool {
        Self::positions(input)
            .iter()
            .all(|(byte, mask)| self.0[*byte] & mask == *mask)
    }

    /// True when no bit is set.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; BLOOM_BYTES] {
        &self.0
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bloom(0x{})", hex::encode(self.0))
    }
}

impl Serialize for Bloom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::quantity::to_hex_data(&self.0))
    }
}

impl<'de> Deserialize<'de> for Bloom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = crate::quantity::parse_hex_data(&s).map_err(de::Error::custom)?;
        let array: [u8; BLOOM_BYTES] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| de::Error::custom("bloom must be 256 bytes"))?;
        Ok(Self(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Address, Hash};

    #[test]
    fn test_accrue_sets_at_most_three_bits() {
        let mut bloom = Bloom::default();
        bloom.accrue(b"input");
        let bits: u32 = bloom.0.iter().map(|b| b.count_ones()).sum();
        assert!((1..=3).contains(&bits));
    }

    #[test]
    fn test_no_false_negatives() {
        let log = Log {
            address: Address::new([0x11; 20]),
            topics: vec![Hash::new([0x22; 32]), Hash::new([0x33; 32])],
            data: vec![],
        };
        let bloom = log.bloom();
        assert!(bloom.contains_input(log.address.as_bytes()));
        for topic in &log.topics {
            assert!(bloom.contains_input(topic.as_bytes()));
        }
    }

    #[test]
    fn test_or_is_union() {
        let mut a = Bloom::default();
        a.accrue(b"a");
        let mut b = Bloom::default();
        b.accrue(b"b");
        a.or(&b);
        assert!(a.contains_input(b"a"));
        assert!(a.contains_input(b"b"));
    }

    #[test]
    fn test_empty_bloom() {
        assert!(Bloom::default().is_zero());
        assert!(!Bloom::default().contains_input(b"anything"));
    }
}
