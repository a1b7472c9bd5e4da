//! # Hex Quantities
//!
//! Quantities leave the runtime as `0x`-prefixed big-endian hex with no
//! leading zeros (`0` is `"0x0"`). Byte data keeps every byte (`"0x"` for
//! empty). Inputs are accepted with or without the prefix.

use crate::errors::QuantityError;
use crate::primitives::U256;

/// Formats a 256-bit quantity.
pub fn to_quantity(value: U256) -> String {
    format!("0x{value:x}")
}

/// Formats a 64-bit quantity.
pub fn u64_to_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Parses a 256-bit quantity.
pub fn parse_quantity(s: &str) -> Result<U256, QuantityError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Err(QuantityError::InvalidHex(s.to_string()));
    }
    if digits.len() > 64 {
        return Err(QuantityError::Overflow(s.to_string()));
    }
    U256::from_str_radix(digits, 16).map_err(|_| QuantityError::InvalidHex(s.to_string()))
}

/// Parses a 64-bit quantity.
pub fn parse_u64_quantity(s: &str) -> Result<u64, QuantityError> {
    let value = parse_quantity(s)?;
    if value > U256::from(u64::MAX) {
        return Err(QuantityError::Overflow(s.to_string()));
    }
    Ok(value.low_u64())
}

/// Formats byte data.
pub fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Parses byte data. Odd-length input is left-padded with a zero nibble.
pub fn parse_hex_data(s: &str) -> Result<Vec<u8>, QuantityError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let result = if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}"))
    } else {
        hex::decode(digits)
    };
    result.map_err(|e| QuantityError::InvalidHex(e.to_string()))
}

/// Serde adapter for `u64` quantities.
pub mod u64_hex {
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as `0x` quantity.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::u64_to_quantity(*value))
    }

    /// Deserialize from `0x` quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_u64_quantity(&s).map_err(de::Error::custom)
    }
}

/// Serde adapter for byte data.
pub mod bytes_hex {
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as `0x` data.
    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex_data(value))
    }

    /// Deserialize from `0x` data.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hex_data(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_quantity() {
        assert_eq!(to_quantity(U256::zero()), "0x0");
        assert_eq!(u64_to_quantity(0), "0x0");
    }

    #[test]
    fn test_no_leading_zeros() {
        assert_eq!(to_quantity(U256::from(0x0400)), "0x400");
        assert_eq!(u64_to_quantity(255), "0xff");
    }

    #[test]
    fn test_parse_quantity_with_and_without_prefix() {
        assert_eq!(parse_quantity("0x2a").unwrap(), U256::from(42));
        assert_eq!(parse_quantity("2a").unwrap(), U256::from(42));
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_u64_overflow() {
        assert!(parse_u64_quantity("0x10000000000000000").is_err());
        assert_eq!(parse_u64_quantity("0xffffffffffffffff").unwrap(), u64::MAX);
    }

    #[test]
    fn test_hex_data() {
        assert_eq!(to_hex_data(&[]), "0x");
        assert_eq!(to_hex_data(&[0, 1]), "0x0001");
        assert_eq!(parse_hex_data("0x0001").unwrap(), vec![0, 1]);
        assert_eq!(parse_hex_data("0x1").unwrap(), vec![1]);
    }
}
