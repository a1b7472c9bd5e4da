//! # RLP
//!
//! Recursive Length Prefix encoding. Encoders return owned buffers and
//! compose by concatenation; `encode_list` wraps items that are already
//! encoded. The decoder borrows from its input and rejects non-canonical
//! length prefixes.

use crate::errors::RlpError;
use crate::primitives::{u256_to_be, Address, Hash, U256};

// =============================================================================
// ENCODING
// =============================================================================

/// RLP-encode a byte slice.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else {
        let mut result = encode_header(0x80, data.len());
        result.extend_from_slice(data);
        result
    }
}

/// RLP-encode an unsigned integer (minimal big-endian, zero is empty).
pub fn encode_u64(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    encode_bytes(strip_leading_zeros(&bytes))
}

/// RLP-encode a 256-bit unsigned integer.
pub fn encode_u256(value: U256) -> Vec<u8> {
    let bytes = u256_to_be(value);
    encode_bytes(strip_leading_zeros(&bytes))
}

/// RLP-encode an address.
pub fn encode_address(address: &Address) -> Vec<u8> {
    encode_bytes(address.as_bytes())
}

/// RLP-encode an optional address (`None` is the empty string).
pub fn encode_optional_address(address: Option<&Address>) -> Vec<u8> {
    match address {
        Some(a) => encode_address(a),
        None => encode_bytes(&[]),
    }
}

/// RLP-encode a hash.
pub fn encode_hash(hash: &Hash) -> Vec<u8> {
    encode_bytes(hash.as_bytes())
}

/// Wrap already-encoded items in a list header.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let total_len: usize = items.iter().map(Vec::len).sum();
    let mut result = encode_header(0xc0, total_len);
    result.reserve(total_len);
    for item in items {
        result.extend_from_slice(item);
    }
    result
}

fn encode_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = encode_length(len);
        let mut result = Vec::with_capacity(1 + len_bytes.len());
        result.push(offset + 55 + len_bytes.len() as u8);
        result.extend_from_slice(&len_bytes);
        result
    }
}

/// Encode a length as minimal big-endian bytes.
fn encode_length(len: usize) -> Vec<u8> {
    strip_leading_zeros(&len.to_be_bytes()).to_vec()
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

// =============================================================================
// DECODING
// =============================================================================

/// A decoded RLP item borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem<'a> {
    /// Byte string payload
    Bytes(&'a [u8]),
    /// List of items
    List(Vec<RlpItem<'a>>),
}

impl<'a> RlpItem<'a> {
    /// Byte string payload.
    pub fn as_bytes(&self) -> Result<&'a [u8], RlpError> {
        match self {
            RlpItem::Bytes(b) => Ok(*b),
            RlpItem::List(_) => Err(RlpError::ExpectedBytes),
        }
    }

    /// List items.
    pub fn as_list(&self) -> Result<&[RlpItem<'a>], RlpError> {
        match self {
            RlpItem::List(items) => Ok(items.as_slice()),
            RlpItem::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }

    /// List items, requiring an exact count.
    pub fn as_fields(&self, expected: usize) -> Result<&[RlpItem<'a>], RlpError> {
        let items = self.as_list()?;
        if items.len() != expected {
            return Err(RlpError::FieldCount {
                expected,
                actual: items.len(),
            });
        }
        Ok(items)
    }

    /// Canonical unsigned integer up to 64 bits.
    pub fn as_u64(&self) -> Result<u64, RlpError> {
        let bytes = self.as_integer_bytes(8)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Canonical unsigned integer up to 256 bits.
    pub fn as_u256(&self) -> Result<U256, RlpError> {
        let bytes = self.as_integer_bytes(32)?;
        Ok(U256::from_big_endian(bytes))
    }

    /// 20-byte address.
    pub fn as_address(&self) -> Result<Address, RlpError> {
        let bytes = self.as_bytes()?;
        Address::from_slice(bytes).ok_or(RlpError::InvalidLength {
            expected: 20,
            actual: bytes.len(),
        })
    }

    /// Address, or `None` for the empty string (contract creation).
    pub fn as_optional_address(&self) -> Result<Option<Address>, RlpError> {
        if self.as_bytes()?.is_empty() {
            Ok(None)
        } else {
            self.as_address().map(Some)
        }
    }

    /// 32-byte hash.
    pub fn as_hash(&self) -> Result<Hash, RlpError> {
        let bytes = self.as_bytes()?;
        Hash::from_slice(bytes).ok_or(RlpError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })
    }

    fn as_integer_bytes(&self, max: usize) -> Result<&'a [u8], RlpError> {
        let bytes = self.as_bytes()?;
        if bytes.len() > max {
            return Err(RlpError::InvalidInteger("too wide"));
        }
        if bytes.first() == Some(&0) {
            return Err(RlpError::InvalidInteger("leading zero"));
        }
        Ok(bytes)
    }
}

/// Decode exactly one item spanning the whole input.
pub fn decode(input: &[u8]) -> Result<RlpItem<'_>, RlpError> {
    let (item, consumed) = decode_item(input)?;
    if consumed != input.len() {
        return Err(RlpError::TrailingBytes(input.len() - consumed));
    }
    Ok(item)
}

/// Deepest list nesting the decoder accepts. Transactions, receipts,
/// headers and trie nodes stay well below it.
pub const MAX_DEPTH: usize = 64;

/// Decode one item from the front of `input`, returning bytes consumed.
pub fn decode_item(input: &[u8]) -> Result<(RlpItem<'_>, usize), RlpError> {
    decode_at(input, 0)
}

fn decode_at(input: &[u8], depth: usize) -> Result<(RlpItem<'_>, usize), RlpError> {
    let prefix = *input.first().ok_or(RlpError::UnexpectedEnd)?;
    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(&input[..1]), 1)),
        0x80..=0xbf => {
            let (offset, len) = payload_bounds(input, 0x80)?;
            let payload = &input[offset..offset + len];
            if len == 1 && offset == 1 && payload[0] < 0x80 {
                return Err(RlpError::NonCanonical);
            }
            Ok((RlpItem::Bytes(payload), offset + len))
        }
        0xc0..=0xff => {
            if depth >= MAX_DEPTH {
                return Err(RlpError::TooDeep(MAX_DEPTH));
            }
            let (offset, len) = payload_bounds(input, 0xc0)?;
            let mut payload = &input[offset..offset + len];
            let mut items = Vec::new();
            while !payload.is_empty() {
                let (item, used) = decode_at(payload, depth + 1)?;
                items.push(item);
                payload = &payload[used..];
            }
            Ok((RlpItem::List(items), offset + len))
        }
    }
}

/// Returns (header length, payload length) after bounds checks.
fn payload_bounds(input: &[u8], base: u8) -> Result<(usize, usize), RlpError> {
    let prefix = input[0];
    let short_max = base + 55;
    let (offset, len) = if prefix <= short_max {
        (1, usize::from(prefix - base))
    } else {
        let len_of_len = usize::from(prefix - short_max);
        let len_bytes = input
            .get(1..1 + len_of_len)
            .ok_or(RlpError::UnexpectedEnd)?;
        if len_bytes[0] == 0 || len_of_len > std::mem::size_of::<usize>() {
            return Err(RlpError::NonCanonical);
        }
        let len = len_bytes
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
        if len < 56 {
            return Err(RlpError::NonCanonical);
        }
        (1 + len_of_len, len)
    };
    let end = offset.checked_add(len).ok_or(RlpError::UnexpectedEnd)?;
    if end > input.len() {
        return Err(RlpError::UnexpectedEnd);
    }
    Ok((offset, len))
}
