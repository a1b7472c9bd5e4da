// =============================================================================
// NIBBLES: Half-byte path representation
// =============================================================================

/// Nibble path for trie traversal.
///
/// Keys are converted to nibbles (half-bytes, 0-15) for traversal. A
/// 32-byte hashed key becomes 64 nibbles.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Nibbles(pub Vec<u8>);

impl Nibbles {
    /// Create nibbles from arbitrary bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        Nibbles(nibbles)
    }

    /// Nibbles from `start` to the end.
    pub fn slice(&self, start: usize) -> Self {
        Nibbles(self.0[start..].to_vec())
    }

    /// Nibbles in `start..end`.
    pub fn slice_range(&self, start: usize, end: usize) -> Self {
        Nibbles(self.0[start..end].to_vec())
    }

    /// Length of the shared prefix with `other`.
    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nibble at `index`.
    pub fn at(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// Hex-prefix encoding (Yellow Paper appendix C).
    ///
    /// The flag nibble is 0/1 for an extension with even/odd length and 2/3
    /// for a leaf. An odd path packs its first nibble next to the flag.
    pub fn encode_hex_prefix(&self, is_leaf: bool) -> Vec<u8> {
        let odd = self.len() % 2 == 1;
        let prefix = if is_leaf { 2 } else { 0 } + u8::from(odd);

        let mut result = Vec::with_capacity(self.len() / 2 + 1);
        let rest = if odd {
            result.push((prefix << 4) | self.0[0]);
            &self.0[1..]
        } else {
            result.push(prefix << 4);
            &self.0[..]
        };
        for chunk in rest.chunks(2) {
            result.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
        }
        result
    }

    /// Decode hex-prefix bytes into (path, is_leaf).
    pub fn decode_hex_prefix(encoded: &[u8]) -> (Self, bool) {
        let Some(first) = encoded.first() else {
            return (Nibbles(vec![]), false);
        };
        let prefix = first >> 4;
        let is_leaf = prefix >= 2;

        let mut nibbles = Vec::with_capacity(encoded.len() * 2);
        if prefix % 2 == 1 {
            nibbles.push(first & 0x0F);
        }
        for &byte in &encoded[1..] {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        (Nibbles(nibbles), is_leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_from_bytes() {
        let nibbles = Nibbles::from_bytes(&[0xAB, 0xCD]);
        assert_eq!(nibbles.0, vec![0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn test_hex_prefix_flags() {
        assert_eq!(Nibbles(vec![1, 2, 3, 4]).encode_hex_prefix(true), vec![0x20, 0x12, 0x34]);
        assert_eq!(Nibbles(vec![1, 2, 3]).encode_hex_prefix(true), vec![0x31, 0x23]);
        assert_eq!(Nibbles(vec![1, 2, 3, 4]).encode_hex_prefix(false), vec![0x00, 0x12, 0x34]);
        assert_eq!(Nibbles(vec![1]).encode_hex_prefix(false), vec![0x11]);
    }

    #[test]
    fn test_hex_prefix_decode() {
        let original = Nibbles(vec![1, 2, 3, 4, 5]);
        let (decoded, is_leaf) = Nibbles::decode_hex_prefix(&original.encode_hex_prefix(true));
        assert!(is_leaf);
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_common_prefix() {
        let a = Nibbles(vec![1, 2, 3]);
        let b = Nibbles(vec![1, 2, 4]);
        assert_eq!(a.common_prefix_len(&b), 2);
    }
}
