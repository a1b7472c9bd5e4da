//! # Memory
//!
//! Byte-addressable, word-aligned, zero-initialised. Growth is paid for
//! before it happens: callers price the new size with
//! [`memory_expansion_cost`] and only then call [`Memory::resize`].

/// Word size in bytes.
pub const WORD_SIZE: usize = 32;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current size in words.
    #[must_use]
    pub fn word_size(&self) -> usize {
        self.data.len() / WORD_SIZE
    }

    /// Grow to cover `end` bytes, rounded up to a whole word.
    pub fn resize(&mut self, end: usize) {
        let size = end.div_ceil(WORD_SIZE) * WORD_SIZE;
        if size > self.data.len() {
            self.data.resize(size, 0);
        }
    }

    /// Read `len` bytes; the range must already be allocated.
    #[must_use]
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    #[must_use]
    pub fn read_word(&self, offset: usize) -> [u8; 32] {
        let mut word = [0u8; 32];
        word.copy_from_slice(self.slice(offset, 32));
        word
    }

    pub fn write_byte(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Write `len` bytes taken from `source[src_offset..]`, zero-filling
    /// past its end.
    pub fn write_padded(&mut self, offset: usize, source: &[u8], src_offset: usize, len: usize) {
        let target = &mut self.data[offset..offset + len];
        let available = source.len().saturating_sub(src_offset).min(len);
        if available > 0 {
            target[..available].copy_from_slice(&source[src_offset..src_offset + available]);
        }
        target[available..].fill(0);
    }

    /// MCOPY (EIP-5656); overlapping ranges behave like memmove.
    pub fn copy_within(&mut self, dest: usize, src: usize, len: usize) {
        self.data.copy_within(src..src + len, dest);
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Total cost of `words` of memory: `3w + w²/512`.
#[must_use]
pub fn memory_gas_cost(words: u64) -> u64 {
    words
        .saturating_mul(3)
        .saturating_add(words.saturating_mul(words) / 512)
}

/// Incremental cost of growing from `old_words` to `new_words`.
#[must_use]
pub fn memory_expansion_cost(old_words: u64, new_words: u64) -> u64 {
    if new_words <= old_words {
        return 0;
    }
    memory_gas_cost(new_words) - memory_gas_cost(old_words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_rounds_to_words() {
        let mut mem = Memory::new();
        mem.resize(10);
        assert_eq!(mem.len(), 32);
        mem.resize(33);
        assert_eq!(mem.len(), 64);
        mem.resize(1);
        assert_eq!(mem.len(), 64);
    }

    #[test]
    fn test_write_padded_zero_fills() {
        let mut mem = Memory::new();
        mem.resize(32);
        mem.write(0, &[0xff; 8]);
        mem.write_padded(0, &[1, 2, 3], 1, 6);
        assert_eq!(mem.slice(0, 8), &[2, 3, 0, 0, 0, 0, 0xff, 0xff]);
    }

    #[test]
    fn test_write_padded_offset_past_source() {
        let mut mem = Memory::new();
        mem.resize(32);
        mem.write(0, &[9; 4]);
        mem.write_padded(0, &[1, 2], 10, 4);
        assert_eq!(mem.slice(0, 4), &[0; 4]);
    }

    #[test]
    fn test_copy_overlapping() {
        let mut mem = Memory::new();
        mem.resize(32);
        mem.write(0, &[1, 2, 3, 4, 5]);
        mem.copy_within(2, 0, 4);
        assert_eq!(mem.slice(0, 6), &[1, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn test_memory_gas_cost() {
        assert_eq!(memory_gas_cost(0), 0);
        assert_eq!(memory_gas_cost(1), 3);
        assert_eq!(memory_gas_cost(32), 98);
        assert_eq!(memory_expansion_cost(1, 1), 0);
        assert_eq!(memory_expansion_cost(1, 2), memory_gas_cost(2) - memory_gas_cost(1));
    }
}
