//! Outbound ports of the interpreter.

use shared_types::Hash;
use std::collections::HashMap;

/// Ancestor hash lookup for BLOCKHASH. The interpreter enforces the
/// 256-block window; implementations only resolve canonical numbers.
pub trait BlockHashProvider {
    fn block_hash(&self, number: u64) -> Option<Hash>;
}

/// Provider with no history; BLOCKHASH always yields zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBlockHashes;

impl BlockHashProvider for NoBlockHashes {
    fn block_hash(&self, _number: u64) -> Option<Hash> {
        None
    }
}

impl BlockHashProvider for HashMap<u64, Hash> {
    fn block_hash(&self, number: u64) -> Option<Hash> {
        self.get(&number).copied()
    }
}
