use serde::{Deserialize, Serialize};
use shared_types::{Block, Hash};

/// Canonical chain change produced by inserting a block.
///
/// `removed` holds the blocks that left the canonical chain (highest first),
/// `added` the blocks that joined it (lowest first). A plain extension has an
/// empty `removed`; a side-chain block that did not win leaves both empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainUpdate {
    pub removed: Vec<Block>,
    pub added: Vec<Block>,
}

impl ChainUpdate {
    /// True when the canonical chain changed at all.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// True when canonical blocks were replaced.
    pub fn is_reorg(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Where a mined transaction lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxLocation {
    /// Hash of the containing block
    pub block_hash: Hash,
    /// Number of the containing block
    pub block_number: u64,
    /// Position within the block
    pub index: usize,
}
