//! In-memory block tree with a canonical chain.

use crate::domain::{ChainUpdate, TxLocation};
use crate::errors::{ChainError, Result};
use shared_types::{Block, Hash, Header, Receipt, Transaction};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// How far back BLOCKHASH can see.
pub const BLOCK_HASH_WINDOW: u64 = 256;

/// Block tree plus the canonical chain through it.
///
/// Every stored block descends from genesis. The canonical chain is the path
/// from genesis to `head`; the highest block number wins and ties keep the
/// current head.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: HashMap<Hash, Block>,
    children: HashMap<Hash, Vec<Hash>>,
    canonical: BTreeMap<u64, Hash>,
    head: Hash,
    genesis: Hash,
    receipts: HashMap<Hash, Vec<Receipt>>,
    tx_index: HashMap<Hash, TxLocation>,
}

impl Blockchain {
    /// Chain containing only `genesis`.
    pub fn new(genesis: Block) -> Self {
        let hash = genesis.hash();
        let mut chain = Self {
            blocks: HashMap::new(),
            children: HashMap::new(),
            canonical: BTreeMap::new(),
            head: hash,
            genesis: hash,
            receipts: HashMap::new(),
            tx_index: HashMap::new(),
        };
        chain.canonical.insert(genesis.number(), hash);
        chain.index_transactions(&genesis);
        chain.blocks.insert(hash, genesis);
        chain
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Store `block` and move the head onto it if its chain is heavier.
    ///
    /// Re-inserting a known block is a no-op.
    pub fn put_block(&mut self, block: Block) -> Result<ChainUpdate> {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return Ok(ChainUpdate::default());
        }

        let parent_hash = block.header.parent_hash;
        let parent = self
            .blocks
            .get(&parent_hash)
            .ok_or(ChainError::UnknownParent { parent_hash })?;
        let expected = parent.number() + 1;
        if block.number() != expected {
            return Err(ChainError::InvalidNumber {
                expected,
                got: block.number(),
            });
        }

        let number = block.number();
        self.children.entry(parent_hash).or_default().push(hash);
        self.blocks.insert(hash, block);
        debug!(number, hash = %hash, "block stored");

        if number <= self.head_number() {
            return Ok(ChainUpdate::default());
        }
        let update = self.set_canonical_head(hash)?;
        if update.is_reorg() {
            info!(
                number,
                removed = update.removed.len(),
                added = update.added.len(),
                "chain reorganized"
            );
        }
        Ok(update)
    }

    /// Delete `hash` and all of its descendants.
    ///
    /// If the block was canonical the head falls back to its parent and the
    /// returned update lists the canonical blocks that were dropped.
    pub fn del_block(&mut self, hash: &Hash) -> Result<ChainUpdate> {
        if *hash == self.genesis {
            return Err(ChainError::GenesisImmutable);
        }
        let block = self
            .blocks
            .get(hash)
            .ok_or(ChainError::BlockNotFound { hash: *hash })?;
        let number = block.number();
        let parent_hash = block.header.parent_hash;

        let mut update = ChainUpdate::default();
        if self.canonical.get(&number) == Some(hash) {
            let dropped: Vec<u64> = self.canonical.range(number..).map(|(n, _)| *n).collect();
            for n in dropped.into_iter().rev() {
                if let Some(h) = self.canonical.remove(&n) {
                    if let Some(b) = self.blocks.get(&h) {
                        update.removed.push(b.clone());
                    }
                }
            }
            for removed in &update.removed {
                self.unindex_transactions(removed);
            }
            self.head = parent_hash;
        }

        if let Some(siblings) = self.children.get_mut(&parent_hash) {
            siblings.retain(|h| h != hash);
        }
        let mut stack = vec![*hash];
        while let Some(next) = stack.pop() {
            self.blocks.remove(&next);
            self.receipts.remove(&next);
            if let Some(kids) = self.children.remove(&next) {
                stack.extend(kids);
            }
        }

        debug!(number, hash = %hash, "block deleted");
        Ok(update)
    }

    fn set_canonical_head(&mut self, new_head: Hash) -> Result<ChainUpdate> {
        let mut added = Vec::new();
        let mut cursor = new_head;
        loop {
            let block = self
                .blocks
                .get(&cursor)
                .ok_or(ChainError::BlockNotFound { hash: cursor })?;
            if self.canonical.get(&block.number()) == Some(&cursor) {
                break;
            }
            added.push(block.clone());
            cursor = block.header.parent_hash;
        }
        added.reverse();

        let ancestor = self
            .blocks
            .get(&cursor)
            .map(Block::number)
            .ok_or(ChainError::BlockNotFound { hash: cursor })?;

        let stale: Vec<u64> = self
            .canonical
            .range(ancestor + 1..)
            .map(|(n, _)| *n)
            .collect();
        let mut removed = Vec::with_capacity(stale.len());
        for n in stale.into_iter().rev() {
            if let Some(h) = self.canonical.remove(&n) {
                if let Some(b) = self.blocks.get(&h) {
                    removed.push(b.clone());
                }
            }
        }
        for block in &removed {
            self.unindex_transactions(block);
        }
        for block in &added {
            self.canonical.insert(block.number(), block.hash());
            self.index_transactions(block);
        }
        self.head = new_head;

        Ok(ChainUpdate { removed, added })
    }

    fn index_transactions(&mut self, block: &Block) {
        let block_hash = block.hash();
        for (index, tx) in block.transactions.iter().enumerate() {
            self.tx_index.insert(
                tx.hash(),
                TxLocation {
                    block_hash,
                    block_number: block.number(),
                    index,
                },
            );
        }
    }

    fn unindex_transactions(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.tx_index.remove(&tx.hash());
        }
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// Any stored block, canonical or not.
    pub fn get_block(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.get(hash)
    }

    /// Canonical block at `number`.
    pub fn get_block_by_number(&self, number: u64) -> Option<&Block> {
        self.canonical
            .get(&number)
            .and_then(|hash| self.blocks.get(hash))
    }

    /// Canonical hash at `number`.
    pub fn get_canonical_hash(&self, number: u64) -> Option<Hash> {
        self.canonical.get(&number).copied()
    }

    /// Current head block.
    pub fn canonical_head(&self) -> &Block {
        // The head is always stored: insertion and deletion both keep it valid.
        &self.blocks[&self.head]
    }

    pub fn head_header(&self) -> &Header {
        &self.canonical_head().header
    }

    pub fn head_number(&self) -> u64 {
        self.head_header().number
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis
    }

    /// Hash visible to BLOCKHASH while executing block `current`.
    ///
    /// Only the 256 most recent ancestors are visible.
    pub fn block_hash_for(&self, number: u64, current: u64) -> Option<Hash> {
        if number >= current || current - number > BLOCK_HASH_WINDOW {
            return None;
        }
        self.get_canonical_hash(number)
    }

    /// Number of stored blocks, side chains included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    // =========================================================================
    // RECEIPTS & TRANSACTIONS
    // =========================================================================

    pub fn put_receipts(&mut self, block_hash: Hash, receipts: Vec<Receipt>) {
        self.receipts.insert(block_hash, receipts);
    }

    pub fn get_receipts(&self, block_hash: &Hash) -> Option<&[Receipt]> {
        self.receipts.get(block_hash).map(Vec::as_slice)
    }

    /// Location of a transaction on the canonical chain.
    pub fn get_transaction_location(&self, tx_hash: &Hash) -> Option<TxLocation> {
        self.tx_index.get(tx_hash).copied()
    }

    /// Canonical transaction and where it was mined.
    pub fn get_transaction(&self, tx_hash: &Hash) -> Option<(&Transaction, TxLocation)> {
        let location = self.get_transaction_location(tx_hash)?;
        let tx = self
            .blocks
            .get(&location.block_hash)?
            .transactions
            .get(location.index)?;
        Some((tx, location))
    }
}
