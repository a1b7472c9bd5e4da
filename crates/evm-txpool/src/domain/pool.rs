//! # Transaction Pool
//!
//! Per-sender nonce maps plus a hash index. A sender's entries split into a
//! pending run (contiguous from the tracked on-chain nonce) and a queued
//! tail (everything after the first gap).
//!
//! ```text
//!   tracked nonce = 4
//!   sender A:  [4] [5] [6] . [8] [9]
//!               └─pending─┘  └queued┘
//! ```
//!
//! Block building reads [`TxPool::txs_by_price_and_nonce`], which merges
//! the pending runs by effective tip and breaks ties by arrival sequence.

use super::config::TxPoolConfig;
use super::entities::{
    AddOptions, Handled, PoolEntry, TxPoolContent, TxPoolEvent, TxPoolStats, TxStatus,
};
use super::errors::{Result, TxPoolError};
use crate::adapters::SystemTimeSource;
use crate::ports::{StateProvider, TimeSource};
use shared_types::{Address, Block, Hash, Transaction, U256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Outcome of a successful validation.
struct Admission {
    sender: Address,
    account_nonce: u64,
    evict: Option<Hash>,
}

/// Heap key for the price merge: highest tip first, earliest arrival first.
struct Candidate<'a> {
    tip: U256,
    entry: &'a PoolEntry,
}

impl<'a> Candidate<'a> {
    fn new(entry: &'a PoolEntry, base_fee: U256) -> Self {
        Self {
            tip: entry.tx.effective_priority_fee(base_fee),
            entry,
        }
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tip
            .cmp(&other.tip)
            .then_with(|| other.entry.seq.cmp(&self.entry.seq))
    }
}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

/// The transaction pool.
///
/// Not internally synchronized: the node wraps it in a lock and serializes
/// mutations against reads.
pub struct TxPool {
    config: TxPoolConfig,
    clock: Arc<dyn TimeSource>,
    by_sender: HashMap<Address, BTreeMap<u64, PoolEntry>>,
    by_hash: HashMap<Hash, (Address, u64)>,
    /// On-chain nonce per sender with pooled entries.
    account_nonces: HashMap<Address, u64>,
    handled: HashMap<Hash, Handled>,
    next_seq: u64,
    events: broadcast::Sender<TxPoolEvent>,
    closed: bool,
}

impl fmt::Debug for TxPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxPool")
            .field("config", &self.config)
            .field("pooled", &self.by_hash.len())
            .field("handled", &self.handled.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl TxPool {
    pub fn new(config: TxPoolConfig, clock: Arc<dyn TimeSource>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            clock,
            by_sender: HashMap::new(),
            by_hash: HashMap::new(),
            account_nonces: HashMap::new(),
            handled: HashMap::new(),
            next_seq: 0,
            events,
            closed: false,
        }
    }

    /// Pool with default limits and the system clock.
    pub fn with_defaults() -> Self {
        Self::new(TxPoolConfig::default(), Arc::new(SystemTimeSource))
    }

    pub fn config(&self) -> &TxPoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Receive [`TxPoolEvent`]s from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TxPoolEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    /// Add a local transaction.
    pub fn add(&mut self, tx: Transaction, state: &dyn StateProvider) -> Result<Hash> {
        self.add_with(tx, state, AddOptions::local())
    }

    /// Validate and pool `tx`, replacing a same-nonce entry from the same
    /// sender when the fee bump suffices.
    pub fn add_with(
        &mut self,
        tx: Transaction,
        state: &dyn StateProvider,
        options: AddOptions,
    ) -> Result<Hash> {
        if self.closed {
            return Err(TxPoolError::Closed);
        }
        let hash = tx.hash();
        match self.validate(&tx, hash, state, options) {
            Ok(admission) => {
                self.admit(tx, hash, admission);
                Ok(hash)
            }
            Err(err) => {
                debug!(hash = %hash, error = %err, "tx rejected");
                if let Ok(sender) = tx.sender() {
                    let added_at = self.clock.now();
                    self.handled.entry(hash).or_insert(Handled {
                        sender,
                        added_at,
                        seq: 0,
                        error: Some(err.to_string()),
                    });
                }
                Err(err)
            }
        }
    }

    fn validate(
        &self,
        tx: &Transaction,
        hash: Hash,
        state: &dyn StateProvider,
        options: AddOptions,
    ) -> Result<Admission> {
        if options.require_signature && !tx.is_signed() && tx.impersonated_sender.is_none() {
            return Err(TxPoolError::NotSigned);
        }
        let sender = tx.sender()?;

        if tx.data.len() > self.config.max_data_size {
            return Err(TxPoolError::DataTooLarge {
                size: tx.data.len(),
                max: self.config.max_data_size,
            });
        }

        let pooled = self.by_sender.get(&sender);
        let existing = pooled.and_then(|entries| entries.get(&tx.nonce));
        let tip = tx.tip();
        let max_fee = tx.max_fee();

        let mut evict = None;
        if !options.local {
            if existing.is_none() && self.len() >= self.config.max_pool_size {
                let victim = self
                    .eviction_candidate(tip)
                    .ok_or(TxPoolError::PoolFull {
                        capacity: self.config.max_pool_size,
                    })?;
                evict = Some(victim);
            }
            if tip < self.config.min_gas_price {
                return Err(TxPoolError::Underpriced {
                    tip,
                    minimum: self.config.min_gas_price,
                });
            }
            let count = pooled.map_or(0, BTreeMap::len);
            if count >= self.config.max_per_sender {
                return Err(TxPoolError::SenderLimit { sender, count });
            }
        }

        if self.by_hash.contains_key(&hash) {
            return Err(TxPoolError::AlreadyKnown(hash));
        }
        if let Some(existing) = existing {
            self.check_replacement(&existing.tx, tx)?;
        }

        let head = state.head()?;
        if !options.local && !head.base_fee.is_zero() && max_fee < head.base_fee / 2 {
            return Err(TxPoolError::FeeCapTooLow {
                max_fee,
                base_fee: head.base_fee,
            });
        }
        if tx.gas_limit > head.gas_limit {
            return Err(TxPoolError::GasLimitExceeded {
                gas_limit: tx.gas_limit,
                block_gas_limit: head.gas_limit,
            });
        }

        let account_nonce = state.nonce(&sender)?;
        if tx.nonce < account_nonce {
            return Err(TxPoolError::NonceTooLow {
                account: account_nonce,
                got: tx.nonce,
            });
        }

        if !options.skip_balance {
            let need = tx
                .value
                .saturating_add(max_fee.saturating_mul(U256::from(tx.gas_limit)));
            let have = state.balance(&sender)?;
            if have < need {
                return Err(TxPoolError::InsufficientBalance { need, have });
            }
        }

        Ok(Admission {
            sender,
            account_nonce,
            evict,
        })
    }

    fn check_replacement(&self, existing: &Transaction, incoming: &Transaction) -> Result<()> {
        let min_tip = self.config.bumped(existing.tip());
        let min_max_fee = self.config.bumped(existing.max_fee());
        if incoming.tip() < min_tip || incoming.max_fee() < min_max_fee {
            return Err(TxPoolError::ReplacementUnderpriced {
                tip: incoming.tip(),
                min_tip,
                max_fee: incoming.max_fee(),
                min_max_fee,
            });
        }
        if existing.tx_type == shared_types::TxType::Blob
            && incoming.tx_type == shared_types::TxType::Blob
        {
            let min = self.config.bumped(existing.max_fee_per_blob_gas);
            if incoming.max_fee_per_blob_gas < min {
                return Err(TxPoolError::ReplacementBlobUnderpriced {
                    got: incoming.max_fee_per_blob_gas,
                    min,
                });
            }
        }
        Ok(())
    }

    /// Cheapest queued entry with a tip below `tip`.
    fn eviction_candidate(&self, tip: U256) -> Option<Hash> {
        self.by_sender
            .iter()
            .flat_map(|(sender, entries)| {
                let run: HashSet<Hash> = self
                    .pending_run(sender, entries)
                    .iter()
                    .map(|e| e.hash)
                    .collect();
                entries.values().filter(move |e| !run.contains(&e.hash))
            })
            .filter(|entry| entry.tx.tip() < tip)
            .min_by(|a, b| a.tx.tip().cmp(&b.tx.tip()).then(b.seq.cmp(&a.seq)))
            .map(|entry| entry.hash)
    }

    fn admit(&mut self, tx: Transaction, hash: Hash, admission: Admission) {
        let Admission {
            sender,
            account_nonce,
            evict,
        } = admission;

        if let Some(victim) = evict {
            self.drop_entry(&victim, "evicted");
            debug!(hash = %victim, "tx evicted");
        }
        let replaced = self
            .by_sender
            .get(&sender)
            .and_then(|entries| entries.get(&tx.nonce))
            .map(|entry| entry.hash);
        if let Some(old) = replaced {
            self.drop_entry(&old, "replaced");
            debug!(old = %old, new = %hash, "tx replaced");
        }

        let seq = self.bump_seq();
        let added_at = self.clock.now();
        let nonce = tx.nonce;
        self.account_nonces.insert(sender, account_nonce);
        self.insert_entry(PoolEntry {
            tx,
            hash,
            sender,
            added_at,
            seq,
        });
        self.handled.insert(
            hash,
            Handled {
                sender,
                added_at,
                seq,
                error: None,
            },
        );
        self.prune_stale(&sender);
        debug!(sender = %sender, nonce, hash = %hash, "tx added");
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn insert_entry(&mut self, entry: PoolEntry) {
        let hash = entry.hash;
        self.by_hash.insert(hash, (entry.sender, entry.tx.nonce));
        self.by_sender
            .entry(entry.sender)
            .or_default()
            .insert(entry.tx.nonce, entry);
        let _ = self.events.send(TxPoolEvent::Added(hash));
    }

    fn remove_entry(&mut self, hash: &Hash) -> Option<PoolEntry> {
        let (sender, nonce) = self.by_hash.remove(hash)?;
        let entries = self.by_sender.get_mut(&sender)?;
        let entry = entries.remove(&nonce);
        if entries.is_empty() {
            self.by_sender.remove(&sender);
            self.account_nonces.remove(&sender);
        }
        let _ = self.events.send(TxPoolEvent::Removed(*hash));
        entry
    }

    /// Remove `hash` and remember why it left.
    fn drop_entry(&mut self, hash: &Hash, reason: &str) -> Option<PoolEntry> {
        let entry = self.remove_entry(hash)?;
        if let Some(handled) = self.handled.get_mut(hash) {
            handled.error = Some(reason.to_string());
        }
        Some(entry)
    }

    /// Drop entries below the sender's tracked nonce; they can never run.
    fn prune_stale(&mut self, sender: &Address) {
        let tracked = self.tracked_nonce(sender);
        let stale: Vec<Hash> = self
            .by_sender
            .get(sender)
            .map(|entries| entries.range(..tracked).map(|(_, e)| e.hash).collect())
            .unwrap_or_default();
        for hash in stale {
            self.drop_entry(&hash, "nonce too low");
        }
    }

    fn tracked_nonce(&self, sender: &Address) -> u64 {
        self.account_nonces.get(sender).copied().unwrap_or(0)
    }

    // =========================================================================
    // CLASSIFICATION
    // =========================================================================

    /// Entries contiguous from the sender's tracked nonce.
    fn pending_run<'a>(
        &self,
        sender: &Address,
        entries: &'a BTreeMap<u64, PoolEntry>,
    ) -> Vec<&'a PoolEntry> {
        let mut expected = self.tracked_nonce(sender);
        entries
            .range(expected..)
            .map(|(_, entry)| entry)
            .take_while(|entry| {
                let contiguous = entry.tx.nonce == expected;
                expected += 1;
                contiguous
            })
            .collect()
    }

    /// Executable transactions per sender, in nonce order.
    pub fn pending(&self) -> BTreeMap<Address, Vec<Transaction>> {
        self.content().pending
    }

    /// Gapped transactions per sender, in nonce order.
    pub fn queued(&self) -> BTreeMap<Address, Vec<Transaction>> {
        self.content().queued
    }

    pub fn content(&self) -> TxPoolContent {
        let mut content = TxPoolContent::default();
        for (sender, entries) in &self.by_sender {
            let run = self.pending_run(sender, entries);
            let run_hashes: HashSet<Hash> = run.iter().map(|e| e.hash).collect();
            if !run.is_empty() {
                content
                    .pending
                    .insert(*sender, run.iter().map(|e| e.tx.clone()).collect());
            }
            let queued: Vec<Transaction> = entries
                .values()
                .filter(|e| !run_hashes.contains(&e.hash))
                .map(|e| e.tx.clone())
                .collect();
            if !queued.is_empty() {
                content.queued.insert(*sender, queued);
            }
        }
        content
    }

    pub fn pending_count(&self) -> usize {
        self.by_sender
            .iter()
            .map(|(sender, entries)| self.pending_run(sender, entries).len())
            .sum()
    }

    pub fn queued_count(&self) -> usize {
        self.len() - self.pending_count()
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Executable transactions ordered for inclusion at `base_fee`.
    ///
    /// Each sender contributes its pending run, cut at the first transaction
    /// whose fee cap is below `base_fee`. Runs are merged by effective tip,
    /// then arrival order, so a sender's nonces stay ascending. Once a blob
    /// transaction no longer fits `allowed_blobs`, the rest of that sender's
    /// run is skipped.
    pub fn txs_by_price_and_nonce(
        &self,
        base_fee: U256,
        allowed_blobs: Option<usize>,
    ) -> Vec<Transaction> {
        let mut heap = BinaryHeap::new();
        let mut runs = HashMap::new();
        for (sender, entries) in &self.by_sender {
            let mut run = self.pending_run(sender, entries);
            if !base_fee.is_zero() {
                if let Some(cut) = run.iter().position(|e| e.tx.max_fee() < base_fee) {
                    run.truncate(cut);
                }
            }
            let mut rest = run.into_iter();
            if let Some(first) = rest.next() {
                heap.push(Candidate::new(first, base_fee));
                runs.insert(*sender, rest);
            }
        }

        let mut selected = Vec::new();
        let mut blobs = 0usize;
        while let Some(best) = heap.pop() {
            let sender = best.entry.sender;
            let blob_count = best.entry.tx.blob_versioned_hashes.len();
            let fits = blob_count == 0
                || allowed_blobs.map_or(true, |allowed| blobs + blob_count <= allowed);
            if !fits {
                runs.remove(&sender);
                continue;
            }
            blobs += blob_count;
            selected.push(best.entry.tx.clone());
            if let Some(next) = runs.get_mut(&sender).and_then(Iterator::next) {
                heap.push(Candidate::new(next, base_fee));
            }
        }
        selected
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    fn entry(&self, hash: &Hash) -> Option<&PoolEntry> {
        let (sender, nonce) = self.by_hash.get(hash)?;
        self.by_sender.get(sender)?.get(nonce)
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Option<&Transaction> {
        self.entry(hash).map(|e| &e.tx)
    }

    /// Pooled transactions among `hashes`, skipping unknown ones.
    pub fn get_by_hashes(&self, hashes: &[Hash]) -> Vec<&Transaction> {
        hashes.iter().filter_map(|h| self.get_by_hash(h)).collect()
    }

    /// Entries from `sender` in nonce order.
    pub fn get_by_sender(&self, sender: &Address) -> Vec<&PoolEntry> {
        self.by_sender
            .get(sender)
            .map(|entries| entries.values().collect())
            .unwrap_or_default()
    }

    /// Every pooled transaction, pending and queued.
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.by_sender
            .values()
            .flat_map(|entries| entries.values().map(|e| e.tx.clone()))
            .collect()
    }

    pub fn get_transaction_status(&self, hash: &Hash) -> TxStatus {
        if self.by_hash.contains_key(hash) {
            return TxStatus::Pending;
        }
        match self.handled.get(hash) {
            Some(handled) if handled.error.is_none() => TxStatus::Mined,
            _ => TxStatus::Unknown,
        }
    }

    // =========================================================================
    // REMOVAL & CHAIN EVENTS
    // =========================================================================

    pub fn remove_by_hash(&mut self, hash: &Hash) -> Option<Transaction> {
        self.remove_entry(hash).map(|e| e.tx)
    }

    /// Forget transactions mined in `blocks` and advance their senders'
    /// tracked nonces.
    pub fn remove_new_block_txs(&mut self, blocks: &[Block]) {
        let mut removed = 0usize;
        for block in blocks {
            for tx in &block.transactions {
                let hash = tx.hash();
                let sender = match self.remove_entry(&hash) {
                    Some(entry) => {
                        removed += 1;
                        Some(entry.sender)
                    }
                    None => tx.sender().ok(),
                };
                if let Some(handled) = self.handled.get_mut(&hash) {
                    handled.error = None;
                }
                if let Some(sender) = sender {
                    if self.by_sender.contains_key(&sender) {
                        let tracked = self.account_nonces.entry(sender).or_insert(0);
                        *tracked = (*tracked).max(tx.nonce + 1);
                        self.prune_stale(&sender);
                    }
                }
            }
        }
        if removed > 0 {
            debug!(removed, blocks = blocks.len(), "mined txs removed");
        }
    }

    pub fn on_block_added(&mut self, block: &Block) {
        self.remove_new_block_txs(std::slice::from_ref(block));
    }

    /// Re-queue transactions from `removed` blocks and drop those mined in
    /// `added` blocks.
    ///
    /// Re-queued transactions skip validation and keep the arrival sequence
    /// recorded when they were first pooled. A transaction whose sender
    /// already has a pooled entry at the same nonce is dropped.
    pub fn on_chain_reorganization(&mut self, removed: &[Block], added: &[Block]) {
        let incoming: HashSet<Hash> = added
            .iter()
            .flat_map(|b| b.transactions.iter().map(Transaction::hash))
            .collect();

        let mut requeued = 0usize;
        for block in removed {
            for tx in &block.transactions {
                let hash = tx.hash();
                if self.by_hash.contains_key(&hash) || incoming.contains(&hash) {
                    continue;
                }
                let sender = match tx.sender() {
                    Ok(sender) => sender,
                    Err(err) => {
                        warn!(hash = %hash, error = %err, "cannot re-queue tx");
                        continue;
                    }
                };
                let conflict = self
                    .by_sender
                    .get(&sender)
                    .is_some_and(|entries| entries.contains_key(&tx.nonce));
                if conflict {
                    debug!(hash = %hash, nonce = tx.nonce, "re-queue nonce conflict");
                    continue;
                }

                let seq = match self.handled.get(&hash) {
                    Some(handled) if handled.error.is_none() => handled.seq,
                    _ => self.bump_seq(),
                };
                let added_at = self.clock.now();
                let tracked = self.account_nonces.entry(sender).or_insert(tx.nonce);
                *tracked = (*tracked).min(tx.nonce);
                self.insert_entry(PoolEntry {
                    tx: tx.clone(),
                    hash,
                    sender,
                    added_at,
                    seq,
                });
                self.handled.insert(
                    hash,
                    Handled {
                        sender,
                        added_at,
                        seq,
                        error: None,
                    },
                );
                requeued += 1;
            }
        }

        self.remove_new_block_txs(added);
        info!(
            requeued,
            removed_blocks = removed.len(),
            added_blocks = added.len(),
            "pool reorganized"
        );
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Expire pooled entries past the pool TTL and forget handled hashes
    /// past the handled TTL. Returns the number of expired entries.
    pub fn cleanup(&mut self) -> usize {
        let now = self.clock.now();
        let pool_cutoff = now.saturating_sub(self.config.pool_ttl_ms);
        let expired: Vec<Hash> = self
            .by_sender
            .values()
            .flat_map(|entries| entries.values())
            .filter(|e| e.added_at < pool_cutoff)
            .map(|e| e.hash)
            .collect();
        for hash in &expired {
            self.drop_entry(hash, "expired");
        }

        let handled_cutoff = now.saturating_sub(self.config.handled_ttl_ms);
        let by_hash = &self.by_hash;
        self.handled
            .retain(|hash, h| h.added_at >= handled_cutoff || by_hash.contains_key(hash));

        if !expired.is_empty() {
            debug!(expired = expired.len(), "pool cleanup");
        }
        expired.len()
    }

    /// Drop every pooled transaction. Handled hashes are kept.
    pub fn clear(&mut self) {
        self.by_sender.clear();
        self.by_hash.clear();
        self.account_nonces.clear();
    }

    /// Drop everything and refuse further additions until [`TxPool::open`].
    pub fn close(&mut self) {
        self.clear();
        self.handled.clear();
        self.closed = true;
    }

    /// Reopen a closed pool. Returns false if it was already open.
    pub fn open(&mut self) -> bool {
        std::mem::replace(&mut self.closed, false)
    }

    pub fn stats(&self) -> TxPoolStats {
        let successful = self.handled.values().filter(|h| h.error.is_none()).count();
        let pending = self.pending_count();
        TxPoolStats {
            pending,
            queued: self.len() - pending,
            handled: self.handled.len(),
            successful,
            errors: self.handled.len() - successful,
            senders: self.by_sender.len(),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            pending = stats.pending,
            queued = stats.queued,
            handled = stats.handled,
            successful = stats.successful,
            errors = stats.errors,
            senders = stats.senders,
            "txpool stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStateProvider, ManualClock};
    use shared_types::TxType;

    const GWEI: u64 = 1_000_000_000;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn tx(from: u64, nonce: u64, tip: u64) -> Transaction {
        Transaction {
            tx_type: TxType::DynamicFee,
            chain_id: Some(900),
            nonce,
            max_priority_fee_per_gas: U256::from(tip),
            max_fee_per_gas: U256::from(tip + 2 * GWEI),
            gas_limit: 21_000,
            to: Some(addr(0xdead)),
            ..Default::default()
        }
        .impersonated(addr(from))
    }

    fn rich(senders: &[u64]) -> InMemoryStateProvider {
        senders.iter().fold(InMemoryStateProvider::new(), |state, s| {
            state.with_account(addr(*s), 0, U256::from(10u64).pow(U256::from(20)))
        })
    }

    fn pool() -> TxPool {
        TxPool::new(TxPoolConfig::default(), Arc::new(ManualClock::new(1_000_000)))
    }

    fn nonces(txs: &[Transaction]) -> Vec<u64> {
        txs.iter().map(|t| t.nonce).collect()
    }

    fn block_with(txs: Vec<Transaction>) -> Block {
        Block {
            transactions: txs,
            ..Default::default()
        }
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    #[test]
    fn test_add_local_tx_becomes_pending() {
        let mut pool = pool();
        let state = rich(&[1]);
        let hash = pool.add(tx(1, 0, GWEI), &state).unwrap();

        assert!(pool.contains(&hash));
        assert_eq!(pool.pending_count(), 1);
        assert_eq!(pool.get_transaction_status(&hash), TxStatus::Pending);
    }

    #[test]
    fn test_gap_fill_promotes_queued() {
        let mut pool = pool();
        let mut state = rich(&[1]);
        state.set_nonce(addr(1), 4);

        pool.add(tx(1, 4, GWEI), &state).unwrap();
        pool.add(tx(1, 6, GWEI), &state).unwrap();
        assert_eq!(pool.pending_count(), 1);
        assert_eq!(nonces(&pool.queued()[&addr(1)]), vec![6]);

        pool.add(tx(1, 5, GWEI), &state).unwrap();
        assert_eq!(pool.queued_count(), 0);
        assert_eq!(nonces(&pool.pending()[&addr(1)]), vec![4, 5, 6]);
        assert_eq!(
            nonces(&pool.txs_by_price_and_nonce(U256::from(GWEI), None)),
            vec![4, 5, 6]
        );
    }

    #[test]
    fn test_unsigned_tx_rejected() {
        let mut pool = pool();
        let mut unsigned = tx(1, 0, GWEI);
        unsigned.impersonated_sender = None;
        assert_eq!(
            pool.add(unsigned, &rich(&[1])),
            Err(TxPoolError::NotSigned)
        );
    }

    #[test]
    fn test_signed_tx_pooled_under_recovered_sender() {
        let key = shared_crypto::Secp256k1KeyPair::from_bytes([9; 32]).unwrap();
        let sender = Address(key.address());
        let mut signed = tx(1, 0, GWEI);
        signed.impersonated_sender = None;
        let signed = signed.sign(&key).unwrap();

        let mut pool = pool();
        let state = InMemoryStateProvider::new().with_account(
            sender,
            0,
            U256::from(10u64).pow(U256::from(20)),
        );
        let hash = pool.add(signed, &state).unwrap();

        assert_eq!(pool.get_by_sender(&sender).len(), 1);
        assert_eq!(pool.get_by_hash(&hash).unwrap().sender().unwrap(), sender);
        assert!(pool.get_by_sender(&addr(1)).is_empty());
    }

    #[test]
    fn test_oversized_data_rejected() {
        let mut pool = pool();
        let mut big = tx(1, 0, GWEI);
        big.data = vec![0; 128 * 1024 + 1];
        assert!(matches!(
            pool.add(big, &rich(&[1])),
            Err(TxPoolError::DataTooLarge { .. })
        ));
    }

    #[test]
    fn test_remote_tip_floor_and_local_exemption() {
        let mut pool = pool();
        let state = rich(&[1]);
        let cheap = tx(1, 0, 1);
        assert!(matches!(
            pool.add_with(cheap.clone(), &state, AddOptions::remote()),
            Err(TxPoolError::Underpriced { .. })
        ));
        assert!(pool.add(cheap, &state).is_ok());
    }

    #[test]
    fn test_remote_sender_limit() {
        let config = TxPoolConfig {
            max_per_sender: 2,
            ..Default::default()
        };
        let mut pool = TxPool::new(config, Arc::new(ManualClock::new(0)));
        let state = rich(&[1]);
        for nonce in 0..2 {
            pool.add_with(tx(1, nonce, GWEI), &state, AddOptions::remote())
                .unwrap();
        }
        assert!(matches!(
            pool.add_with(tx(1, 2, GWEI), &state, AddOptions::remote()),
            Err(TxPoolError::SenderLimit { count: 2, .. })
        ));
        assert!(pool.add(tx(1, 2, GWEI), &state).is_ok());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut pool = pool();
        let state = rich(&[1]);
        let hash = pool.add(tx(1, 0, GWEI), &state).unwrap();
        assert_eq!(
            pool.add(tx(1, 0, GWEI), &state),
            Err(TxPoolError::AlreadyKnown(hash))
        );
        assert_eq!(pool.get_transaction_status(&hash), TxStatus::Pending);
    }

    #[test]
    fn test_fee_cap_below_half_base_fee_rejected_for_remote() {
        let mut pool = pool();
        let state = rich(&[1]).with_head(U256::from(10 * GWEI), 30_000_000);
        let mut low = tx(1, 0, GWEI);
        low.max_fee_per_gas = U256::from(4 * GWEI);
        assert!(matches!(
            pool.add_with(low.clone(), &state, AddOptions::remote()),
            Err(TxPoolError::FeeCapTooLow { .. })
        ));
        assert!(pool.add(low, &state).is_ok());
    }

    #[test]
    fn test_gas_limit_above_block_rejected() {
        let mut pool = pool();
        let mut heavy = tx(1, 0, GWEI);
        heavy.gas_limit = 30_000_001;
        assert!(matches!(
            pool.add(heavy, &rich(&[1])),
            Err(TxPoolError::GasLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_nonce_below_account_rejected() {
        let mut pool = pool();
        let mut state = rich(&[1]);
        state.set_nonce(addr(1), 3);
        assert_eq!(
            pool.add(tx(1, 2, GWEI), &state),
            Err(TxPoolError::NonceTooLow { account: 3, got: 2 })
        );
    }

    #[test]
    fn test_insufficient_balance_and_skip() {
        let mut pool = pool();
        let state = InMemoryStateProvider::new().with_account(addr(1), 0, U256::from(1000));
        assert!(matches!(
            pool.add(tx(1, 0, GWEI), &state),
            Err(TxPoolError::InsufficientBalance { .. })
        ));
        let options = AddOptions {
            skip_balance: true,
            ..AddOptions::local()
        };
        assert!(pool.add_with(tx(1, 0, GWEI), &state, options).is_ok());
    }

    #[test]
    fn test_rejection_is_recorded_as_error() {
        let mut pool = pool();
        let mut state = rich(&[1]);
        state.set_nonce(addr(1), 3);
        let stale = tx(1, 0, GWEI);
        let hash = stale.hash();
        assert!(pool.add(stale, &state).is_err());
        assert_eq!(pool.get_transaction_status(&hash), TxStatus::Unknown);
        assert_eq!(pool.stats().errors, 1);
    }

    #[test]
    fn test_closed_pool_rejects() {
        let mut pool = pool();
        pool.close();
        assert_eq!(
            pool.add(tx(1, 0, GWEI), &rich(&[1])),
            Err(TxPoolError::Closed)
        );
        assert!(pool.open());
        assert!(pool.add(tx(1, 0, GWEI), &rich(&[1])).is_ok());
    }

    // =========================================================================
    // REPLACEMENT
    // =========================================================================

    #[test]
    fn test_replacement_needs_ten_percent_on_both_fees() {
        let mut pool = pool();
        let state = rich(&[1]);
        let first = pool.add(tx(1, 0, 10 * GWEI), &state).unwrap();

        let mut weak = tx(1, 0, 10 * GWEI);
        weak.max_priority_fee_per_gas = U256::from(11 * GWEI - 1);
        weak.max_fee_per_gas = U256::from(20 * GWEI);
        assert!(matches!(
            pool.add(weak, &state),
            Err(TxPoolError::ReplacementUnderpriced { .. })
        ));

        let mut strong = tx(1, 0, 11 * GWEI);
        strong.max_fee_per_gas = U256::from(14 * GWEI);
        let second = pool.add(strong, &state).unwrap();

        assert_eq!(pool.len(), 1);
        assert!(!pool.contains(&first));
        assert!(pool.contains(&second));
        assert_eq!(pool.get_transaction_status(&first), TxStatus::Unknown);
    }

    #[test]
    fn test_blob_replacement_needs_blob_fee_bump() {
        let mut pool = pool();
        let state = rich(&[1]);
        let blob = |tip: u64, blob_fee: u64| {
            let mut t = tx(1, 0, tip);
            t.tx_type = TxType::Blob;
            t.blob_versioned_hashes = vec![Hash::ZERO];
            t.max_fee_per_blob_gas = U256::from(blob_fee);
            t
        };
        pool.add(blob(GWEI, 100), &state).unwrap();
        assert!(matches!(
            pool.add(blob(2 * GWEI, 105), &state),
            Err(TxPoolError::ReplacementBlobUnderpriced { .. })
        ));
        assert!(pool.add(blob(2 * GWEI, 110), &state).is_ok());
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    #[test]
    fn test_selection_orders_by_tip_then_arrival() {
        let mut pool = pool();
        let state = rich(&[1, 2, 3]);
        pool.add(tx(1, 0, GWEI), &state).unwrap();
        pool.add(tx(2, 0, 3 * GWEI), &state).unwrap();
        pool.add(tx(3, 0, GWEI), &state).unwrap();

        let senders: Vec<Address> = pool
            .txs_by_price_and_nonce(U256::from(GWEI), None)
            .iter()
            .map(|t| t.sender().unwrap())
            .collect();
        assert_eq!(senders, vec![addr(2), addr(1), addr(3)]);
    }

    #[test]
    fn test_selection_keeps_nonce_order_under_rising_tips() {
        let mut pool = pool();
        let state = rich(&[1, 2]);
        pool.add(tx(1, 0, GWEI), &state).unwrap();
        pool.add(tx(1, 1, 9 * GWEI), &state).unwrap();
        pool.add(tx(2, 0, 5 * GWEI), &state).unwrap();

        let picked = pool.txs_by_price_and_nonce(U256::from(GWEI), None);
        let order: Vec<(Address, u64)> = picked
            .iter()
            .map(|t| (t.sender().unwrap(), t.nonce))
            .collect();
        assert_eq!(order, vec![(addr(2), 0), (addr(1), 0), (addr(1), 1)]);
    }

    #[test]
    fn test_selection_cuts_run_below_base_fee() {
        let mut pool = pool();
        let state = rich(&[1]);
        pool.add(tx(1, 0, GWEI), &state).unwrap();
        let mut poor = tx(1, 1, GWEI);
        poor.max_fee_per_gas = U256::from(GWEI);
        pool.add(poor, &state).unwrap();
        pool.add(tx(1, 2, GWEI), &state).unwrap();

        let picked = pool.txs_by_price_and_nonce(U256::from(2 * GWEI), None);
        assert_eq!(nonces(&picked), vec![0]);
    }

    #[test]
    fn test_selection_skips_queued() {
        let mut pool = pool();
        let state = rich(&[1]);
        pool.add(tx(1, 1, GWEI), &state).unwrap();
        assert!(pool
            .txs_by_price_and_nonce(U256::from(GWEI), None)
            .is_empty());
    }

    #[test]
    fn test_selection_respects_blob_allowance() {
        let mut pool = pool();
        let state = rich(&[1, 2]);
        let mut blob = tx(1, 0, 5 * GWEI);
        blob.tx_type = TxType::Blob;
        blob.blob_versioned_hashes = vec![Hash::ZERO; 3];
        pool.add(blob, &state).unwrap();
        pool.add(tx(1, 1, 5 * GWEI), &state).unwrap();
        pool.add(tx(2, 0, GWEI), &state).unwrap();

        let picked = pool.txs_by_price_and_nonce(U256::from(GWEI), Some(2));
        let senders: Vec<Address> = picked.iter().map(|t| t.sender().unwrap()).collect();
        assert_eq!(senders, vec![addr(2)]);

        let all = pool.txs_by_price_and_nonce(U256::from(GWEI), Some(6));
        assert_eq!(all.len(), 3);
    }

    // =========================================================================
    // CHAIN EVENTS
    // =========================================================================

    #[test]
    fn test_mined_txs_removed_and_status_mined() {
        let mut pool = pool();
        let state = rich(&[1]);
        let t0 = tx(1, 0, GWEI);
        let h0 = pool.add(t0.clone(), &state).unwrap();
        pool.add(tx(1, 1, GWEI), &state).unwrap();

        pool.on_block_added(&block_with(vec![t0]));
        assert!(!pool.contains(&h0));
        assert_eq!(pool.get_transaction_status(&h0), TxStatus::Mined);
        assert_eq!(nonces(&pool.pending()[&addr(1)]), vec![1]);
    }

    #[test]
    fn test_block_from_elsewhere_prunes_stale_nonces() {
        let mut pool = pool();
        let state = rich(&[1]);
        let stale = pool.add(tx(1, 0, GWEI), &state).unwrap();
        pool.add(tx(1, 1, GWEI), &state).unwrap();

        let mut rival = tx(1, 0, 7 * GWEI);
        rival.value = U256::from(1);
        pool.on_block_added(&block_with(vec![rival]));

        assert!(!pool.contains(&stale));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pending_count(), 1);
    }

    #[test]
    fn test_reorg_requeues_with_original_arrival() {
        let mut pool = pool();
        let state = rich(&[1, 2]);
        let early = tx(1, 0, GWEI);
        pool.add(early.clone(), &state).unwrap();
        pool.on_block_added(&block_with(vec![early.clone()]));
        assert!(pool.is_empty());

        pool.add(tx(2, 0, GWEI), &state).unwrap();
        pool.on_chain_reorganization(&[block_with(vec![early.clone()])], &[]);

        assert_eq!(pool.get_transaction_status(&early.hash()), TxStatus::Pending);
        let picked = pool.txs_by_price_and_nonce(U256::from(GWEI), None);
        assert_eq!(picked[0], early);
    }

    #[test]
    fn test_reorg_skips_txs_in_added_blocks_and_conflicts() {
        let mut pool = pool();
        let state = rich(&[1, 2]);
        let a = tx(1, 0, GWEI);
        let b = tx(2, 0, GWEI);
        let replacement = tx(2, 0, 3 * GWEI);
        pool.add(replacement.clone(), &state).unwrap();

        pool.on_chain_reorganization(
            &[block_with(vec![a.clone(), b.clone()])],
            &[block_with(vec![a.clone()])],
        );

        assert!(!pool.contains(&a.hash()));
        assert!(!pool.contains(&b.hash()));
        assert!(pool.contains(&replacement.hash()));
    }

    // =========================================================================
    // CAPACITY & MAINTENANCE
    // =========================================================================

    #[test]
    fn test_full_pool_evicts_cheapest_queued() {
        let config = TxPoolConfig {
            max_pool_size: 2,
            ..Default::default()
        };
        let mut pool = TxPool::new(config, Arc::new(ManualClock::new(0)));
        let state = rich(&[1, 2, 3, 4]);
        pool.add(tx(1, 0, GWEI), &state).unwrap();
        let queued = pool.add(tx(2, 5, GWEI / 5), &state).unwrap();

        let incoming = pool
            .add_with(tx(3, 0, 2 * GWEI), &state, AddOptions::remote())
            .unwrap();
        assert!(!pool.contains(&queued));
        assert!(pool.contains(&incoming));

        assert_eq!(
            pool.add_with(tx(4, 0, 2 * GWEI), &state, AddOptions::remote()),
            Err(TxPoolError::PoolFull { capacity: 2 })
        );
    }

    #[test]
    fn test_cleanup_expires_old_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let mut pool = TxPool::new(TxPoolConfig::default(), clock.clone());
        let state = rich(&[1]);
        let old = pool.add(tx(1, 0, GWEI), &state).unwrap();

        clock.advance(19 * 60 * 1000);
        assert_eq!(pool.cleanup(), 0);
        clock.advance(2 * 60 * 1000);
        assert_eq!(pool.cleanup(), 1);
        assert!(!pool.contains(&old));
        assert_eq!(pool.stats().handled, 1);

        clock.advance(60 * 60 * 1000);
        pool.cleanup();
        assert_eq!(pool.stats().handled, 0);
    }

    #[test]
    fn test_stats_and_clear() {
        let mut pool = pool();
        let state = rich(&[1, 2]);
        pool.add(tx(1, 0, GWEI), &state).unwrap();
        pool.add(tx(2, 3, GWEI), &state).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.senders, 2);
        assert_eq!(stats.successful, 2);

        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.stats().handled, 2);
    }

    #[test]
    fn test_lookups() {
        let mut pool = pool();
        let state = rich(&[1]);
        let h0 = pool.add(tx(1, 0, GWEI), &state).unwrap();
        let h1 = pool.add(tx(1, 1, GWEI), &state).unwrap();

        assert_eq!(pool.get_by_hash(&h0), Some(&tx(1, 0, GWEI)));
        assert_eq!(pool.get_by_hashes(&[h1, Hash::ZERO, h0]).len(), 2);
        assert_eq!(pool.get_by_sender(&addr(1)).len(), 2);
        assert_eq!(pool.get_pending_transactions().len(), 2);
        assert_eq!(pool.remove_by_hash(&h0), Some(tx(1, 0, GWEI)));
        assert_eq!(pool.get_transaction_status(&Hash::ZERO), TxStatus::Unknown);
    }

    #[tokio::test]
    async fn test_events_broadcast_on_add_and_remove() {
        let mut pool = pool();
        let mut events = pool.subscribe();
        let hash = pool.add(tx(1, 0, GWEI), &rich(&[1])).unwrap();
        pool.remove_by_hash(&hash);

        assert_eq!(events.recv().await.unwrap(), TxPoolEvent::Added(hash));
        assert_eq!(events.recv().await.unwrap(), TxPoolEvent::Removed(hash));
    }
}
