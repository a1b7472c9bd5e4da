//! Pool entries, options, events and statistics.

use serde::Serialize;
use shared_types::{Address, Hash, Transaction};
use std::collections::BTreeMap;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// A pooled transaction with its arrival metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub tx: Transaction,
    pub hash: Hash,
    pub sender: Address,
    /// When the entry entered the pool.
    pub added_at: Timestamp,
    /// Arrival sequence, the tie-breaker between equal tips.
    pub seq: u64,
}

/// Record of every hash the pool has seen, pooled or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Handled {
    pub sender: Address,
    pub added_at: Timestamp,
    pub seq: u64,
    /// Why the transaction left the pool without being mined, or was refused.
    pub error: Option<String>,
}

/// Per-call relaxations for [`crate::TxPool::add_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Skip the capacity, minimum tip, per-sender and base fee checks.
    pub local: bool,
    /// Reject transactions that are neither signed nor impersonated.
    pub require_signature: bool,
    /// Skip the balance check.
    pub skip_balance: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self::local()
    }
}

impl AddOptions {
    pub fn local() -> Self {
        Self {
            local: true,
            require_signature: true,
            skip_balance: false,
        }
    }

    pub fn remote() -> Self {
        Self {
            local: false,
            ..Self::local()
        }
    }
}

/// Lifecycle of a hash as far as the pool knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Mined,
    Unknown,
}

/// Broadcast on every insertion and removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPoolEvent {
    Added(Hash),
    Removed(Hash),
}

/// Executable and gapped transactions, grouped by sender in nonce order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxPoolContent {
    pub pending: BTreeMap<Address, Vec<Transaction>>,
    pub queued: BTreeMap<Address, Vec<Transaction>>,
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPoolStats {
    pub pending: usize,
    pub queued: usize,
    pub handled: usize,
    pub successful: usize,
    pub errors: usize,
    pub senders: usize,
}
