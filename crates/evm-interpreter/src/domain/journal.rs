//! # Substate Journal
//!
//! Transaction-scoped bookkeeping that is not part of the world state:
//! warm accounts and slots (EIP-2929), transient storage (EIP-1153), logs,
//! the refund counter, self-destructs and same-transaction creations
//! (EIP-6780). Every change is journaled so [`Journal::revert`] can undo it
//! in lockstep with `StateManager::revert`.

use shared_types::{Address, Log, U256};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Entry {
    AccountWarmed(Address),
    SlotWarmed(Address, U256),
    TransientSet {
        address: Address,
        key: U256,
        previous: U256,
    },
    RefundChanged(i64),
    SelfDestructed(Address),
    Created(Address),
}

/// Position to revert to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JournalCheckpoint {
    entries: usize,
    logs: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Journal {
    warm_accounts: HashSet<Address>,
    warm_slots: HashSet<(Address, U256)>,
    transient: HashMap<(Address, U256), U256>,
    logs: Vec<Log>,
    refund: i64,
    selfdestructs: BTreeSet<Address>,
    created: BTreeSet<Address>,
    entries: Vec<Entry>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn checkpoint(&self) -> JournalCheckpoint {
        JournalCheckpoint {
            entries: self.entries.len(),
            logs: self.logs.len(),
        }
    }

    /// Undo everything recorded since `checkpoint`.
    pub fn revert(&mut self, checkpoint: JournalCheckpoint) {
        while self.entries.len() > checkpoint.entries {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            match entry {
                Entry::AccountWarmed(address) => {
                    self.warm_accounts.remove(&address);
                }
                Entry::SlotWarmed(address, key) => {
                    self.warm_slots.remove(&(address, key));
                }
                Entry::TransientSet {
                    address,
                    key,
                    previous,
                } => {
                    self.transient.insert((address, key), previous);
                }
                Entry::RefundChanged(previous) => self.refund = previous,
                Entry::SelfDestructed(address) => {
                    self.selfdestructs.remove(&address);
                }
                Entry::Created(address) => {
                    self.created.remove(&address);
                }
            }
        }
        self.logs.truncate(checkpoint.logs);
    }

    // =========================================================================
    // ACCESS LISTS (EIP-2929)
    // =========================================================================

    /// Mark `address` warm. Returns true if it was cold.
    pub fn warm_account(&mut self, address: Address) -> bool {
        let cold = self.warm_accounts.insert(address);
        if cold {
            self.entries.push(Entry::AccountWarmed(address));
        }
        cold
    }

    /// Mark a slot warm. Returns true if it was cold.
    pub fn warm_slot(&mut self, address: Address, key: U256) -> bool {
        let cold = self.warm_slots.insert((address, key));
        if cold {
            self.entries.push(Entry::SlotWarmed(address, key));
        }
        cold
    }

    #[must_use]
    pub fn is_warm_account(&self, address: &Address) -> bool {
        self.warm_accounts.contains(address)
    }

    #[must_use]
    pub fn is_warm_slot(&self, address: &Address, key: &U256) -> bool {
        self.warm_slots.contains(&(*address, *key))
    }

    // =========================================================================
    // TRANSIENT STORAGE (EIP-1153)
    // =========================================================================

    #[must_use]
    pub fn tload(&self, address: &Address, key: &U256) -> U256 {
        self.transient
            .get(&(*address, *key))
            .copied()
            .unwrap_or_default()
    }

    pub fn tstore(&mut self, address: Address, key: U256, value: U256) {
        let previous = self
            .transient
            .insert((address, key), value)
            .unwrap_or_default();
        if previous != value {
            self.entries.push(Entry::TransientSet {
                address,
                key,
                previous,
            });
        }
    }

    // =========================================================================
    // LOGS, REFUNDS, LIFECYCLE
    // =========================================================================

    pub fn log(&mut self, log: Log) {
        self.logs.push(log);
    }

    #[must_use]
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    pub fn add_refund(&mut self, delta: i64) {
        if delta != 0 {
            self.entries.push(Entry::RefundChanged(self.refund));
            self.refund += delta;
        }
    }

    /// Refund counter, floored at zero.
    #[must_use]
    pub fn refund(&self) -> u64 {
        u64::try_from(self.refund).unwrap_or(0)
    }

    pub fn mark_selfdestruct(&mut self, address: Address) {
        if self.selfdestructs.insert(address) {
            self.entries.push(Entry::SelfDestructed(address));
        }
    }

    pub fn mark_created(&mut self, address: Address) {
        if self.created.insert(address) {
            self.entries.push(Entry::Created(address));
        }
    }

    #[must_use]
    pub fn is_created(&self, address: &Address) -> bool {
        self.created.contains(address)
    }

    #[must_use]
    pub fn selfdestructs(&self) -> &BTreeSet<Address> {
        &self.selfdestructs
    }

    #[must_use]
    pub fn created(&self) -> &BTreeSet<Address> {
        &self.created
    }

    /// Move the accumulated logs out.
    pub fn take_logs(&mut self) -> Vec<Log> {
        std::mem::take(&mut self.logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_warm_reports_cold_once() {
        let mut journal = Journal::new();
        assert!(journal.warm_account(addr(1)));
        assert!(!journal.warm_account(addr(1)));
        assert!(journal.warm_slot(addr(1), U256::one()));
        assert!(!journal.warm_slot(addr(1), U256::one()));
    }

    #[test]
    fn test_revert_undoes_everything() {
        let mut journal = Journal::new();
        journal.warm_account(addr(1));
        journal.add_refund(100);
        let cp = journal.checkpoint();

        journal.warm_account(addr(2));
        journal.warm_slot(addr(2), U256::one());
        journal.tstore(addr(2), U256::one(), U256::from(7));
        journal.add_refund(-40);
        journal.mark_selfdestruct(addr(2));
        journal.mark_created(addr(3));
        journal.log(Log {
            address: addr(2),
            topics: vec![],
            data: vec![],
        });
        journal.revert(cp);

        assert!(journal.is_warm_account(&addr(1)));
        assert!(!journal.is_warm_account(&addr(2)));
        assert!(!journal.is_warm_slot(&addr(2), &U256::one()));
        assert_eq!(journal.tload(&addr(2), &U256::one()), U256::zero());
        assert_eq!(journal.refund(), 100);
        assert!(journal.selfdestructs().is_empty());
        assert!(!journal.is_created(&addr(3)));
        assert!(journal.logs().is_empty());
    }

    #[test]
    fn test_nested_transient_revert() {
        let mut journal = Journal::new();
        journal.tstore(addr(1), U256::zero(), U256::from(1));
        let cp = journal.checkpoint();
        journal.tstore(addr(1), U256::zero(), U256::from(2));
        journal.tstore(addr(1), U256::zero(), U256::from(3));
        journal.revert(cp);
        assert_eq!(journal.tload(&addr(1), &U256::zero()), U256::from(1));
    }

    #[test]
    fn test_negative_refund_floors_at_zero() {
        let mut journal = Journal::new();
        journal.add_refund(-4_800);
        assert_eq!(journal.refund(), 0);
    }
}
