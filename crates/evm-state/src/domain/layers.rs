//! # Checkpoint Layers
//!
//! Each open checkpoint owns one `Layer` of uncommitted writes. Reads walk
//! layers from the top down and fall through to the committed base.
//! `None` in `accounts` is a deletion; `wiped` marks storage cleared by
//! SELFDESTRUCT or account deletion, hiding every older slot.

use shared_types::{Account, Address, U256};
use std::collections::{HashMap, HashSet};

/// Result of looking an item up in a single layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The layer has a definite answer
    Found(T),
    /// Continue with the layer below
    Miss,
}

/// Uncommitted writes of one checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layer {
    pub accounts: HashMap<Address, Option<Account>>,
    pub storage: HashMap<Address, HashMap<U256, U256>>,
    pub wiped: HashSet<Address>,
    /// Accounts touched for EIP-161 pruning
    pub touched: HashSet<Address>,
}

impl Layer {
    pub fn account(&self, address: &Address) -> Lookup<Option<Account>> {
        match self.accounts.get(address) {
            Some(entry) => Lookup::Found(*entry),
            None => Lookup::Miss,
        }
    }

    pub fn storage(&self, address: &Address, key: &U256) -> Lookup<U256> {
        if let Some(value) = self.storage.get(address).and_then(|s| s.get(key)) {
            return Lookup::Found(*value);
        }
        if self.wiped.contains(address) {
            return Lookup::Found(U256::zero());
        }
        Lookup::Miss
    }

    pub fn put_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, Some(account));
    }

    pub fn put_storage(&mut self, address: Address, key: U256, value: U256) {
        self.storage.entry(address).or_default().insert(key, value);
    }

    pub fn wipe_storage(&mut self, address: Address) {
        self.storage.remove(&address);
        self.wiped.insert(address);
    }

    pub fn delete_account(&mut self, address: Address) {
        self.accounts.insert(address, None);
        self.wipe_storage(address);
    }

    /// Fold `child` (a newer layer) into this one.
    pub fn absorb(&mut self, child: Layer) {
        // Slot writes in `child` all postdate its wipes.
        for address in child.wiped {
            self.wipe_storage(address);
        }
        self.accounts.extend(child.accounts);
        for (address, slots) in child.storage {
            self.storage.entry(address).or_default().extend(slots);
        }
        self.touched.extend(child.touched);
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.storage.is_empty()
            && self.wiped.is_empty()
            && self.touched.is_empty()
    }
}
