//! # State Manager
//!
//! World state as a committed base plus a LIFO stack of checkpoint layers.
//!
//! - `checkpoint` pushes an empty layer; all writes land in the top layer.
//! - `commit` folds the top layer into the one below (or into the base).
//! - `revert` drops the top layer, restoring the pre-checkpoint view exactly.
//!
//! With no checkpoint open, writes go straight to the base. Roots, proofs
//! and dumps read the base only, so open layers never leak into them.
//!
//! In forked mode, reads the base cannot answer go to the [`ForkClient`].
//! Local deletions and storage wipes shadow the remote. Storage roots are
//! computed from local slots only, so forked roots cover local state.

use crate::adapters::{ForkClient, ForkConfig};
use crate::domain::{
    compute_storage_roots, storage_trie, AccountDump, AccountProof, Layer, Lookup, SecureTrie,
    StateDump, StorageProof, StorageUpdate,
};
use crate::errors::{Result, StateError};
use crate::ports::ForkBackend;
use shared_types::primitives::u256_to_be;
use shared_types::{Account, Address, Bytes, Hash, EMPTY_CODE_HASH};
use shared_types::U256;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Partial account update for [`StateManager::modify_account_fields`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFields {
    pub nonce: Option<u64>,
    pub balance: Option<U256>,
    pub code_hash: Option<Hash>,
    pub storage_root: Option<Hash>,
}

#[derive(Debug, Clone, Default)]
struct Committed {
    accounts: HashMap<Address, Account>,
    /// Zero values are kept so they shadow a fork source.
    storage: HashMap<Address, HashMap<U256, U256>>,
    deleted: HashSet<Address>,
    wiped: HashSet<Address>,
    /// Accounts whose storage root is stale.
    dirty: HashSet<Address>,
    touched: HashSet<Address>,
}

impl Committed {
    fn account(&self, address: &Address) -> Lookup<Option<Account>> {
        if let Some(account) = self.accounts.get(address) {
            return Lookup::Found(Some(*account));
        }
        if self.deleted.contains(address) {
            return Lookup::Found(None);
        }
        Lookup::Miss
    }

    fn storage(&self, address: &Address, key: &U256) -> Lookup<U256> {
        if let Some(value) = self.storage.get(address).and_then(|s| s.get(key)) {
            return Lookup::Found(*value);
        }
        if self.wiped.contains(address) {
            return Lookup::Found(U256::zero());
        }
        Lookup::Miss
    }

    fn absorb(&mut self, layer: Layer) {
        for address in layer.wiped {
            self.storage.remove(&address);
            self.wiped.insert(address);
            self.dirty.insert(address);
        }
        for (address, entry) in layer.accounts {
            match entry {
                Some(account) => {
                    self.accounts.insert(address, account);
                    self.deleted.remove(&address);
                }
                None => {
                    self.accounts.remove(&address);
                    self.deleted.insert(address);
                }
            }
        }
        for (address, slots) in layer.storage {
            self.storage.entry(address).or_default().extend(slots);
            self.dirty.insert(address);
        }
        self.touched.extend(layer.touched);
    }

    fn non_zero_slots(&self, address: &Address) -> Vec<(U256, U256)> {
        self.storage
            .get(address)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|(_, v)| !v.is_zero())
                    .map(|(k, v)| (*k, *v))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Checkpointable world state.
#[derive(Clone, Default)]
pub struct StateManager {
    base: Committed,
    layers: Vec<Layer>,
    code: HashMap<Hash, Bytes>,
    fork: Option<Arc<ForkClient>>,
}

impl StateManager {
    /// Empty local state.
    pub fn new() -> Self {
        Self::default()
    }

    /// State that falls back to `backend` for anything not held locally.
    ///
    /// # Errors
    ///
    /// `Backend` if the fork worker cannot start.
    pub fn forked(backend: Arc<dyn ForkBackend>, config: ForkConfig) -> Result<Self> {
        let client = ForkClient::spawn(backend, config)?;
        Ok(Self {
            fork: Some(Arc::new(client)),
            ..Self::default()
        })
    }

    pub fn is_forked(&self) -> bool {
        self.fork.is_some()
    }

    /// Number of open checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.layers.len()
    }

    // =========================================================================
    // CHECKPOINTS
    // =========================================================================

    pub fn checkpoint(&mut self) {
        self.layers.push(Layer::default());
        trace!(depth = self.layers.len(), "checkpoint");
    }

    /// Fold the top layer into its parent.
    ///
    /// # Errors
    ///
    /// `NoCheckpoint` when nothing is open. This is an invariant violation.
    pub fn commit(&mut self) -> Result<()> {
        let top = self
            .layers
            .pop()
            .ok_or(StateError::NoCheckpoint { op: "commit" })?;
        match self.layers.last_mut() {
            Some(parent) => parent.absorb(top),
            None => self.base.absorb(top),
        }
        trace!(depth = self.layers.len(), "commit");
        Ok(())
    }

    /// Discard the top layer.
    ///
    /// # Errors
    ///
    /// `NoCheckpoint` when nothing is open. This is an invariant violation.
    pub fn revert(&mut self) -> Result<()> {
        self.layers
            .pop()
            .ok_or(StateError::NoCheckpoint { op: "revert" })?;
        trace!(depth = self.layers.len(), "revert");
        Ok(())
    }

    fn with_layer(&mut self, write: impl FnOnce(&mut Layer)) {
        match self.layers.last_mut() {
            Some(top) => write(top),
            None => {
                let mut layer = Layer::default();
                write(&mut layer);
                self.base.absorb(layer);
            }
        }
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    fn local_account(&self, address: &Address) -> Lookup<Option<Account>> {
        for layer in self.layers.iter().rev() {
            if let Lookup::Found(entry) = layer.account(address) {
                return Lookup::Found(entry);
            }
        }
        self.base.account(address)
    }

    fn lookup_account(&self, address: &Address) -> Result<Option<Account>> {
        match self.local_account(address) {
            Lookup::Found(entry) => Ok(entry),
            Lookup::Miss => match &self.fork {
                Some(fork) => fork.account(*address),
                None => Ok(None),
            },
        }
    }

    /// The account, or an empty sentinel when it does not exist.
    ///
    /// # Errors
    ///
    /// Fork backend failures. A missing account is never an error.
    pub fn get_account(&self, address: &Address) -> Result<Account> {
        Ok(self.lookup_account(address)?.unwrap_or_default())
    }

    pub fn account_exists(&self, address: &Address) -> Result<bool> {
        Ok(self.lookup_account(address)?.is_some())
    }

    /// EIP-161 emptiness; missing accounts count as empty.
    pub fn is_empty(&self, address: &Address) -> Result<bool> {
        Ok(self
            .lookup_account(address)?
            .map_or(true, |account| account.is_empty()))
    }

    pub fn put_account(&mut self, address: Address, account: Account) {
        self.with_layer(|layer| layer.put_account(address, account));
    }

    /// Remove the account and its storage.
    pub fn delete_account(&mut self, address: Address) {
        self.with_layer(|layer| layer.delete_account(address));
    }

    pub fn modify_account_fields(&mut self, address: Address, fields: AccountFields) -> Result<()> {
        let mut account = self.get_account(&address)?;
        if let Some(nonce) = fields.nonce {
            account.nonce = nonce;
        }
        if let Some(balance) = fields.balance {
            account.balance = balance;
        }
        if let Some(code_hash) = fields.code_hash {
            account.code_hash = code_hash;
        }
        if let Some(storage_root) = fields.storage_root {
            account.storage_root = storage_root;
        }
        self.put_account(address, account);
        Ok(())
    }

    /// Mark `address` for EIP-161 pruning. Reverting the enclosing
    /// checkpoint forgets the touch.
    pub fn touch(&mut self, address: Address) {
        self.with_layer(|layer| {
            layer.touched.insert(address);
        });
    }

    /// Delete every touched account that is empty, then forget all touches.
    /// Returns the pruned addresses.
    pub fn cleanup_touched(&mut self) -> Result<Vec<Address>> {
        let mut touched: BTreeSet<Address> = self.base.touched.drain().collect();
        for layer in &mut self.layers {
            touched.extend(layer.touched.drain());
        }
        let mut pruned = Vec::new();
        for address in touched {
            if matches!(self.lookup_account(&address)?, Some(account) if account.is_empty()) {
                self.delete_account(address);
                pruned.push(address);
            }
        }
        if !pruned.is_empty() {
            debug!(count = pruned.len(), "pruned empty touched accounts");
        }
        Ok(pruned)
    }

    /// Every address that currently resolves to an account locally.
    pub fn account_addresses(&self) -> Vec<Address> {
        let mut seen: BTreeSet<Address> = self.base.accounts.keys().copied().collect();
        for layer in &self.layers {
            seen.extend(layer.accounts.keys().copied());
        }
        seen.into_iter()
            .filter(|a| matches!(self.local_account(a), Lookup::Found(Some(_))))
            .collect()
    }

    // =========================================================================
    // STORAGE
    // =========================================================================

    fn local_storage(&self, address: &Address, key: &U256) -> Lookup<U256> {
        for layer in self.layers.iter().rev() {
            if let Lookup::Found(value) = layer.storage(address, key) {
                return Lookup::Found(value);
            }
        }
        self.base.storage(address, key)
    }

    pub fn get_storage(&self, address: &Address, key: &U256) -> Result<U256> {
        match self.local_storage(address, key) {
            Lookup::Found(value) => Ok(value),
            Lookup::Miss => match &self.fork {
                Some(fork) => fork.storage(*address, *key),
                None => Ok(U256::zero()),
            },
        }
    }

    /// Write a slot. Writing zero deletes the slot.
    pub fn put_storage(&mut self, address: Address, key: U256, value: U256) {
        self.with_layer(|layer| layer.put_storage(address, key, value));
    }

    /// Clear every slot of `address`, keeping the account.
    pub fn clear_contract_storage(&mut self, address: Address) {
        self.with_layer(|layer| layer.wipe_storage(address));
    }

    /// Non-zero local slots of `address` in the current view.
    pub fn dump_storage(&self, address: &Address) -> BTreeMap<U256, U256> {
        let mut slots: BTreeMap<U256, U256> = self
            .base
            .storage
            .get(address)
            .map(|s| s.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default();
        for layer in &self.layers {
            if layer.wiped.contains(address) {
                slots.clear();
            }
            if let Some(written) = layer.storage.get(address) {
                slots.extend(written.iter().map(|(k, v)| (*k, *v)));
            }
        }
        slots.retain(|_, v| !v.is_zero());
        slots
    }

    // =========================================================================
    // CODE
    // =========================================================================

    pub fn get_code(&self, address: &Address) -> Result<Bytes> {
        let account = self.get_account(address)?;
        if account.code_hash == EMPTY_CODE_HASH {
            return Ok(Vec::new());
        }
        if let Some(code) = self.code.get(&account.code_hash) {
            return Ok(code.clone());
        }
        match &self.fork {
            Some(fork) => fork.code(*address),
            None => Err(StateError::CodeNotFound(account.code_hash)),
        }
    }

    /// Set the code of `address`, creating the account if needed.
    pub fn put_code(&mut self, address: Address, code: Bytes) -> Result<()> {
        let mut account = self.get_account(&address)?;
        account.code_hash = if code.is_empty() {
            EMPTY_CODE_HASH
        } else {
            let hash = Hash::keccak(&code);
            self.code.insert(hash, code);
            hash
        };
        self.put_account(address, account);
        Ok(())
    }

    // =========================================================================
    // ROOTS & PROOFS
    // =========================================================================

    fn refresh_storage_roots(&mut self) {
        let dirty: Vec<Address> = self.base.dirty.drain().collect();
        let updates: Vec<StorageUpdate> = dirty
            .into_iter()
            .filter(|a| self.base.accounts.contains_key(a))
            .map(|address| StorageUpdate {
                address,
                slots: self.base.non_zero_slots(&address),
            })
            .collect();
        if updates.is_empty() {
            return;
        }
        debug!(accounts = updates.len(), "recomputing storage roots");
        for (address, root) in compute_storage_roots(updates) {
            if let Some(account) = self.base.accounts.get_mut(&address) {
                account.storage_root = root;
            }
        }
    }

    fn account_trie(&mut self) -> SecureTrie {
        self.refresh_storage_roots();
        let mut trie = SecureTrie::new();
        for (address, account) in &self.base.accounts {
            trie.insert(address.as_bytes(), account.rlp_encode());
        }
        trie
    }

    /// Root of the committed state. Open checkpoints are ignored.
    pub fn state_root(&mut self) -> Hash {
        self.account_trie().root()
    }

    /// Proof of a committed account and some of its slots.
    pub fn get_proof(&mut self, address: &Address, slots: &[U256]) -> Result<AccountProof> {
        let trie = self.account_trie();
        let account = match self.base.account(address) {
            Lookup::Found(entry) => entry.unwrap_or_default(),
            Lookup::Miss => match &self.fork {
                Some(fork) => fork.account(*address)?.unwrap_or_default(),
                None => Account::default(),
            },
        };
        let storage = storage_trie(&self.base.non_zero_slots(address));
        let mut storage_proof = Vec::with_capacity(slots.len());
        for slot in slots {
            let value = match self.base.storage(address, slot) {
                Lookup::Found(v) => v,
                Lookup::Miss => U256::zero(),
            };
            storage_proof.push(StorageProof {
                key: *slot,
                value,
                proof: storage.proof(&u256_to_be(*slot)),
            });
        }
        Ok(AccountProof {
            address: *address,
            balance: account.balance,
            nonce: account.nonce,
            code_hash: account.code_hash,
            storage_hash: account.storage_root,
            account_proof: trie.proof(address.as_bytes()),
            storage_proof,
        })
    }

    // =========================================================================
    // DUMP / LOAD / COPY
    // =========================================================================

    /// Export the committed state.
    pub fn dump_state(&mut self) -> StateDump {
        self.refresh_storage_roots();
        self.base
            .accounts
            .iter()
            .map(|(address, account)| {
                let storage = self
                    .base
                    .non_zero_slots(address)
                    .into_iter()
                    .map(|(k, v)| (Hash::from_u256(k), v))
                    .collect();
                let code = self.code.get(&account.code_hash).cloned().unwrap_or_default();
                let dump = AccountDump {
                    nonce: account.nonce,
                    balance: account.balance,
                    code,
                    storage,
                    storage_root: Some(account.storage_root),
                    code_hash: Some(account.code_hash),
                };
                (*address, dump)
            })
            .collect()
    }

    /// Import accounts through the normal write path. All entries are
    /// validated before anything is written.
    ///
    /// # Errors
    ///
    /// `InvalidDump` when a given `codeHash` or `storageRoot` does not match.
    pub fn load_state(&mut self, dump: &StateDump) -> Result<()> {
        for (address, entry) in dump {
            let code_hash = if entry.code.is_empty() {
                EMPTY_CODE_HASH
            } else {
                Hash::keccak(&entry.code)
            };
            if entry.code_hash.is_some_and(|h| h != code_hash) {
                return Err(StateError::InvalidDump {
                    address: *address,
                    reason: "codeHash does not match code".into(),
                });
            }
            if let Some(expected) = entry.storage_root {
                let slots: Vec<(U256, U256)> =
                    entry.storage.iter().map(|(k, v)| (k.to_u256(), *v)).collect();
                if crate::domain::storage_root(&slots) != expected {
                    return Err(StateError::InvalidDump {
                        address: *address,
                        reason: "storageRoot does not match storage".into(),
                    });
                }
            }
        }

        for (address, entry) in dump {
            let mut account = Account::new(entry.nonce, entry.balance);
            if !entry.code.is_empty() {
                account.code_hash = Hash::keccak(&entry.code);
                self.code.insert(account.code_hash, entry.code.clone());
            }
            let address = *address;
            self.with_layer(|layer| {
                layer.put_account(address, account);
                layer.wipe_storage(address);
                for (slot, value) in &entry.storage {
                    layer.put_storage(address, slot.to_u256(), *value);
                }
            });
        }
        debug!(accounts = dump.len(), "state loaded");
        Ok(())
    }

    /// Independent copy including open checkpoints. A fork client is
    /// shared, since the remote block is fixed.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Drop cached fork reads.
    pub fn clear_caches(&self) {
        if let Some(fork) = &self.fork {
            fork.clear_cache();
        }
    }
}
