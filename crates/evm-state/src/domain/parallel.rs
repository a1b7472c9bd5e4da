//! # Parallel Storage Root Computation
//!
//! A block may touch storage in many contracts. Each storage trie is
//! independent, so dirty roots are recomputed with rayon and folded back
//! into the account records sequentially.

use super::trie::SecureTrie;
use rayon::prelude::*;
use shared_types::{primitives::u256_to_be, rlp, Address, Hash, U256};

/// Storage of one account to be re-rooted.
#[derive(Clone, Debug)]
pub struct StorageUpdate {
    pub address: Address,
    pub slots: Vec<(U256, U256)>,
}

/// Below this many accounts the sequential path is used.
pub const PARALLEL_THRESHOLD: usize = 4;

/// Storage trie root over non-zero slots.
pub fn storage_root(slots: &[(U256, U256)]) -> Hash {
    storage_trie(slots).root()
}

/// Storage trie keyed by `keccak256(slot)` holding `rlp(value)`.
pub fn storage_trie(slots: &[(U256, U256)]) -> SecureTrie {
    let mut trie = SecureTrie::new();
    for (key, value) in slots {
        if !value.is_zero() {
            trie.insert(&u256_to_be(*key), rlp::encode_u256(*value));
        }
    }
    trie
}

/// Compute storage roots for many accounts.
pub fn compute_storage_roots(updates: Vec<StorageUpdate>) -> Vec<(Address, Hash)> {
    if updates.len() < PARALLEL_THRESHOLD {
        updates
            .into_iter()
            .map(|u| (u.address, storage_root(&u.slots)))
            .collect()
    } else {
        updates
            .into_par_iter()
            .map(|u| (u.address, storage_root(&u.slots)))
            .collect()
    }
}
