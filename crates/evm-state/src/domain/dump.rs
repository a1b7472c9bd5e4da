//! Plain-data state snapshots used for fixtures and persistence.

use serde::{Deserialize, Serialize};
use shared_types::quantity::{bytes_hex, u64_hex};
use shared_types::{Address, Bytes, Hash, U256};
use std::collections::BTreeMap;

/// One account in a state dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDump {
    #[serde(with = "u64_hex", default)]
    pub nonce: u64,
    #[serde(default)]
    pub balance: U256,
    #[serde(with = "bytes_hex", default)]
    pub code: Bytes,
    /// Non-zero slots, keyed by the 32-byte slot
    #[serde(default)]
    pub storage: BTreeMap<Hash, U256>,
    /// Checked against the loaded storage when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<Hash>,
    /// Checked against the loaded code when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<Hash>,
}

/// `{ address: { balance, nonce, code, storage } }`.
pub type StateDump = BTreeMap<Address, AccountDump>;

/// EIP-1186 style proof of one storage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageProof {
    pub key: U256,
    pub value: U256,
    /// RLP trie nodes, root first
    pub proof: Vec<Bytes>,
}

/// EIP-1186 style proof of an account and some of its slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProof {
    pub address: Address,
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: Hash,
    pub storage_hash: Hash,
    pub account_proof: Vec<Bytes>,
    pub storage_proof: Vec<StorageProof>,
}
