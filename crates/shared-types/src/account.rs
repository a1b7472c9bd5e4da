//! # Account
//!
//! The four-field account record stored in the state trie.

use crate::errors::RlpError;
use crate::primitives::{Hash, U256};
use crate::rlp;
use serde::{Deserialize, Serialize};

/// Root of an empty Merkle-Patricia trie, `keccak256(rlp(""))`.
pub const EMPTY_ROOT: Hash = Hash([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
]);

/// Hash of empty code, `keccak256("")`.
pub const EMPTY_CODE_HASH: Hash = Hash(shared_crypto::KECCAK_EMPTY);

/// An account as stored in the state trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Transaction count (EOA) or contract creation count
    pub nonce: u64,
    /// Balance in wei
    pub balance: U256,
    /// Root of the account's storage trie
    pub storage_root: Hash,
    /// keccak256 of the account's code
    pub code_hash: Hash,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: EMPTY_ROOT,
            code_hash: EMPTY_CODE_HASH,
        }
    }
}

impl Account {
    /// Account with the given nonce and balance, no code and no storage.
    pub fn new(nonce: u64, balance: U256) -> Self {
        Self {
            nonce,
            balance,
            ..Self::default()
        }
    }

    /// EIP-161 emptiness: zero nonce, zero balance, no code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == EMPTY_CODE_HASH
    }

    /// True when the account has code.
    pub fn is_contract(&self) -> bool {
        self.code_hash != EMPTY_CODE_HASH
    }

    /// `rlp([nonce, balance, storage_root, code_hash])`.
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_u64(self.nonce),
            rlp::encode_u256(self.balance),
            rlp::encode_hash(&self.storage_root),
            rlp::encode_hash(&self.code_hash),
        ])
    }

    /// Inverse of [`Account::rlp_encode`].
    pub fn rlp_decode(data: &[u8]) -> Result<Self, RlpError> {
        let item = rlp::decode(data)?;
        let fields = item.as_fields(4)?;
        Ok(Self {
            nonce: fields[0].as_u64()?,
            balance: fields[1].as_u256()?,
            storage_root: fields[2].as_hash()?,
            code_hash: fields[3].as_hash()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_is_hash_of_empty_string() {
        assert_eq!(Hash::keccak(&[0x80]), EMPTY_ROOT);
    }

    #[test]
    fn test_default_is_empty() {
        assert!(Account::default().is_empty());
        assert!(!Account::new(1, U256::zero()).is_empty());
        assert!(!Account::new(0, U256::one()).is_empty());
    }

    #[test]
    fn test_rlp_decode_inverts_encode() {
        let account = Account {
            nonce: 7,
            balance: U256::from(10u64).pow(U256::from(18)),
            storage_root: Hash::new([1; 32]),
            code_hash: Hash::new([2; 32]),
        };
        assert_eq!(Account::rlp_decode(&account.rlp_encode()).unwrap(), account);
    }
}
