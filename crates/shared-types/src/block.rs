//! # Blocks
//!
//! Header hashing and the fee-market math that links a header to its parent.

use crate::account::EMPTY_ROOT;
use crate::bloom::Bloom;
use crate::primitives::{Address, Bytes, Hash, U256};
use crate::rlp;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// `keccak256(rlp([]))`, the ommers hash of every post-merge block.
pub const EMPTY_OMMERS_HASH: Hash = Hash([
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4, 0x1a,
    0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4, 0x93, 0x47,
]);

/// Base fee of the first EIP-1559 block.
pub const INITIAL_BASE_FEE: u64 = 1_000_000_000;
/// EIP-1559 elasticity multiplier.
pub const ELASTICITY_MULTIPLIER: u64 = 2;
/// EIP-1559 base fee max change denominator.
pub const BASE_FEE_MAX_CHANGE_DENOMINATOR: u64 = 8;
/// Blob gas per blob (EIP-4844).
pub const GAS_PER_BLOB: u64 = 131_072;
/// Target blob gas per block.
pub const TARGET_BLOB_GAS_PER_BLOCK: u64 = 393_216;
/// Maximum blob gas per block.
pub const MAX_BLOB_GAS_PER_BLOCK: u64 = 786_432;
/// Blob base fee update fraction.
pub const BLOB_BASE_FEE_UPDATE_FRACTION: u64 = 3_338_477;
/// Minimum blob base fee.
pub const MIN_BLOB_BASE_FEE: u64 = 1;

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Parent block hash
    pub parent_hash: Hash,
    /// Ommers list hash
    pub ommers_hash: Hash,
    /// Fee recipient
    pub coinbase: Address,
    /// State trie root after this block
    pub state_root: Hash,
    /// Transactions trie root
    pub transactions_root: Hash,
    /// Receipts trie root
    pub receipts_root: Hash,
    /// OR of every receipt bloom
    pub logs_bloom: Bloom,
    /// Always zero after the merge
    pub difficulty: U256,
    /// Block number
    #[serde(with = "crate::quantity::u64_hex")]
    pub number: u64,
    /// Gas limit
    #[serde(with = "crate::quantity::u64_hex")]
    pub gas_limit: u64,
    /// Gas used by all transactions
    #[serde(with = "crate::quantity::u64_hex")]
    pub gas_used: u64,
    /// Unix timestamp, seconds
    #[serde(with = "crate::quantity::u64_hex")]
    pub timestamp: u64,
    /// Free-form extra data
    #[serde(with = "crate::quantity::bytes_hex")]
    pub extra_data: Bytes,
    /// PREVRANDAO value
    pub mix_hash: Hash,
    /// Always zero after the merge
    #[serde(with = "crate::quantity::u64_hex")]
    pub nonce: u64,
    /// EIP-1559 base fee
    pub base_fee_per_gas: Option<U256>,
    /// EIP-4895 withdrawals root
    pub withdrawals_root: Option<Hash>,
    /// EIP-4844 blob gas used
    pub blob_gas_used: Option<u64>,
    /// EIP-4844 excess blob gas
    pub excess_blob_gas: Option<u64>,
    /// EIP-4788 parent beacon block root
    pub parent_beacon_block_root: Option<Hash>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parent_hash: Hash::ZERO,
            ommers_hash: EMPTY_OMMERS_HASH,
            coinbase: Address::ZERO,
            state_root: EMPTY_ROOT,
            transactions_root: EMPTY_ROOT,
            receipts_root: EMPTY_ROOT,
            logs_bloom: Bloom::default(),
            difficulty: U256::zero(),
            number: 0,
            gas_limit: 30_000_000,
            gas_used: 0,
            timestamp: 0,
            extra_data: Vec::new(),
            mix_hash: Hash::ZERO,
            nonce: 0,
            base_fee_per_gas: Some(U256::from(INITIAL_BASE_FEE)),
            withdrawals_root: Some(EMPTY_ROOT),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
            parent_beacon_block_root: Some(Hash::ZERO),
        }
    }
}

impl Header {
    /// RLP of the header. Optional fork fields are appended in order while present.
    pub fn rlp_encode(&self) -> Vec<u8> {
        let mut fields = vec![
            rlp::encode_hash(&self.parent_hash),
            rlp::encode_hash(&self.ommers_hash),
            rlp::encode_address(&self.coinbase),
            rlp::encode_hash(&self.state_root),
            rlp::encode_hash(&self.transactions_root),
            rlp::encode_hash(&self.receipts_root),
            rlp::encode_bytes(self.logs_bloom.as_bytes()),
            rlp::encode_u256(self.difficulty),
            rlp::encode_u64(self.number),
            rlp::encode_u64(self.gas_limit),
            rlp::encode_u64(self.gas_used),
            rlp::encode_u64(self.timestamp),
            rlp::encode_bytes(&self.extra_data),
            rlp::encode_hash(&self.mix_hash),
            rlp::encode_bytes(&self.nonce.to_be_bytes()),
        ];
        let optional = [
            self.base_fee_per_gas.map(rlp::encode_u256),
            self.withdrawals_root.as_ref().map(rlp::encode_hash),
            self.blob_gas_used.map(rlp::encode_u64),
            self.excess_blob_gas.map(rlp::encode_u64),
            self.parent_beacon_block_root.as_ref().map(rlp::encode_hash),
        ];
        fields.extend(optional.into_iter().map_while(|f| f));
        rlp::encode_list(&fields)
    }

    /// `keccak256(rlp(header))`.
    pub fn hash(&self) -> Hash {
        Hash::keccak(&self.rlp_encode())
    }

    /// Base fee, falling back to the initial EIP-1559 base fee.
    pub fn base_fee(&self) -> U256 {
        self.base_fee_per_gas
            .unwrap_or_else(|| U256::from(INITIAL_BASE_FEE))
    }

    /// Base fee of the child block (EIP-1559).
    pub fn calc_next_base_fee(&self) -> U256 {
        let base_fee = self.base_fee();
        let target = self.gas_limit / ELASTICITY_MULTIPLIER;
        if target == 0 || self.gas_used == target {
            return base_fee;
        }
        let denominator = U256::from(target) * U256::from(BASE_FEE_MAX_CHANGE_DENOMINATOR);
        if self.gas_used > target {
            let delta = U256::from(self.gas_used - target);
            let change = (base_fee.saturating_mul(delta) / denominator).max(U256::one());
            base_fee.saturating_add(change)
        } else {
            let delta = U256::from(target - self.gas_used);
            let change = base_fee.saturating_mul(delta) / denominator;
            base_fee.saturating_sub(change)
        }
    }

    /// Excess blob gas of the child block.
    pub fn calc_next_excess_blob_gas(&self) -> u64 {
        let total = self.excess_blob_gas.unwrap_or(0) + self.blob_gas_used.unwrap_or(0);
        total.saturating_sub(TARGET_BLOB_GAS_PER_BLOCK)
    }

    /// Blob gas price for transactions in this block.
    pub fn blob_gas_price(&self) -> U256 {
        fake_exponential(
            U256::from(MIN_BLOB_BASE_FEE),
            U256::from(self.excess_blob_gas.unwrap_or(0)),
            U256::from(BLOB_BASE_FEE_UPDATE_FRACTION),
        )
    }
}

/// `factor * e ** (numerator / denominator)` by Taylor expansion (EIP-4844).
pub fn fake_exponential(factor: U256, numerator: U256, denominator: U256) -> U256 {
    let mut i = U256::one();
    let mut output = U256::zero();
    let mut accum = factor * denominator;
    while !accum.is_zero() {
        output = output.saturating_add(accum);
        accum = accum.saturating_mul(numerator) / (denominator * i);
        i += U256::one();
    }
    output / denominator
}

/// EIP-4895 validator withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Monotonic withdrawal index
    pub index: u64,
    /// Validator index
    pub validator_index: u64,
    /// Recipient
    pub address: Address,
    /// Amount in gwei
    pub amount: u64,
}

impl Withdrawal {
    /// Amount converted to wei.
    pub fn amount_wei(&self) -> U256 {
        U256::from(self.amount) * U256::from(1_000_000_000u64)
    }

    /// `rlp([index, validator_index, address, amount])`.
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_u64(self.index),
            rlp::encode_u64(self.validator_index),
            rlp::encode_address(&self.address),
            rlp::encode_u64(self.amount),
        ])
    }
}

/// A block: header, transactions and withdrawals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Header
    pub header: Header,
    /// Ordered transactions
    pub transactions: Vec<Transaction>,
    /// Withdrawals
    pub withdrawals: Vec<Withdrawal>,
}

impl Block {
    /// Header hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }
}
