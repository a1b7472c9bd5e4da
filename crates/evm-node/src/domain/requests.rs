//! Typed request and response shapes at the node boundary.
//!
//! Inputs are assumed to be schema-checked already; the node only fills in
//! defaults.

use serde::{Deserialize, Serialize};
use shared_types::quantity::{bytes_hex, u64_hex};
use shared_types::{AccessListItem, Address, Bloom, Bytes, Hash, Log, TxType, U256};

/// Which block a read refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockTag {
    #[default]
    Latest,
    Earliest,
    Pending,
    Number(u64),
}

/// `eth_call` / `eth_estimateGas` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallParams {
    pub from: Option<Address>,
    /// `None` simulates a contract creation.
    pub to: Option<Address>,
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub value: Option<U256>,
    #[serde(with = "bytes_hex")]
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
}

/// `eth_sendTransaction` parameters; the sender is impersonated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub value: Option<U256>,
    pub nonce: Option<u64>,
    #[serde(with = "bytes_hex")]
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
}

impl From<&TransactionRequest> for CallParams {
    fn from(req: &TransactionRequest) -> Self {
        Self {
            from: Some(req.from),
            to: req.to,
            gas: req.gas,
            gas_price: req.gas_price,
            max_fee_per_gas: req.max_fee_per_gas,
            max_priority_fee_per_gas: req.max_priority_fee_per_gas,
            value: req.value,
            data: req.data.clone(),
            access_list: req.access_list.clone(),
        }
    }
}

/// Outcome of a simulated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    #[serde(with = "bytes_hex")]
    pub return_data: Bytes,
    #[serde(with = "u64_hex")]
    pub gas_used: u64,
    pub logs: Vec<Log>,
    pub created_address: Option<Address>,
    /// Lowercase exception name when execution failed.
    pub exception: Option<String>,
    pub revert_reason: Option<String>,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        self.exception.is_none()
    }
}

/// A mined receipt with its position and derived fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: Hash,
    #[serde(with = "u64_hex")]
    pub transaction_index: u64,
    pub block_hash: Hash,
    #[serde(with = "u64_hex")]
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(with = "u64_hex")]
    pub cumulative_gas_used: u64,
    #[serde(with = "u64_hex")]
    pub gas_used: u64,
    pub effective_gas_price: U256,
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
    pub logs_bloom: Bloom,
    pub status: bool,
    #[serde(rename = "type")]
    pub tx_type: TxType,
}
