//! # Messages and Results
//!
//! A [`Message`] is one call or create. It lives until its [`ExecResult`]
//! is returned to the parent frame.

use crate::errors::ExceptionError;
use shared_types::{Address, Bytes, Hash, Log, U256};
use std::collections::BTreeSet;

/// Selector of `Error(string)`.
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Selector of `Panic(uint256)`.
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// A top-level call or create.
///
/// For creates the caller's nonce must already be incremented; the new
/// address is derived from `nonce - 1` (or from `salt` for CREATE2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub caller: Address,
    /// `None` creates a contract from `data`.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub depth: usize,
    pub is_static: bool,
    /// Run without moving `value`.
    pub delegatecall: bool,
    pub salt: Option<U256>,
}

impl Message {
    pub fn call(caller: Address, to: Address, data: Bytes, gas_limit: u64) -> Self {
        Self {
            caller,
            to: Some(to),
            value: U256::zero(),
            data,
            gas_limit,
            depth: 0,
            is_static: false,
            delegatecall: false,
            salt: None,
        }
    }

    pub fn create(caller: Address, init_code: Bytes, gas_limit: u64) -> Self {
        Self {
            to: None,
            ..Self::call(caller, Address::ZERO, init_code, gas_limit)
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = Some(salt);
        self
    }

    #[must_use]
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// How a CALL-family frame relates to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

/// Block-scoped environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEnv {
    pub number: u64,
    pub coinbase: Address,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub base_fee: U256,
    pub prev_randao: Hash,
    pub blob_base_fee: U256,
    pub chain_id: u64,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self {
            number: 0,
            coinbase: Address::ZERO,
            timestamp: 0,
            gas_limit: 30_000_000,
            base_fee: U256::zero(),
            prev_randao: Hash::ZERO,
            blob_base_fee: U256::one(),
            chain_id: 1,
        }
    }
}

/// Transaction-scoped environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxEnv {
    pub origin: Address,
    pub gas_price: U256,
    pub blob_hashes: Vec<Hash>,
}

/// Outcome of one [`Message`]. Logs, refunds and the self-destruct and
/// created sets are empty unless the message succeeded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub gas_used: u64,
    /// Raw refund counter; the caller applies the EIP-3529 cap.
    pub gas_refund: u64,
    pub return_data: Bytes,
    pub logs: Vec<Log>,
    /// Address deployed by a create message.
    pub created_address: Option<Address>,
    /// Contracts created during this execution (EIP-6780).
    pub created_addresses: BTreeSet<Address>,
    /// Accounts that executed SELFDESTRUCT.
    pub selfdestructs: BTreeSet<Address>,
    pub exception: Option<ExceptionError>,
}

impl ExecResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exception.is_none()
    }

    #[must_use]
    pub fn is_revert(&self) -> bool {
        self.exception == Some(ExceptionError::Revert)
    }

    /// Decode `Error(string)` or `Panic(uint256)` return data of a revert.
    #[must_use]
    pub fn revert_reason(&self) -> Option<String> {
        if !self.is_revert() {
            return None;
        }
        decode_revert_reason(&self.return_data)
    }
}

/// ABI-decode a revert payload.
#[must_use]
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let selector = data.get(..4)?;
    let body = &data[4..];
    if selector == ERROR_SELECTOR {
        let offset = word_to_usize(body.get(..32)?)?;
        let len = word_to_usize(body.get(offset..offset.checked_add(32)?)?)?;
        let start = offset + 32;
        let bytes = body.get(start..start.checked_add(len)?)?;
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }
    if selector == PANIC_SELECTOR {
        let code = U256::from_big_endian(body.get(..32)?);
        return Some(format!("Panic(0x{code:x})"));
    }
    None
}

fn word_to_usize(word: &[u8]) -> Option<usize> {
    let value = U256::from_big_endian(word);
    if value > U256::from(u32::MAX) {
        return None;
    }
    Some(value.low_u64() as usize)
}
