//! # Gas Schedule
//!
//! Costs as of Cancun: EIP-2929 access lists, EIP-2200/3529 SSTORE,
//! EIP-3860 initcode metering and EIP-150 call forwarding.

use shared_types::U256;

/// Gas constants.
pub mod costs {
    pub const ZERO: u64 = 0;
    pub const BASE: u64 = 2;
    pub const VERY_LOW: u64 = 3;
    pub const LOW: u64 = 5;
    pub const MID: u64 = 8;
    pub const HIGH: u64 = 10;
    pub const JUMPDEST: u64 = 1;

    // Transaction
    pub const TX_BASE: u64 = 21_000;
    pub const TX_CREATE: u64 = 32_000;
    pub const TX_DATA_NON_ZERO: u64 = 16;
    pub const TX_DATA_ZERO: u64 = 4;
    pub const TX_ACCESS_LIST_ADDRESS: u64 = 2_400;
    pub const TX_ACCESS_LIST_STORAGE_KEY: u64 = 1_900;
    /// EIP-7702 per-authorization cost
    pub const PER_EMPTY_ACCOUNT: u64 = 25_000;
    pub const PER_AUTH_BASE: u64 = 12_500;

    pub const COPY: u64 = 3;

    // EIP-2929
    pub const COLD_SLOAD: u64 = 2_100;
    pub const WARM_STORAGE_READ: u64 = 100;
    pub const COLD_ACCOUNT_ACCESS: u64 = 2_600;

    // EIP-2200 / EIP-3529
    pub const SSTORE_SET: u64 = 20_000;
    pub const SSTORE_RESET: u64 = 5_000 - COLD_SLOAD;
    pub const SSTORE_CLEARS_REFUND: u64 = 4_800;
    pub const SSTORE_SENTRY: u64 = 2_300;

    // Calls
    pub const CALL_VALUE: u64 = 9_000;
    pub const NEW_ACCOUNT: u64 = 25_000;
    pub const CALL_STIPEND: u64 = 2_300;

    // Creation
    pub const CREATE: u64 = 32_000;
    pub const CODE_DEPOSIT: u64 = 200;
    pub const INITCODE_WORD: u64 = 2;

    // Logs
    pub const LOG: u64 = 375;
    pub const LOG_TOPIC: u64 = 375;
    pub const LOG_DATA: u64 = 8;

    pub const KECCAK256: u64 = 30;
    pub const KECCAK256_WORD: u64 = 6;
    pub const EXP: u64 = 10;
    pub const EXP_BYTE: u64 = 50;
    pub const SELFDESTRUCT: u64 = 5_000;
    pub const BLOCKHASH: u64 = 20;
}

/// EIP-170 deployed code limit.
pub const MAX_CODE_SIZE: usize = 24_576;
/// EIP-3860 initcode limit.
pub const MAX_INITCODE_SIZE: usize = 2 * MAX_CODE_SIZE;
/// EIP-3529 refund quotient.
pub const MAX_REFUND_QUOTIENT: u64 = 5;
/// Maximum call depth.
pub const CALL_DEPTH_LIMIT: usize = 1024;

/// Gas counter for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gas {
    limit: u64,
    remaining: u64,
}

impl Gas {
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    #[must_use]
    pub fn used(&self) -> u64 {
        self.limit - self.remaining
    }

    /// Returns false, leaving the counter untouched, when `amount` exceeds
    /// what is left.
    #[must_use]
    pub fn charge(&mut self, amount: u64) -> bool {
        match self.remaining.checked_sub(amount) {
            Some(left) => {
                self.remaining = left;
                true
            }
            None => false,
        }
    }

    /// Gas handed back by a finished child frame.
    pub fn reimburse(&mut self, amount: u64) {
        self.remaining += amount;
    }

    pub fn burn_all(&mut self) {
        self.remaining = 0;
    }
}

fn words(len: usize) -> u64 {
    len.div_ceil(32) as u64
}

#[must_use]
pub fn exp_cost(exponent: U256) -> u64 {
    if exponent.is_zero() {
        return costs::EXP;
    }
    let bytes = u64::from(256 - exponent.leading_zeros()).div_ceil(8);
    costs::EXP + costs::EXP_BYTE * bytes
}

/// Dynamic part of KECCAK256 (per word).
#[must_use]
pub fn keccak256_word_cost(len: usize) -> u64 {
    costs::KECCAK256_WORD * words(len)
}

/// Dynamic part of LOGn.
#[must_use]
pub fn log_cost(len: usize, topics: usize) -> u64 {
    costs::LOG_TOPIC * topics as u64 + costs::LOG_DATA.saturating_mul(len as u64)
}

/// Per-word cost of the *COPY family.
#[must_use]
pub fn copy_cost(len: usize) -> u64 {
    costs::COPY * words(len)
}

/// EIP-3860 initcode word cost, plus hashing for CREATE2.
#[must_use]
pub fn create_cost(init_code_len: usize, create2: bool) -> u64 {
    let mut gas = costs::INITCODE_WORD * words(init_code_len);
    if create2 {
        gas += costs::KECCAK256_WORD * words(init_code_len);
    }
    gas
}

/// EIP-2929 account access.
#[must_use]
pub fn account_access_cost(is_cold: bool) -> u64 {
    if is_cold {
        costs::COLD_ACCOUNT_ACCESS
    } else {
        costs::WARM_STORAGE_READ
    }
}

/// Inputs to the CALL-family base cost.
#[derive(Clone, Debug)]
pub struct CallCost {
    pub is_cold: bool,
    pub transfers_value: bool,
    /// Value sent to an EIP-161 empty account by CALL
    pub creates_account: bool,
}

#[must_use]
pub fn call_cost(params: &CallCost) -> u64 {
    let mut gas = account_access_cost(params.is_cold);
    if params.transfers_value {
        gas += costs::CALL_VALUE;
    }
    if params.creates_account {
        gas += costs::NEW_ACCOUNT;
    }
    gas
}

/// EIP-150: all but one 64th of what is left after charging the call.
#[must_use]
pub fn max_call_gas(available: u64) -> u64 {
    available - available / 64
}

/// Gas handed to a sub-call, not counting the value stipend.
#[must_use]
pub fn call_gas(available: u64, requested: U256) -> u64 {
    let cap = max_call_gas(available);
    if requested > U256::from(cap) {
        cap
    } else {
        requested.low_u64()
    }
}

/// SSTORE cost and refund delta per EIP-2200 with EIP-2929/3529 values.
/// The cold surcharge is charged separately.
#[must_use]
pub fn sstore_cost(original: U256, current: U256, new: U256) -> (u64, i64) {
    const CLEARS: i64 = costs::SSTORE_CLEARS_REFUND as i64;
    if current == new {
        return (costs::WARM_STORAGE_READ, 0);
    }
    if original == current {
        if original.is_zero() {
            return (costs::SSTORE_SET, 0);
        }
        let refund = if new.is_zero() { CLEARS } else { 0 };
        return (costs::SSTORE_RESET, refund);
    }
    let mut refund = 0i64;
    if !original.is_zero() {
        if current.is_zero() {
            refund -= CLEARS;
        } else if new.is_zero() {
            refund += CLEARS;
        }
    }
    if original == new {
        refund += if original.is_zero() {
            (costs::SSTORE_SET - costs::WARM_STORAGE_READ) as i64
        } else {
            (costs::SSTORE_RESET - costs::WARM_STORAGE_READ) as i64
        };
    }
    (costs::WARM_STORAGE_READ, refund)
}

/// EIP-3529: refunds are capped at a fifth of the gas used.
#[must_use]
pub fn capped_refund(gas_used: u64, refund: u64) -> u64 {
    refund.min(gas_used / MAX_REFUND_QUOTIENT)
}

/// Static cost charged before each opcode executes. Dynamic parts are
/// charged by the opcode itself.
#[rustfmt::skip]
pub const OPCODE_GAS: [u64; 256] = {
    let mut table = [0u64; 256];

    table[0x01] = costs::VERY_LOW;      // ADD
    table[0x02] = costs::LOW;           // MUL
    table[0x03] = costs::VERY_LOW;      // SUB
    table[0x04] = costs::LOW;           // DIV
    table[0x05] = costs::LOW;           // SDIV
    table[0x06] = costs::LOW;           // MOD
    table[0x07] = costs::LOW;           // SMOD
    table[0x08] = costs::MID;           // ADDMOD
    table[0x09] = costs::MID;           // MULMOD
    table[0x0A] = costs::EXP;           // EXP
    table[0x0B] = costs::LOW;           // SIGNEXTEND

    let mut i = 0x10;
    while i <= 0x1D {
        table[i] = costs::VERY_LOW;     // comparison & bitwise
        i += 1;
    }

    table[0x20] = costs::KECCAK256;

    table[0x30] = costs::BASE;          // ADDRESS
    table[0x32] = costs::BASE;          // ORIGIN
    table[0x33] = costs::BASE;          // CALLER
    table[0x34] = costs::BASE;          // CALLVALUE
    table[0x35] = costs::VERY_LOW;      // CALLDATALOAD
    table[0x36] = costs::BASE;          // CALLDATASIZE
    table[0x37] = costs::VERY_LOW;      // CALLDATACOPY
    table[0x38] = costs::BASE;          // CODESIZE
    table[0x39] = costs::VERY_LOW;      // CODECOPY
    table[0x3A] = costs::BASE;          // GASPRICE
    table[0x3D] = costs::BASE;          // RETURNDATASIZE
    table[0x3E] = costs::VERY_LOW;      // RETURNDATACOPY

    table[0x40] = costs::BLOCKHASH;
    table[0x41] = costs::BASE;          // COINBASE
    table[0x42] = costs::BASE;          // TIMESTAMP
    table[0x43] = costs::BASE;          // NUMBER
    table[0x44] = costs::BASE;          // PREVRANDAO
    table[0x45] = costs::BASE;          // GASLIMIT
    table[0x46] = costs::BASE;          // CHAINID
    table[0x47] = costs::LOW;           // SELFBALANCE
    table[0x48] = costs::BASE;          // BASEFEE
    table[0x49] = costs::VERY_LOW;      // BLOBHASH
    table[0x4A] = costs::BASE;          // BLOBBASEFEE

    table[0x50] = costs::BASE;          // POP
    table[0x51] = costs::VERY_LOW;      // MLOAD
    table[0x52] = costs::VERY_LOW;      // MSTORE
    table[0x53] = costs::VERY_LOW;      // MSTORE8
    table[0x56] = costs::MID;           // JUMP
    table[0x57] = costs::HIGH;          // JUMPI
    table[0x58] = costs::BASE;          // PC
    table[0x59] = costs::BASE;          // MSIZE
    table[0x5A] = costs::BASE;          // GAS
    table[0x5B] = costs::JUMPDEST;
    table[0x5C] = costs::WARM_STORAGE_READ; // TLOAD
    table[0x5D] = costs::WARM_STORAGE_READ; // TSTORE
    table[0x5E] = costs::VERY_LOW;      // MCOPY
    table[0x5F] = costs::BASE;          // PUSH0

    i = 0x60;
    while i <= 0x9F {
        table[i] = costs::VERY_LOW;     // PUSHn, DUPn, SWAPn
        i += 1;
    }

    i = 0xA0;
    while i <= 0xA4 {
        table[i] = costs::LOG;
        i += 1;
    }

    table[0xF0] = costs::CREATE;
    table[0xF5] = costs::CREATE;        // CREATE2
    table[0xFF] = costs::SELFDESTRUCT;

    table
};
