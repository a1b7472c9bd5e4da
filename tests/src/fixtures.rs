//! Shared test fixtures.

use evm_chain::Blockchain;
use evm_interpreter::{BlockEnv, PrecompileRegistry};
use evm_state::StateManager;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Account, Address, Block, Header, Transaction, TxType, U256};

pub const ETHER: u64 = 1_000_000_000_000_000_000;
pub const GWEI: u64 = 1_000_000_000;
pub const CHAIN_ID: u64 = 1;

/// Deterministic key; `seed` must be non-zero.
pub fn key(seed: u8) -> Secp256k1KeyPair {
    Secp256k1KeyPair::from_bytes([seed; 32]).expect("non-zero seed is a valid key")
}

pub fn address_of(key: &Secp256k1KeyPair) -> Address {
    Address(key.address())
}

pub fn genesis_header() -> Header {
    Header {
        gas_limit: 30_000_000,
        base_fee_per_gas: Some(U256::from(GWEI)),
        blob_gas_used: Some(0),
        excess_blob_gas: Some(0),
        ..Header::default()
    }
}

pub fn chain() -> Blockchain {
    Blockchain::new(Block {
        header: genesis_header(),
        ..Block::default()
    })
}

pub fn env() -> BlockEnv {
    BlockEnv {
        number: 1,
        coinbase: Address::from_low_u64(0xc0ffee),
        timestamp: 1,
        gas_limit: 30_000_000,
        base_fee: U256::from(GWEI),
        chain_id: CHAIN_ID,
        ..BlockEnv::default()
    }
}

pub fn precompiles() -> PrecompileRegistry {
    PrecompileRegistry::standard()
}

/// State with every address holding `ether` ether.
pub fn funded(addresses: &[Address], ether: u64) -> StateManager {
    let mut state = StateManager::new();
    for address in addresses {
        let balance = U256::from(ether) * U256::from(ETHER);
        state.put_account(*address, Account::new(0, balance));
    }
    state
}

/// Unsigned EIP-1559 transaction.
pub fn dynamic_tx(nonce: u64, to: Option<Address>, tip_gwei: u64) -> Transaction {
    Transaction {
        tx_type: TxType::DynamicFee,
        chain_id: Some(CHAIN_ID),
        nonce,
        max_priority_fee_per_gas: U256::from(tip_gwei * GWEI),
        max_fee_per_gas: U256::from((tip_gwei + 100) * GWEI),
        gas_limit: 21_000,
        to,
        ..Transaction::default()
    }
}

// =============================================================================
// BYTECODE
// =============================================================================

/// Init code: `sstore(0, 42)`, deploys empty runtime code.
pub fn store_42_init_code() -> Vec<u8> {
    vec![0x60, 0x2a, 0x60, 0x00, 0x55, 0x00]
}

/// Runtime code: `selfdestruct(beneficiary)`.
pub fn selfdestruct_code(beneficiary: Address) -> Vec<u8> {
    let mut code = vec![0x73];
    code.extend_from_slice(beneficiary.as_bytes());
    code.push(0xff);
    code
}

/// Runtime code: call `target` with all gas, discard the result, then
/// `revert(0, 0)`.
pub fn call_then_revert_code(target: Address) -> Vec<u8> {
    // retSize retOffset argsSize argsOffset value
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00];
    code.push(0x73);
    code.extend_from_slice(target.as_bytes());
    // GAS CALL POP PUSH1 0 PUSH1 0 REVERT
    code.extend_from_slice(&[0x5a, 0xf1, 0x50, 0x60, 0x00, 0x60, 0x00, 0xfd]);
    code
}

/// Runtime code: `sstore(0, create2(0, 0, len(init), salt))` over `init`
/// copied from the end of this code.
pub fn create2_factory_code(init: &[u8], salt: u8) -> Vec<u8> {
    let len = u8::try_from(init.len()).expect("short init code");
    // The prefix below is 20 bytes long.
    let offset = 20u8;
    let mut code = vec![
        0x60, len, // PUSH1 len
        0x60, offset, // PUSH1 offset
        0x60, 0x00, // PUSH1 0
        0x39, // CODECOPY
        0x60, salt, // PUSH1 salt
        0x60, len, // PUSH1 len
        0x60, 0x00, // PUSH1 0
        0x60, 0x00, // PUSH1 0 (value)
        0xf5, // CREATE2
        0x60, 0x00, // PUSH1 0
        0x55, // SSTORE
        0x00, // STOP
    ];
    debug_assert_eq!(code.len(), usize::from(offset));
    code.extend_from_slice(init);
    code
}
