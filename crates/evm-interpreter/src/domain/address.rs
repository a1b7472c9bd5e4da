//! Contract address derivation and EIP-7702 delegation designators.

use shared_types::{rlp, Address, Hash, U256};

/// Prefix of a delegation designator: `0xef0100 ‖ address`.
pub const DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];
pub const DELEGATION_CODE_LEN: usize = 23;

/// CREATE: `keccak256(rlp([sender, nonce]))[12..]`.
#[must_use]
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let encoded = rlp::encode_list(&[rlp::encode_address(sender), rlp::encode_u64(nonce)]);
    address_from_hash(&Hash::keccak(&encoded))
}

/// CREATE2: `keccak256(0xff ‖ sender ‖ salt ‖ keccak256(init_code))[12..]`.
#[must_use]
pub fn create2_address(sender: &Address, salt: U256, init_code_hash: &Hash) -> Address {
    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xff);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(Hash::from_u256(salt).as_bytes());
    preimage.extend_from_slice(init_code_hash.as_bytes());
    address_from_hash(&Hash::keccak(&preimage))
}

fn address_from_hash(hash: &Hash) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::new(bytes)
}

/// Target of a delegation designator, if `code` is one.
#[must_use]
pub fn delegation_target(code: &[u8]) -> Option<Address> {
    if code.len() == DELEGATION_CODE_LEN && code.starts_with(&DELEGATION_PREFIX) {
        Address::from_slice(&code[3..])
    } else {
        None
    }
}

#[must_use]
pub fn delegation_code(target: &Address) -> Vec<u8> {
    let mut code = DELEGATION_PREFIX.to_vec();
    code.extend_from_slice(target.as_bytes());
    code
}
