//! # ecrecover (0x01)
//!
//! Input, right-padded to 128 bytes: `hash ‖ v ‖ r ‖ s`. `v` must be the
//! word 27 or 28. Any malformed signature yields empty output and still
//! costs the fixed 3000 gas.

use super::{charge, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;
use shared_crypto::{recover_address, RecoverableSignature};

const ECRECOVER_GAS: u64 = 3_000;

pub struct EcRecover;

impl Precompile for EcRecover {
    fn run(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let gas_used = charge(ECRECOVER_GAS, gas_limit)?;
        let mut padded = [0u8; 128];
        let len = input.len().min(128);
        padded[..len].copy_from_slice(&input[..len]);

        Ok(PrecompileOutput::new(
            gas_used,
            recover(&padded).map(|a| a.to_vec()).unwrap_or_default(),
        ))
    }
}

fn recover(input: &[u8; 128]) -> Option<[u8; 32]> {
    let v = &input[32..64];
    if v[..31].iter().any(|b| *b != 0) || !matches!(v[31], 27 | 28) {
        return None;
    }
    let mut hash = [0u8; 32];
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    hash.copy_from_slice(&input[..32]);
    r.copy_from_slice(&input[64..96]);
    s.copy_from_slice(&input[96..128]);

    let signature = RecoverableSignature::new(v[31] - 27, r, s);
    let address = recover_address(&hash, &signature).ok()?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address);
    Some(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::Secp256k1KeyPair;

    fn signed_input(key: &Secp256k1KeyPair, hash: [u8; 32]) -> Vec<u8> {
        let sig = key.sign_prehash(&hash).unwrap();
        let mut input = hash.to_vec();
        let mut v = [0u8; 32];
        v[31] = 27 + sig.y_parity;
        input.extend_from_slice(&v);
        input.extend_from_slice(&sig.r);
        input.extend_from_slice(&sig.s);
        input
    }

    #[test]
    fn test_ecrecover_roundtrip() {
        let key = Secp256k1KeyPair::generate();
        let out = EcRecover.run(&signed_input(&key, [7u8; 32]), 5_000).unwrap();
        assert_eq!(out.gas_used, ECRECOVER_GAS);
        assert_eq!(&out.output[12..], &key.address());
        assert_eq!(&out.output[..12], &[0u8; 12]);
    }

    #[test]
    fn test_ecrecover_invalid_v_is_empty() {
        let key = Secp256k1KeyPair::generate();
        let mut input = signed_input(&key, [7u8; 32]);
        input[63] = 29;
        let out = EcRecover.run(&input, 5_000).unwrap();
        assert!(out.output.is_empty());
        assert_eq!(out.gas_used, ECRECOVER_GAS);
    }

    #[test]
    fn test_ecrecover_zero_signature_is_empty() {
        let mut input = [0u8; 128];
        input[63] = 27;
        assert!(EcRecover.run(&input, 5_000).unwrap().output.is_empty());
    }

    #[test]
    fn test_ecrecover_out_of_gas() {
        assert_eq!(EcRecover.run(&[], 2_999), Err(PrecompileError::OutOfGas));
    }
}
