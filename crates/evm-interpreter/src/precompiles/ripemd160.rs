//! RIPEMD-160 (0x03). 600 + 120 per word; the 20-byte digest is returned
//! left-padded to 32 bytes.

use super::{charge, linear_cost, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;

pub struct Ripemd160Hash;

impl Precompile for Ripemd160Hash {
    fn run(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let gas_used = charge(linear_cost(input.len(), 600, 120), gas_limit)?;
        let mut output = vec![0u8; 32];
        output[12..].copy_from_slice(&shared_crypto::ripemd160(input));
        Ok(PrecompileOutput::new(gas_used, output))
    }
}
