//! SHA-256 (0x02). 60 + 12 per word.

use super::{charge, linear_cost, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;

pub struct Sha256Hash;

impl Precompile for Sha256Hash {
    fn run(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let gas_used = charge(linear_cost(input.len(), 60, 12), gas_limit)?;
        Ok(PrecompileOutput::new(
            gas_used,
            shared_crypto::sha256(input).to_vec(),
        ))
    }
}
