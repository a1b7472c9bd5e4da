//! Identity (0x04): returns its input. 15 + 3 per word.

use super::{charge, linear_cost, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;

pub struct Identity;

impl Precompile for Identity {
    fn run(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let gas_used = charge(linear_cost(input.len(), 15, 3), gas_limit)?;
        Ok(PrecompileOutput::new(gas_used, input.to_vec()))
    }
}
