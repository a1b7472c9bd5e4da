//! # Modular Exponentiation (0x05)
//!
//! Input layout: `base_len ‖ exp_len ‖ mod_len` (32-byte words) followed by
//! the three big-endian operands. Missing bytes read as zero. Gas follows
//! EIP-2565.

use super::{charge, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;
use num_bigint::BigUint;
use primitive_types::U256;

const MIN_GAS: u64 = 200;

pub struct ModExp;

impl Precompile for ModExp {
    fn run(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let base_len = read_len(input, 0);
        let exp_len = read_len(input, 32);
        let mod_len = read_len(input, 64);

        let exp_offset = 96u64.saturating_add(base_len);
        let exp_head = read_padded(input, exp_offset, exp_len.min(32));
        let gas_used = charge(gas_cost(base_len, exp_len, mod_len, &exp_head), gas_limit)?;

        if mod_len == 0 {
            return Ok(PrecompileOutput::new(gas_used, Vec::new()));
        }

        // Gas bounds every length that reaches this point.
        let base = read_padded(input, 96, base_len);
        let exponent = read_padded(input, exp_offset, exp_len);
        let modulus = read_padded(input, exp_offset.saturating_add(exp_len), mod_len);

        Ok(PrecompileOutput::new(gas_used, mod_pow(&base, &exponent, &modulus)))
    }
}

/// Length word at `offset`, saturated to `u64`.
fn read_len(input: &[u8], offset: u64) -> u64 {
    let word = U256::from_big_endian(&read_padded(input, offset, 32));
    if word > U256::from(u64::MAX) {
        u64::MAX
    } else {
        word.low_u64()
    }
}

fn read_padded(input: &[u8], offset: u64, len: u64) -> Vec<u8> {
    let mut out = vec![0u8; usize::try_from(len).unwrap_or(usize::MAX)];
    if let Ok(offset) = usize::try_from(offset) {
        if offset < input.len() {
            let available = (input.len() - offset).min(out.len());
            out[..available].copy_from_slice(&input[offset..offset + available]);
        }
    }
    out
}

fn gas_cost(base_len: u64, exp_len: u64, mod_len: u64, exp_head: &[u8]) -> u64 {
    let words = u128::from(base_len.max(mod_len)).div_ceil(8);
    let complexity = words.saturating_mul(words);

    let head_bits = U256::from_big_endian(exp_head).bits() as u128;
    let iterations = if exp_len <= 32 {
        head_bits.saturating_sub(1)
    } else {
        (u128::from(exp_len) - 32)
            .saturating_mul(8)
            .saturating_add(head_bits.saturating_sub(1))
    };

    let gas = complexity.saturating_mul(iterations.max(1)) / 3;
    u64::try_from(gas).unwrap_or(u64::MAX).max(MIN_GAS)
}

/// `base^exponent mod modulus`, big-endian and left-padded to the
/// modulus width. A zero modulus yields zero.
fn mod_pow(base: &[u8], exponent: &[u8], modulus: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; modulus.len()];
    let m = BigUint::from_bytes_be(modulus);
    if m.bits() == 0 {
        return out;
    }
    let value = BigUint::from_bytes_be(base)
        .modpow(&BigUint::from_bytes_be(exponent), &m)
        .to_bytes_be();
    // Below the modulus, so never wider than it.
    let start = out.len() - value.len();
    out[start..].copy_from_slice(&value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(base: &[u8], exp: &[u8], modulus: &[u8]) -> Vec<u8> {
        let mut input = Vec::new();
        for len in [base.len(), exp.len(), modulus.len()] {
            let mut word = [0u8; 32];
            word[24..].copy_from_slice(&(len as u64).to_be_bytes());
            input.extend_from_slice(&word);
        }
        input.extend_from_slice(base);
        input.extend_from_slice(exp);
        input.extend_from_slice(modulus);
        input
    }

    // ===== RESULTS =====

    #[test]
    fn test_small_modexp() {
        let out = ModExp.run(&encode(&[3], &[5], &[7]), 1_000).unwrap();
        assert_eq!(out.output, vec![5]);
        assert_eq!(out.gas_used, MIN_GAS);
    }

    #[test]
    fn test_fermat_little_theorem() {
        let p = hex::decode("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f")
            .unwrap();
        let p_minus_1 =
            hex::decode("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2e")
                .unwrap();
        let out = ModExp.run(&encode(&[3], &p_minus_1, &p), 10_000).unwrap();
        let mut one = vec![0u8; 32];
        one[31] = 1;
        assert_eq!(out.output, one);
        assert_eq!(out.gas_used, 16 * 255 / 3);
    }

    #[test]
    fn test_wide_modulus() {
        let mut modulus = vec![0u8; 64];
        modulus[0] = 0x80;
        let out = ModExp.run(&encode(&[2], &[3], &modulus), 10_000).unwrap();
        assert_eq!(out.output.len(), 64);
        assert_eq!(out.output[63], 8);
        assert!(out.output[..63].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_missing_input_is_zero_padded() {
        let mut input = encode(&[2], &[3], &[0x0b]);
        input.pop();
        let out = ModExp.run(&input, 1_000).unwrap();
        assert_eq!(out.output, vec![0]);
    }

    #[test]
    fn test_zero_modulus_length_is_empty() {
        let out = ModExp.run(&encode(&[2], &[3], &[]), 1_000).unwrap();
        assert!(out.output.is_empty());
    }

    #[test]
    fn test_modulus_one() {
        let out = ModExp.run(&encode(&[9], &[0], &[1]), 1_000).unwrap();
        assert_eq!(out.output, vec![0]);
    }

    // ===== GAS =====

    #[test]
    fn test_huge_lengths_run_out_of_gas() {
        let mut input = vec![0u8; 96];
        input[32..64].copy_from_slice(&[0xff; 32]);
        input[95] = 1;
        assert_eq!(ModExp.run(&input, 10_000_000), Err(PrecompileError::OutOfGas));
    }

    #[test]
    fn test_full_width_operands_finish_quickly() {
        // (m - 1)^odd ≡ m - 1 (mod m), with the largest operands a block
        // worth of gas can pay for in one call.
        let modulus = vec![0xff; 1024];
        let mut base = modulus.clone();
        base[1023] = 0xfe;
        let exponent = vec![0xff; 32];

        let started = std::time::Instant::now();
        let out = ModExp.run(&encode(&base, &exponent, &modulus), 30_000_000).unwrap();
        let elapsed = started.elapsed();

        assert_eq!(out.output, base);
        assert_eq!(out.gas_used, 1_392_640);
        assert!(elapsed < std::time::Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn test_even_modulus() {
        // 7^3 = 343 = 1 * 256 + 87
        let out = ModExp.run(&encode(&[7], &[3], &[1, 0]), 1_000).unwrap();
        assert_eq!(out.output, vec![0, 87]);
    }
}
