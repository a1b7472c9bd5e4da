use crate::errors::{ChainError, Result};
use shared_types::Header;

/// Gas limit may move by strictly less than `parent / 1024` per block.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1024;

/// Floor for any block gas limit.
pub const MIN_GAS_LIMIT: u64 = 5000;

/// Check `header` against its parent.
///
/// Only consensus-independent rules are enforced: linkage, time, gas and the
/// EIP-1559 base fee. There is no proof-of-work or signer check.
pub fn validate_header(header: &Header, parent: &Header) -> Result<()> {
    let expected = parent.number + 1;
    if header.number != expected {
        return Err(ChainError::InvalidNumber {
            expected,
            got: header.number,
        });
    }

    let parent_hash = parent.hash();
    if header.parent_hash != parent_hash {
        return Err(ChainError::ParentHashMismatch {
            expected: parent_hash,
            got: header.parent_hash,
        });
    }

    if header.timestamp <= parent.timestamp {
        return Err(ChainError::TimestampNotIncreasing {
            parent: parent.timestamp,
            got: header.timestamp,
        });
    }

    if header.gas_used > header.gas_limit {
        return Err(ChainError::GasUsedExceedsLimit {
            used: header.gas_used,
            limit: header.gas_limit,
        });
    }

    let bound = parent.gas_limit / GAS_LIMIT_BOUND_DIVISOR;
    if header.gas_limit.abs_diff(parent.gas_limit) >= bound || header.gas_limit < MIN_GAS_LIMIT
    {
        return Err(ChainError::GasLimitOutOfBounds {
            parent: parent.gas_limit,
            got: header.gas_limit,
        });
    }

    let expected_fee = parent.calc_next_base_fee();
    if header.base_fee() != expected_fee {
        return Err(ChainError::BaseFeeMismatch {
            expected: expected_fee,
            got: header.base_fee(),
        });
    }

    Ok(())
}
