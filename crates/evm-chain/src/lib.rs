//! # evm-chain
//!
//! Block tree and canonical chain for the local runtime.
//!
//! ```text
//!              ┌── a1 ── a2            put_block(b3):
//!   genesis ───┤                         removed = [a2, a1]
//!              └── b1 ── b2 ── b3        added   = [b1, b2, b3]
//! ```
//!
//! The heaviest chain is the one with the highest block number. Ties keep
//! the current head. Header rules live in [`validate_header`] and are
//! applied by the block pipeline, not by [`Blockchain::put_block`].

pub mod blockchain;
pub mod domain;
pub mod errors;

pub use blockchain::{Blockchain, BLOCK_HASH_WINDOW};
pub use domain::{validate_header, ChainUpdate, TxLocation, GAS_LIMIT_BOUND_DIVISOR, MIN_GAS_LIMIT};
pub use errors::ChainError;
