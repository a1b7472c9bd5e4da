//! # evm-block
//!
//! Transaction and block execution on top of the interpreter.
//!
//! ```text
//!                ┌──────────────┐
//!   Transaction ─┤    run_tx    ├─→ RunTxResult (receipt, fees)
//!                └──────┬───────┘
//!           ┌───────────┴───────────┐
//!   ┌───────┴──────┐         ┌──────┴──────┐
//!   │ BlockBuilder │         │  run_block  │
//!   │ (mine)       │         │  (replay)   │
//!   └──────────────┘         └─────────────┘
//! ```
//!
//! All three operate on a borrowed [`evm_state::StateManager`] and read
//! ancestor hashes from an [`evm_chain::Blockchain`]. Storing blocks in the
//! chain is left to the caller.

pub mod adapters;
pub mod builder;
pub mod domain;
pub mod errors;
pub mod run_block;
pub mod run_tx;

pub use adapters::ChainBlockHashes;
pub use builder::{BlockBuilder, BuildBlockOptions, BuildStatus, BuiltBlock};
pub use domain::{block_env, intrinsic_gas};
pub use errors::{BlockError, InvalidTransaction, Result};
pub use run_block::{run_block, RunBlockOptions, RunBlockResult};
pub use run_tx::{run_tx, RunTxOptions, RunTxResult};
