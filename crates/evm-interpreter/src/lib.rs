//! # EVM Interpreter
//!
//! Synchronous bytecode interpreter up to Cancun.
//!
//! ## Architecture
//!
//! ```text
//! Message ──→ Evm::run_call ──→ Interpreter (one per frame)
//!                 │                   │
//!                 │                   ├── Stack / Memory / Gas
//!                 │                   └── CALL*/CREATE* ──→ Evm (recurse)
//!                 │
//!                 ├── StateManager   (checkpoint per frame)
//!                 ├── Journal        (warm sets, transient, logs, refunds)
//!                 ├── PrecompileRegistry
//!                 └── BlockHashProvider
//! ```
//!
//! Execution failures never escape as `Err`: they are recorded in
//! [`ExecResult::exception`]. Only state backend failures surface as
//! [`EvmError`].

pub mod domain;
pub mod errors;
pub mod evm;
mod interpreter;
pub mod ports;
pub mod precompiles;

pub use domain::gas::{self, costs};
pub use domain::{
    create2_address, create_address, decode_revert_reason, delegation_code, delegation_target,
    BlockEnv, CallKind, ExecResult, Journal, Message, TxEnv,
};
pub use errors::{EvmError, ExceptionError, PrecompileError};
pub use evm::Evm;
pub use ports::{BlockHashProvider, NoBlockHashes};
pub use precompiles::{Precompile, PrecompileOutput, PrecompileRegistry};
