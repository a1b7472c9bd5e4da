//! # EVM Runtime Test Suite
//!
//! Unified test crate for behaviour that spans crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Keys, bytecode snippets, chain and state builders
//! └── integration/
//!     ├── scenarios.rs  # Deploy, intrinsic gas, pool gaps, reverted selfdestruct
//!     ├── properties.rs # proptest: checkpoint law, nonce order, reorg order
//!     └── node_flows.rs # EvmNode end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p evm-tests
//! cargo test -p evm-tests integration::properties
//! cargo bench -p evm-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
