//! # evm-state
//!
//! World state for the local EVM runtime.
//!
//! ## Layout
//!
//! ```text
//!   checkpoint()          commit()             revert()
//!        │                   │                    │
//!        ▼                   ▼                    ▼
//!   ┌─────────┐  top   ┌─────────┐          ┌─────────┐
//!   │ Layer n │ ─────→ │Layer n-1│          │ dropped │
//!   └─────────┘ absorb └─────────┘          └─────────┘
//!        ⋮
//!   ┌──────────────────────────┐   cache miss   ┌────────────┐
//!   │  Committed base          │ ─────────────→ │ ForkClient │
//!   │  (roots, proofs, dumps)  │                └────────────┘
//!   └──────────────────────────┘
//! ```
//!
//! Accounts and storage authenticate through a Merkle-Patricia trie keyed by
//! `keccak256(address)` and `keccak256(slot)`.

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod state_manager;

pub use adapters::{ForkClient, ForkConfig, InMemoryForkBackend};
pub use domain::{
    ordered_trie_root, verify_proof, AccountDump, AccountProof, MerkleTrie, SecureTrie, StateDump,
    StorageProof,
};
pub use errors::StateError;
pub use ports::{BackendError, ForkBackend};
pub use state_manager::{AccountFields, StateManager};
