//! # Shared Types Crate
//!
//! Chain data types used by the state store, the interpreter, the block
//! pipeline and the transaction pool.
//!
//! ## Contents
//!
//! | Module | Types |
//! |--------|-------|
//! | `primitives` | `Address`, `Hash`, `Bytes`, `U256` |
//! | `quantity` | `0x` hex quantities and data, serde adapters |
//! | `rlp` | RLP encoder and decoder |
//! | `account` | `Account`, empty-trie and empty-code constants |
//! | `log` / `bloom` | `Log`, 2048-bit `Bloom` |
//! | `transaction` | typed transactions (legacy, 2930, 1559, 4844, 7702) |
//! | `receipt` | `Receipt` and its typed encoding |
//! | `block` | `Header`, `Block`, `Withdrawal`, base fee math |

pub mod account;
pub mod block;
pub mod bloom;
pub mod errors;
pub mod log;
pub mod primitives;
pub mod quantity;
pub mod receipt;
pub mod rlp;
pub mod transaction;

pub use account::{Account, EMPTY_CODE_HASH, EMPTY_ROOT};
pub use block::{Block, Header, Withdrawal};
pub use bloom::Bloom;
pub use errors::{QuantityError, RlpError, TxError};
pub use log::Log;
pub use primitives::{Address, Bytes, Hash, U256};
pub use receipt::Receipt;
pub use transaction::{AccessListItem, Authorization, Transaction, TxSignature, TxType};
