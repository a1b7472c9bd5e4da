//! Pure chain rules: header validation and reorg descriptions.

pub mod update;
pub mod validation;

pub use update::{ChainUpdate, TxLocation};
pub use validation::{validate_header, GAS_LIMIT_BOUND_DIVISOR, MIN_GAS_LIMIT};
