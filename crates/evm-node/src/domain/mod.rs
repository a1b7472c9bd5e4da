pub mod genesis;
pub mod requests;

pub use genesis::genesis_block;
pub use requests::{BlockTag, CallParams, CallResult, TransactionReceipt, TransactionRequest};
