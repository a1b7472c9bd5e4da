pub mod address;
pub mod gas;
pub mod journal;
pub mod memory;
pub mod message;
pub mod opcodes;
pub mod stack;

pub use address::{create2_address, create_address, delegation_code, delegation_target};
pub use gas::Gas;
pub use journal::{Journal, JournalCheckpoint};
pub use memory::Memory;
pub use message::{decode_revert_reason, BlockEnv, CallKind, ExecResult, Message, TxEnv};
pub use opcodes::Opcode;
pub use stack::Stack;
