//! Stock adapters for the pool's ports.

pub mod clock;
pub mod memory;

pub use clock::{ManualClock, SystemTimeSource};
pub use memory::InMemoryStateProvider;
