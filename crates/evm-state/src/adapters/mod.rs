pub mod fork_client;
pub mod memory_backend;

pub use fork_client::{ForkClient, ForkConfig};
pub use memory_backend::InMemoryForkBackend;
