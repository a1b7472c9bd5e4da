pub mod outbound;

pub use outbound::{BackendError, ForkBackend};
