use shared_types::{Address, Hash};
use thiserror::Error;

/// Errors raised by the state store.
///
/// `NoCheckpoint` is an invariant violation: callers must treat it as fatal.
/// Backend failures (`Backend`, `ForkUnavailable`) always propagate and are
/// never reported as a missing account or slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Unbalanced {op}: no outstanding checkpoint")]
    NoCheckpoint { op: &'static str },

    #[error("Code not found for hash {0:?}")]
    CodeNotFound(Hash),

    #[error("Fork backend unavailable after {attempts} attempts: {reason}")]
    ForkUnavailable { attempts: u32, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid state dump for {address:?}: {reason}")]
    InvalidDump { address: Address, reason: String },

    #[error("Invalid proof: {0}")]
    InvalidProof(String),
}

pub type Result<T> = std::result::Result<T, StateError>;
