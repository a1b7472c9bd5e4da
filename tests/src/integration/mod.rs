//! Cross-crate integration tests.

pub mod node_flows;
pub mod properties;
pub mod scenarios;
