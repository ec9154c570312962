//! Error types for the townsfolk-agents crate.
//!
//! Need and memory operations clamp rather than fail wherever a sane value
//! exists. The variants here cover input that has no sane interpretation.

use townsfolk_types::AgentId;

/// Errors that can occur during agent state operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A need override was not a finite number.
    #[error("invalid value for {need}: {value}")]
    InvalidNeedValue {
        /// Which need was being set.
        need: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A social-memory edge would point from an agent to itself.
    #[error("agent {0} cannot hold a social memory about itself")]
    SelfEdge(AgentId),
}
