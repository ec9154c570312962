//! Error types for the town runner.
//!
//! Uses `thiserror` for typed errors that surface through the runner:
//! configuration, LLM calls, prompt rendering, and response parsing.

use townsfolk_core::ConfigError;

/// Errors that can occur during runner operation.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Failed to render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The LLM response could not be parsed.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The YAML configuration file could not be loaded.
    #[error("config file error: {0}")]
    ConfigFile(#[from] ConfigError),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
