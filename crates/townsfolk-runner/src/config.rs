//! Configuration types for the town runner.
//!
//! Tuning lives in `townsfolk.yaml` (see [`townsfolk_core::config`]). The
//! runner's own settings come from environment variables: where that file
//! is, which LLM backend advises conversations, and the shape of the demo
//! population.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use townsfolk_core::TownsfolkConfig;

use crate::error::RunnerError;

/// Complete runner configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the YAML tuning file.
    pub config_path: PathBuf,
    /// LLM backend for the conversation advisor. `None` runs on the local
    /// rules alone.
    pub llm: Option<LlmBackendConfig>,
    /// Overrides `advisor.timeout_ms` from the YAML file.
    pub advisor_timeout_ms: Option<u64>,
    /// Time between polls of each agent.
    pub poll_interval: Duration,
    /// Number of agents in the demo town.
    pub demo_agents: usize,
    /// Polls per agent before the demo ends.
    pub demo_ticks: u32,
    /// Base seed for every agent's random source.
    pub seed: u64,
    /// Path to the prompt templates directory.
    pub templates_dir: String,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type (openai, anthropic).
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
}

impl FromStr for BackendType {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(RunnerError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `TOWNSFOLK_CONFIG` -- YAML tuning file (default `townsfolk.yaml`)
    /// - `LLM_BACKEND`, `LLM_API_URL`, `LLM_API_KEY`, `LLM_MODEL` -- the
    ///   advisor backend; all four must be set to enable it
    /// - `ADVISOR_TIMEOUT_MS` -- advisor deadline in milliseconds
    /// - `POLL_INTERVAL_MS` -- time between polls (default 1000)
    /// - `DEMO_AGENTS` -- population size (default 6)
    /// - `DEMO_TICKS` -- polls per agent (default 30)
    /// - `SEED` -- base random seed (default 42)
    /// - `TEMPLATES_DIR` -- prompt templates (default
    ///   `crates/townsfolk-runner/templates`)
    pub fn from_env() -> Result<Self, RunnerError> {
        let config_path = std::env::var("TOWNSFOLK_CONFIG")
            .map_or_else(|_| PathBuf::from("townsfolk.yaml"), PathBuf::from);

        let llm = load_backend_config()?;

        let advisor_timeout_ms = std::env::var("ADVISOR_TIMEOUT_MS")
            .ok()
            .map(|v| parse_var("ADVISOR_TIMEOUT_MS", &v))
            .transpose()?;

        let poll_interval_ms: u64 = env_or("POLL_INTERVAL_MS", "1000")?;
        let demo_agents: usize = env_or("DEMO_AGENTS", "6")?;
        let demo_ticks: u32 = env_or("DEMO_TICKS", "30")?;
        let seed: u64 = env_or("SEED", "42")?;

        let templates_dir = std::env::var("TEMPLATES_DIR")
            .unwrap_or_else(|_| "crates/townsfolk-runner/templates".to_owned());

        Ok(Self {
            config_path,
            llm,
            advisor_timeout_ms,
            poll_interval: Duration::from_millis(poll_interval_ms),
            demo_agents,
            demo_ticks,
            seed,
            templates_dir,
        })
    }

    /// Load the tuning file, falling back to the defaults when it does not
    /// exist, then apply environment overrides.
    pub fn load_tuning(&self) -> Result<TownsfolkConfig, RunnerError> {
        let mut tuning = if self.config_path.exists() {
            TownsfolkConfig::from_file(&self.config_path)?
        } else {
            TownsfolkConfig::default()
        };
        if let Some(timeout_ms) = self.advisor_timeout_ms {
            tuning.advisor.timeout_ms = timeout_ms;
        }
        Ok(tuning)
    }
}

/// Read an optional variable, parsing `default` when it is unset.
fn env_or<T>(name: &str, default: &str) -> Result<T, RunnerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_owned());
    parse_var(name, &raw)
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, RunnerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| RunnerError::Config(format!("invalid {name}: {e}")))
}

/// Load the advisor backend. Returns `None` unless the backend variable is
/// set; once it is, the other three are required.
fn load_backend_config() -> Result<Option<LlmBackendConfig>, RunnerError> {
    let Ok(backend) = std::env::var("LLM_BACKEND") else {
        return Ok(None);
    };
    let required = |name: &str| {
        std::env::var(name)
            .map_err(|e| RunnerError::Config(format!("missing required env var {name}: {e}")))
    };
    Ok(Some(LlmBackendConfig {
        backend_type: backend.parse()?,
        api_url: required("LLM_API_URL")?,
        api_key: required("LLM_API_KEY")?,
        model: required("LLM_MODEL")?,
    }))
}
