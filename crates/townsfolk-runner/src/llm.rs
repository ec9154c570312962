//! HTTP clients for the model that advises conversations.
//!
//! Both supported wire formats are small enough that one client handles
//! them: the backend type only changes the endpoint path, the auth headers,
//! the placement of the system prompt, and where the reply text lives in
//! the response body.

use serde::Deserialize;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::RunnerError;
use crate::prompt::RenderedPrompt;

/// Advice replies are a short JSON object.
const MAX_TOKENS: u32 = 256;

/// Low temperature keeps the verdicts stable between calls.
const TEMPERATURE: f64 = 0.2;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A chat-completion client for one configured backend.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    backend: BackendType,
    api_url: String,
    api_key: String,
    model: String,
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl LlmClient {
    /// Create a client for the configured backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            backend: config.backend_type,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &'static str {
        match self.backend {
            BackendType::OpenAi => "openai-compatible",
            BackendType::Anthropic => "anthropic",
        }
    }

    /// Send `prompt` and return the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::LlmBackend`] if the request fails, the
    /// backend answers with a non-success status, or the reply carries no
    /// text.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        let request = match self.backend {
            BackendType::OpenAi => self
                .http
                .post(format!("{}/chat/completions", self.api_url))
                .bearer_auth(&self.api_key)
                .json(&self.openai_body(prompt)),
            BackendType::Anthropic => self
                .http
                .post(format!("{}/messages", self.api_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&self.anthropic_body(prompt)),
        };

        let response = request
            .send()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("{} request failed: {e}", self.name())))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_unreadable| "<unreadable body>".to_owned());
            return Err(RunnerError::LlmBackend(format!(
                "{} returned {status}: {detail}",
                self.name()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("{} sent invalid JSON: {e}", self.name())))?;
        reply_text(self.backend, body)
    }

    fn openai_body(&self, prompt: &RenderedPrompt) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"}
        })
    }

    fn anthropic_body(&self, prompt: &RenderedPrompt) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "system": prompt.system,
            "messages": [{"role": "user", "content": prompt.user}],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS
        })
    }
}

/// Pull the reply text out of a response body in `backend`'s format.
fn reply_text(backend: BackendType, body: serde_json::Value) -> Result<String, RunnerError> {
    let text = match backend {
        BackendType::OpenAi => serde_json::from_value::<OpenAiResponse>(body)?
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content),
        BackendType::Anthropic => serde_json::from_value::<AnthropicResponse>(body)?
            .content
            .into_iter()
            .find_map(|b| b.text),
    };
    text.filter(|t| !t.trim().is_empty())
        .ok_or_else(|| RunnerError::LlmBackend("reply contained no text".to_owned()))
}
