//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are read from disk once at startup so the advisor's wording
//! can be tuned without recompiling. Each [`PromptKind`] pairs a system
//! template with a user template.

use minijinja::Environment;

use crate::error::RunnerError;

/// The two questions the advisor is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Should this agent leave the conversation now?
    EndDecision,
    /// What is the emotional tone of this message?
    Tone,
}

impl PromptKind {
    /// Every kind, in load order.
    pub const ALL: [Self; 2] = [Self::EndDecision, Self::Tone];

    const fn system_file(self) -> &'static str {
        match self {
            Self::EndDecision => "end_system.j2",
            Self::Tone => "tone_system.j2",
        }
    }

    const fn user_file(self) -> &'static str {
        match self {
            Self::EndDecision => "end_decision.j2",
            Self::Tone => "tone.j2",
        }
    }
}

/// Holds the loaded templates.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// A prompt ready to send to an LLM backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message framing the task.
    pub system: String,
    /// User message carrying the details.
    pub user: String,
}

impl PromptEngine {
    /// Load every template from `templates_dir`.
    ///
    /// The directory must contain `end_system.j2`, `end_decision.j2`,
    /// `tone_system.j2`, and `tone.j2`.
    pub fn new(templates_dir: &str) -> Result<Self, RunnerError> {
        let mut env = Environment::new();
        for kind in PromptKind::ALL {
            for file in [kind.system_file(), kind.user_file()] {
                let source = load_template(templates_dir, file)?;
                env.add_template_owned(file, source)
                    .map_err(|e| RunnerError::Template(format!("invalid template {file}: {e}")))?;
            }
        }
        Ok(Self { env })
    }

    /// Render both halves of `kind`'s prompt against `context`.
    pub fn render(
        &self,
        kind: PromptKind,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt, RunnerError> {
        Ok(RenderedPrompt {
            system: self.render_file(kind.system_file(), context)?,
            user: self.render_file(kind.user_file(), context)?,
        })
    }

    fn render_file(&self, file: &str, context: &serde_json::Value) -> Result<String, RunnerError> {
        self.env
            .get_template(file)
            .map_err(|e| RunnerError::Template(format!("missing template {file}: {e}")))?
            .render(context)
            .map_err(|e| RunnerError::Template(format!("{file} render failed: {e}")))
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, RunnerError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| RunnerError::Template(format!("failed to read {path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped_templates() -> String {
        format!("{}/templates", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn shipped_end_decision_template_renders() {
        let engine = PromptEngine::new(&shipped_templates());
        assert!(engine.is_ok(), "shipped templates should load");
        let Ok(engine) = engine else { return };

        let context = serde_json::json!({
            "agent_name": "Ada",
            "partner_name": "Brook",
            "personality": "Dry humor, short sentences.",
            "state": "Energy: 35%, Mood: 0.20",
            "relationship": null,
            "recent": [
                {"sender_name": "Brook", "content": "Did you see the fountain?"},
                {"sender_name": "Ada", "content": "Twice today."}
            ],
            "last_message": "Did you see the fountain?",
            "message_count": 7
        });
        let prompt = engine.render(PromptKind::EndDecision, &context);
        assert!(prompt.is_ok());
        let Ok(prompt) = prompt else { return };

        assert!(prompt.system.contains("JSON"));
        assert!(prompt.user.contains("You are Ada in a conversation with Brook"));
        assert!(prompt.user.contains("Ada: Twice today."));
        assert!(prompt.user.contains("New acquaintance"));
        assert!(prompt.user.contains("MESSAGE COUNT: 7"));
    }

    #[test]
    fn shipped_tone_template_renders() {
        let engine = PromptEngine::new(&shipped_templates());
        assert!(engine.is_ok(), "shipped templates should load");
        let Ok(engine) = engine else { return };
        let context = serde_json::json!({
            "sender_name": "Ada",
            "receiver_name": "Brook",
            "message": "You are the worst"
        });
        let prompt = engine.render(PromptKind::Tone, &context);
        assert!(prompt.is_ok_and(|p| p.user.contains("\"You are the worst\"")));
    }

    #[test]
    fn missing_template_returns_error() {
        let unique = format!(
            "townsfolk_missing_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("end_system.j2"), "only this one").ok();

        let result = PromptEngine::new(dir.to_str().unwrap_or(""));
        assert!(result.is_err(), "should fail when templates are missing");

        std::fs::remove_dir_all(&dir).ok();
    }
}
