//! The LLM-backed [`ConversationAdvisor`].
//!
//! Renders a prompt, sends it to the configured backend, and parses the
//! reply. Every failure surfaces as an [`AdvisorError`]; the conversation
//! service decides what to do instead.

use townsfolk_agents::MessageTone;
use townsfolk_core::{
    AdvisorError, ConversationAdvisor, EndAdvice, EndConsultation, MessageAnalysisRequest,
};
use tracing::debug;

use crate::error::RunnerError;
use crate::llm::LlmClient;
use crate::parse::{parse_end_advice, parse_tone};
use crate::prompt::{PromptEngine, PromptKind};

/// Longest personality summary quoted in a prompt, in characters.
const SUMMARY_CHARS: usize = 300;

/// Longest relationship note quoted in a prompt, in characters.
const NOTES_CHARS: usize = 200;

/// Answers conversation questions by asking a language model.
pub struct LlmAdvisor {
    client: LlmClient,
    prompts: PromptEngine,
}

impl LlmAdvisor {
    /// Create an advisor from a client and loaded templates.
    pub const fn new(client: LlmClient, prompts: PromptEngine) -> Self {
        Self { client, prompts }
    }

    async fn ask(&self, kind: PromptKind, context: &serde_json::Value) -> Result<String, RunnerError> {
        let prompt = self.prompts.render(kind, context)?;
        let reply = self.client.complete(&prompt).await?;
        debug!(backend = self.client.name(), ?kind, reply = %reply, "advisor replied");
        Ok(reply)
    }
}

impl ConversationAdvisor for LlmAdvisor {
    async fn advise_end(&self, request: &EndConsultation) -> Result<EndAdvice, AdvisorError> {
        let reply = self
            .ask(PromptKind::EndDecision, &end_context(request))
            .await
            .map_err(advisor_error)?;
        parse_end_advice(&reply).map_err(advisor_error)
    }

    async fn analyze_message(
        &self,
        request: &MessageAnalysisRequest,
    ) -> Result<MessageTone, AdvisorError> {
        let context = serde_json::json!({
            "sender_name": request.sender_name,
            "receiver_name": request.receiver_name,
            "message": request.message,
        });
        let reply = self
            .ask(PromptKind::Tone, &context)
            .await
            .map_err(advisor_error)?;
        parse_tone(&reply).map_err(advisor_error)
    }
}

/// Template context for an end-of-conversation question.
fn end_context(request: &EndConsultation) -> serde_json::Value {
    let personality = &request.agent.personality;
    let mut description = personality
        .profile_summary
        .as_deref()
        .map(|s| truncate(s, SUMMARY_CHARS))
        .unwrap_or_default();
    if let Some(style) = &personality.communication_style {
        if !description.is_empty() {
            description.push('\n');
        }
        description.push_str("Communication style: ");
        description.push_str(style);
    }

    let needs = &request.agent.needs;
    let state = format!(
        "Energy: {:.0}%, Mood: {:.2}",
        needs.energy * 100.0,
        needs.mood
    );

    let relationship = request.relationship.as_ref().map(|memory| {
        let mut text = format!(
            "Sentiment toward {}: {:.2}",
            request.partner_name, memory.sentiment
        );
        if let Some(notes) = &memory.relationship_notes {
            text.push_str("\nRelationship: ");
            text.push_str(&truncate(notes, NOTES_CHARS));
        }
        text
    });

    let recent: Vec<serde_json::Value> = request
        .recent
        .iter()
        .map(|m| serde_json::json!({"sender_name": m.sender_name, "content": m.content}))
        .collect();
    let last_message = request
        .recent
        .iter()
        .rev()
        .find(|m| m.sender_name != request.agent.name)
        .map(|m| m.content.clone());

    serde_json::json!({
        "agent_name": request.agent.name,
        "partner_name": request.partner_name,
        "personality": (!description.is_empty()).then_some(description),
        "state": state,
        "relationship": relationship,
        "recent": recent,
        "last_message": last_message,
        "message_count": request.message_count,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn advisor_error(error: RunnerError) -> AdvisorError {
    match error {
        RunnerError::Parse(message) => AdvisorError::Parse { message },
        RunnerError::LlmBackend(message) => AdvisorError::Backend { message },
        other => AdvisorError::Unavailable {
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use townsfolk_core::AgentProfile;
    use townsfolk_types::{AgentId, NeedSnapshot, Personality, SocialMemory, TranscriptMessage};

    use super::*;

    fn consultation() -> EndConsultation {
        let me = AgentId::new();
        let them = AgentId::new();
        let mut personality = Personality::with_defaults(me);
        personality.profile_summary = Some("x".repeat(400));
        personality.communication_style = Some("terse".to_owned());
        EndConsultation {
            agent: AgentProfile {
                name: "Ada".to_owned(),
                personality,
                needs: NeedSnapshot {
                    energy: 0.42,
                    hunger: 0.1,
                    loneliness: 0.3,
                    mood: 0.25,
                },
            },
            partner_name: "Brook".to_owned(),
            relationship: Some(SocialMemory {
                from: me,
                to: them,
                sentiment: 0.6,
                familiarity: 0.4,
                interaction_count: 3,
                last_interaction: None,
                last_topic: None,
                mutual_interests: Vec::new(),
                relationship_notes: Some("Old friends from the market".to_owned()),
                conversation_summary: None,
            }),
            recent: vec![
                TranscriptMessage {
                    sender_id: them,
                    sender_name: "Brook".to_owned(),
                    content: "Lovely day".to_owned(),
                },
                TranscriptMessage {
                    sender_id: me,
                    sender_name: "Ada".to_owned(),
                    content: "It is".to_owned(),
                },
            ],
            message_count: 8,
        }
    }

    fn field<'a>(ctx: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
        ctx.get(name).unwrap()
    }

    #[test]
    fn end_context_summarizes_the_agent() {
        let ctx = end_context(&consultation());
        let personality = field(&ctx, "personality").as_str().unwrap();
        assert!(personality.starts_with(&"x".repeat(SUMMARY_CHARS)));
        assert!(!personality.contains(&"x".repeat(301)));
        assert!(personality.ends_with("\nCommunication style: terse"));
        assert_eq!(field(&ctx, "state"), "Energy: 42%, Mood: 0.25");
        assert_eq!(
            field(&ctx, "relationship"),
            "Sentiment toward Brook: 0.60\nRelationship: Old friends from the market"
        );
        assert_eq!(field(&ctx, "last_message"), "Lovely day");
        assert_eq!(field(&ctx, "message_count").as_u64(), Some(8));
        assert_eq!(field(&ctx, "recent").as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn strangers_have_no_relationship_text() {
        let mut request = consultation();
        request.relationship = None;
        request.agent.personality.profile_summary = None;
        request.agent.personality.communication_style = None;
        let ctx = end_context(&request);
        assert!(field(&ctx, "relationship").is_null());
        assert!(field(&ctx, "personality").is_null());
    }

    #[test]
    fn runner_errors_map_to_advisor_errors() {
        assert!(matches!(
            advisor_error(RunnerError::Parse("bad".to_owned())),
            AdvisorError::Parse { .. }
        ));
        assert!(matches!(
            advisor_error(RunnerError::LlmBackend("503".to_owned())),
            AdvisorError::Backend { .. }
        ));
        assert!(matches!(
            advisor_error(RunnerError::Template("missing".to_owned())),
            AdvisorError::Unavailable { .. }
        ));
    }
}
