//! Conversation gates backed by the store, with an optional advisor.
//!
//! [`ConversationService`] looks up the relationship, runs the fixed-rule
//! gates from `townsfolk_agents::conversation`, and, where the rules defer,
//! asks a [`ConversationAdvisor`] (typically a language model). Advisor
//! calls are bounded by a timeout. A slow, failing, or missing advisor
//! degrades to the local rules; it never fails the call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use townsfolk_agents::{
    AcceptDecision, ConversationConfig, ConversationOutcome, EndReason, EndVerdict,
    InitiateDecision, MessageTone, Relationship, analyze_keywords, conversation_outcome,
    decide_accept, decide_initiate, evaluate_end, fallback_end, social,
};
use townsfolk_types::{AgentId, NeedEffects, SocialMemory, TranscriptMessage};
use tracing::{debug, info, warn};

use crate::config::TownsfolkConfig;
use crate::store::{AgentProfile, ContextSource, StateSink, StoreError};

/// Spoken when the advisor ends a conversation without a line of its own.
const ADVISOR_FAREWELL: &str = "Gotta run, talk later!";

// ---------------------------------------------------------------------------
// Advisor interface
// ---------------------------------------------------------------------------

/// Errors from a conversation advisor.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    /// The advisor is not configured or not reachable.
    #[error("advisor unavailable: {reason}")]
    Unavailable {
        /// What went wrong.
        reason: String,
    },

    /// The backend answered with an error.
    #[error("advisor backend error: {message}")]
    Backend {
        /// The backend's message.
        message: String,
    },

    /// The answer could not be understood.
    #[error("advisor response unparseable: {message}")]
    Parse {
        /// What failed to parse.
        message: String,
    },
}

/// Everything the advisor sees when asked whether to end a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndConsultation {
    /// The agent being asked.
    pub agent: AgentProfile,
    /// Who they are talking to.
    pub partner_name: String,
    /// The agent's edge toward the partner, if any.
    pub relationship: Option<SocialMemory>,
    /// The most recent messages, oldest first.
    pub recent: Vec<TranscriptMessage>,
    /// Total messages exchanged so far.
    pub message_count: usize,
}

/// The advisor's answer to an [`EndConsultation`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndAdvice {
    /// Whether to leave now.
    pub should_end: bool,
    /// What to say when leaving.
    pub farewell: Option<String>,
    /// Short justification, for logs.
    pub reason: Option<String>,
}

/// A single message to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAnalysisRequest {
    /// Who wrote it.
    pub sender_name: String,
    /// Who it was addressed to.
    pub receiver_name: String,
    /// The message text.
    pub message: String,
}

/// An external collaborator that can weigh in on conversations.
///
/// Implementations are expected to be slow and fallible; the service wraps
/// every call in a timeout and has a local answer for each.
pub trait ConversationAdvisor: Send + Sync {
    /// Decide whether the agent should end the conversation.
    fn advise_end(
        &self,
        request: &EndConsultation,
    ) -> impl Future<Output = Result<EndAdvice, AdvisorError>> + Send;

    /// Classify the tone of a message.
    fn analyze_message(
        &self,
        request: &MessageAnalysisRequest,
    ) -> impl Future<Output = Result<MessageTone, AdvisorError>> + Send;
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Whether a conversation ends this turn, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndDecision {
    /// Whether to leave.
    pub end: bool,
    /// What to say when leaving.
    pub farewell: Option<String>,
    /// Which rule, or the advisor, made the call.
    pub reason: Option<EndReason>,
}

impl From<EndVerdict> for EndDecision {
    fn from(verdict: EndVerdict) -> Self {
        match verdict {
            EndVerdict::End { farewell, reason } => Self {
                end: true,
                farewell: Some(farewell),
                reason: Some(reason),
            },
            EndVerdict::Continue | EndVerdict::Consult => Self {
                end: false,
                farewell: None,
                reason: None,
            },
        }
    }
}

/// Conversation gates over a shared store.
#[derive(Debug)]
pub struct ConversationService<S, A> {
    store: Arc<S>,
    advisor: Option<A>,
    config: ConversationConfig,
    timeout: Duration,
}

impl<S, A> ConversationService<S, A>
where
    S: ContextSource + StateSink,
    A: ConversationAdvisor,
{
    /// Create a service. With no advisor, every deferred decision goes to
    /// the local fallback.
    pub fn new(store: Arc<S>, advisor: Option<A>, config: &TownsfolkConfig) -> Self {
        Self {
            store,
            advisor,
            config: config.conversation.clone(),
            timeout: Duration::from_millis(config.advisor.timeout_ms),
        }
    }

    /// Look up `from -> to`. `None` means the store could not be read.
    fn lookup(&self, from: AgentId, to: AgentId) -> Option<Option<SocialMemory>> {
        match self.store.social_memory(from, to) {
            Ok(memory) => Some(memory),
            Err(e) => {
                warn!(from = %from, to = %to, error = %e, "social memory unavailable");
                None
            }
        }
    }

    /// Answer a conversation request from `requester`.
    pub fn accept(
        &self,
        agent: AgentId,
        requester: AgentId,
        requester_name: &str,
        rng: &mut impl Rng,
    ) -> AcceptDecision {
        let memory = self.lookup(agent, requester);
        let decision = decide_accept(relationship(memory.as_ref()), requester_name, &self.config, rng);
        debug!(
            agent_id = %agent,
            requester = %requester,
            accept = decision.accept,
            "conversation request answered"
        );
        decision
    }

    /// Decide whether `agent` opens a conversation with `target`.
    pub fn initiate(
        &self,
        agent: AgentId,
        target: AgentId,
        target_name: &str,
        rng: &mut impl Rng,
    ) -> InitiateDecision {
        let memory = self.lookup(agent, target);
        let decision = decide_initiate(relationship(memory.as_ref()), target_name, &self.config, rng);
        debug!(
            agent_id = %agent,
            target = %target,
            initiate = decision.initiate,
            "initiation decided"
        );
        decision
    }

    /// Decide whether `agent` ends its conversation with `partner`, given
    /// the transcript so far.
    pub async fn should_end(
        &self,
        agent: AgentId,
        partner: AgentId,
        partner_name: &str,
        transcript: &[TranscriptMessage],
        rng: &mut impl Rng,
    ) -> EndDecision {
        let message_count = transcript.len();
        let last_message = transcript.last().map_or("", |m| m.content.as_str());
        let memory = self.lookup(agent, partner);

        let verdict = evaluate_end(
            relationship(memory.as_ref()),
            message_count,
            last_message,
            partner_name,
            &self.config,
            rng,
        );
        if !matches!(verdict, EndVerdict::Consult) {
            return verdict.into();
        }

        let window_start = message_count.saturating_sub(self.config.advisor_window);
        let recent = transcript.get(window_start..).unwrap_or_default().to_vec();
        match self
            .consult(agent, partner_name, memory.flatten(), recent, message_count)
            .await
        {
            Some(advice) if advice.should_end => {
                info!(
                    agent_id = %agent,
                    partner = %partner,
                    message_count,
                    reason = advice.reason.as_deref().unwrap_or(""),
                    "advisor ended conversation"
                );
                EndDecision {
                    end: true,
                    farewell: Some(
                        advice
                            .farewell
                            .unwrap_or_else(|| ADVISOR_FAREWELL.to_owned()),
                    ),
                    reason: Some(EndReason::Advisor),
                }
            }
            Some(_) => EndDecision::from(EndVerdict::Continue),
            None => fallback_end(message_count, &self.config).into(),
        }
    }

    async fn consult(
        &self,
        agent: AgentId,
        partner_name: &str,
        relationship: Option<SocialMemory>,
        recent: Vec<TranscriptMessage>,
        message_count: usize,
    ) -> Option<EndAdvice> {
        let advisor = self.advisor.as_ref()?;
        let profile = match self.store.agent_profile(agent) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(agent_id = %agent, error = %e, "no profile for end consultation");
                return None;
            }
        };
        let request = EndConsultation {
            agent: profile,
            partner_name: partner_name.to_owned(),
            relationship,
            recent,
            message_count,
        };
        match tokio::time::timeout(self.timeout, advisor.advise_end(&request)).await {
            Ok(Ok(advice)) => Some(advice),
            Ok(Err(e)) => {
                warn!(agent_id = %agent, error = %e, "end advisor failed, using fallback");
                None
            }
            Err(_elapsed) => {
                warn!(
                    agent_id = %agent,
                    timeout_ms = self.timeout.as_millis(),
                    "end advisor timed out, using fallback"
                );
                None
            }
        }
    }

    /// Classify a message and apply its effects: both moods move, and a
    /// rude message sours the receiver's memory of the sender.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the effects cannot be written.
    pub async fn analyze_message(
        &self,
        sender: AgentId,
        receiver: AgentId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<MessageTone, StoreError> {
        let tone = self.classify(sender, receiver, message).await;

        self.store.apply_need_delta(receiver, &mood(tone.receiver_mood_change))?;
        self.store.apply_need_delta(sender, &mood(tone.sender_mood_change))?;
        if let Some(update) = tone.receiver_memory_update() {
            self.store.upsert_social_memory(
                receiver,
                sender,
                &update,
                social::CONVERSATION_BASELINE,
                now,
            )?;
            info!(sender = %sender, receiver = %receiver, "rude message recorded");
        }
        Ok(tone)
    }

    async fn classify(&self, sender: AgentId, receiver: AgentId, message: &str) -> MessageTone {
        let Some(advisor) = &self.advisor else {
            return analyze_keywords(message);
        };
        let name = |id: AgentId| {
            self.store
                .agent_profile(id)
                .map_or_else(|_missing| id.short(), |p| p.name)
        };
        let request = MessageAnalysisRequest {
            sender_name: name(sender),
            receiver_name: name(receiver),
            message: message.to_owned(),
        };
        match tokio::time::timeout(self.timeout, advisor.analyze_message(&request)).await {
            Ok(Ok(tone)) => tone,
            Ok(Err(e)) => {
                warn!(sender = %sender, error = %e, "message advisor failed, using keywords");
                analyze_keywords(message)
            }
            Err(_elapsed) => {
                warn!(
                    sender = %sender,
                    timeout_ms = self.timeout.as_millis(),
                    "message advisor timed out, using keywords"
                );
                analyze_keywords(message)
            }
        }
    }

    /// Record a finished conversation: both memory edges and both sides'
    /// need deltas.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if either participant is unknown or `a == b`.
    pub fn finish(
        &self,
        a: AgentId,
        b: AgentId,
        outcome: &ConversationOutcome,
        now: DateTime<Utc>,
    ) -> Result<(SocialMemory, SocialMemory), StoreError> {
        let edges = self.store.record_conversation(a, b, outcome, now)?;
        let effects = conversation_outcome(outcome.sentiment, outcome.quality, outcome.message_count);
        self.store.apply_need_delta(a, &effects)?;
        self.store.apply_need_delta(b, &effects)?;
        info!(
            a = %a,
            b = %b,
            sentiment = outcome.sentiment,
            messages = outcome.message_count,
            "conversation recorded"
        );
        Ok(edges)
    }
}

fn relationship(memory: Option<&Option<SocialMemory>>) -> Relationship<'_> {
    memory.map_or(Relationship::Unavailable, |m| Relationship::from_lookup(m.as_ref()))
}

const fn mood(change: f64) -> NeedEffects {
    NeedEffects {
        mood: change,
        ..NeedEffects::ZERO
    }
}

/// Placeholder advisor for services run without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvisor;

impl ConversationAdvisor for NoAdvisor {
    async fn advise_end(&self, _request: &EndConsultation) -> Result<EndAdvice, AdvisorError> {
        Err(AdvisorError::Unavailable {
            reason: "no advisor configured".to_owned(),
        })
    }

    async fn analyze_message(
        &self,
        _request: &MessageAnalysisRequest,
    ) -> Result<MessageTone, AdvisorError> {
        Err(AdvisorError::Unavailable {
            reason: "no advisor configured".to_owned(),
        })
    }
}
