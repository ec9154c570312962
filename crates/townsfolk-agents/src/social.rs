//! Directed social memory: lazy creation, bounded updates, merges.
//!
//! Each ordered pair of avatars has at most one [`SocialMemory`] edge. The
//! reverse edge is a separate record that evolves on its own. Scores are
//! clamped on every update (sentiment to `[-1, 1]`, familiarity to
//! `[0, 1]`), so repeated deltas never drift out of range.

use chrono::{DateTime, Utc};
use townsfolk_types::{AgentId, SocialMemory};
use tracing::debug;

use crate::error::AgentError;
use crate::needs::{clamp_signed, clamp_unit};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Starting sentiment for an edge created by the tick executor.
pub const TICK_BASELINE: f64 = 0.5;

/// Starting sentiment for an edge created from a conversation outcome.
pub const CONVERSATION_BASELINE: f64 = 0.0;

/// Separator placed between appended conversation summaries.
pub const SUMMARY_SEPARATOR: &str = "\n---\n";

/// Sentiment delta applied toward the author of a rude message.
const RUDE_SENTIMENT_DELTA: f64 = -0.1;

/// Familiarity delta applied alongside a rude-message penalty.
const RUDE_FAMILIARITY_DELTA: f64 = 0.01;

/// Fraction of the conversation sentiment applied to each edge.
const OUTCOME_SENTIMENT_SCALE: f64 = 0.2;

/// Familiarity gained by both sides from any finished conversation.
const OUTCOME_FAMILIARITY_DELTA: f64 = 0.05;

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// One interaction's worth of change to a directed edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUpdate {
    /// Added to sentiment.
    pub sentiment_delta: f64,
    /// Added to familiarity.
    pub familiarity_delta: f64,
    /// Replaces the last topic when present.
    pub topic: Option<String>,
    /// Merged into the mutual interests.
    pub mutual_interests: Vec<String>,
    /// Replaces the relationship notes when present.
    pub relationship_notes: Option<String>,
    /// Appended to the running summary when present.
    pub summary: Option<String>,
}

impl MemoryUpdate {
    /// A bare score update.
    pub const fn new(sentiment_delta: f64, familiarity_delta: f64) -> Self {
        Self {
            sentiment_delta,
            familiarity_delta,
            topic: None,
            mutual_interests: Vec::new(),
            relationship_notes: None,
            summary: None,
        }
    }

    /// Attach a topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// The penalty a receiver applies toward the author of a rude message.
    pub fn rude_message() -> Self {
        Self::new(RUDE_SENTIMENT_DELTA, RUDE_FAMILIARITY_DELTA).with_topic("received rude message")
    }
}

/// Apply `update` to the edge `from -> to`, creating it when absent.
///
/// A created edge starts at `baseline + sentiment_delta` with familiarity
/// equal to the familiarity delta and an interaction count of 1. An
/// existing edge gets the deltas added and its count incremented.
pub fn upsert(
    existing: Option<SocialMemory>,
    from: AgentId,
    to: AgentId,
    update: &MemoryUpdate,
    baseline: f64,
    now: DateTime<Utc>,
) -> Result<SocialMemory, AgentError> {
    if from == to {
        return Err(AgentError::SelfEdge(from));
    }

    let memory = match existing {
        Some(mut memory) => {
            memory.sentiment = clamp_signed(memory.sentiment + update.sentiment_delta);
            memory.familiarity = clamp_unit(memory.familiarity + update.familiarity_delta);
            memory.interaction_count = memory.interaction_count.saturating_add(1);
            memory.last_interaction = Some(now);
            if let Some(topic) = &update.topic {
                memory.last_topic = Some(topic.clone());
            }
            if let Some(notes) = &update.relationship_notes {
                memory.relationship_notes = Some(notes.clone());
            }
            if let Some(summary) = &update.summary {
                memory.conversation_summary =
                    Some(append_summary(memory.conversation_summary.take(), summary));
            }
            merge_interests(&mut memory.mutual_interests, &update.mutual_interests);
            memory
        }
        None => {
            let mut mutual_interests = Vec::new();
            merge_interests(&mut mutual_interests, &update.mutual_interests);
            SocialMemory {
                from,
                to,
                sentiment: clamp_signed(baseline + update.sentiment_delta),
                familiarity: clamp_unit(update.familiarity_delta),
                interaction_count: 1,
                last_interaction: Some(now),
                last_topic: update.topic.clone(),
                mutual_interests,
                relationship_notes: update.relationship_notes.clone(),
                conversation_summary: update.summary.clone(),
            }
        }
    };

    debug!(
        from = %from.short(),
        to = %to.short(),
        sentiment = memory.sentiment,
        familiarity = memory.familiarity,
        count = memory.interaction_count,
        "social memory updated"
    );
    Ok(memory)
}

/// Union `incoming` into `existing`, keeping first-seen order and dropping
/// duplicates and blanks.
pub fn merge_interests(existing: &mut Vec<String>, incoming: &[String]) {
    for interest in incoming {
        let trimmed = interest.trim();
        if trimmed.is_empty() || existing.iter().any(|e| e == trimmed) {
            continue;
        }
        existing.push(trimmed.to_owned());
    }
}

/// Append a summary to the running one.
pub fn append_summary(existing: Option<String>, addition: &str) -> String {
    match existing {
        Some(old) if !old.is_empty() => format!("{old}{SUMMARY_SEPARATOR}{addition}"),
        _ => addition.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Conversation outcomes
// ---------------------------------------------------------------------------

/// What a finished conversation left behind, as judged by the advisor or a
/// fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationOutcome {
    /// Overall tone in `[-1, 1]`.
    pub sentiment: f64,
    /// How substantial it was in `[0, 1]`.
    pub quality: f64,
    /// Transcript length.
    pub message_count: usize,
    /// Main topic.
    pub topic: Option<String>,
    /// Summary to append to both edges.
    pub summary: Option<String>,
    /// Interests both sides turned out to share.
    pub mutual_interests: Vec<String>,
    /// New relationship notes.
    pub relationship_notes: Option<String>,
}

impl ConversationOutcome {
    /// The update applied to each direction of the pair.
    pub fn memory_update(&self) -> MemoryUpdate {
        MemoryUpdate {
            sentiment_delta: clamp_signed(self.sentiment) * OUTCOME_SENTIMENT_SCALE,
            familiarity_delta: OUTCOME_FAMILIARITY_DELTA,
            topic: self.topic.clone(),
            mutual_interests: self.mutual_interests.clone(),
            relationship_notes: self.relationship_notes.clone(),
            summary: self.summary.clone(),
        }
    }
}

/// Apply a conversation outcome to both edges of a pair.
///
/// Returns `(a -> b, b -> a)`. Both sides end with the same interaction
/// count increment.
pub fn record_conversation(
    a_to_b: Option<SocialMemory>,
    b_to_a: Option<SocialMemory>,
    a: AgentId,
    b: AgentId,
    outcome: &ConversationOutcome,
    now: DateTime<Utc>,
) -> Result<(SocialMemory, SocialMemory), AgentError> {
    let update = outcome.memory_update();
    let forward = upsert(a_to_b, a, b, &update, CONVERSATION_BASELINE, now)?;
    let backward = upsert(b_to_a, b, a, &update, CONVERSATION_BASELINE, now)?;
    Ok((forward, backward))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_upsert_creates_edge_from_baseline() {
        let (a, b) = (AgentId::new(), AgentId::new());
        let now = Utc::now();
        let update = MemoryUpdate::new(0.05, 0.1).with_topic("conversation");
        let edge = upsert(None, a, b, &update, TICK_BASELINE, now).unwrap();
        assert!((edge.sentiment - 0.55).abs() < 1e-9);
        assert!((edge.familiarity - 0.1).abs() < 1e-9);
        assert_eq!(edge.interaction_count, 1);
        assert_eq!(edge.last_topic.as_deref(), Some("conversation"));
        assert_eq!(edge.last_interaction, Some(now));
    }

    #[test]
    fn repeated_upserts_clamp_and_count() {
        let (a, b) = (AgentId::new(), AgentId::new());
        let now = Utc::now();
        let update = MemoryUpdate::new(0.4, 0.4);
        let mut edge = upsert(None, a, b, &update, TICK_BASELINE, now).unwrap();
        for _ in 0..5 {
            edge = upsert(Some(edge), a, b, &update, TICK_BASELINE, now).unwrap();
        }
        assert!((edge.sentiment - 1.0).abs() < f64::EPSILON);
        assert!((edge.familiarity - 1.0).abs() < f64::EPSILON);
        assert_eq!(edge.interaction_count, 6);
    }

    #[test]
    fn self_edge_is_rejected() {
        let a = AgentId::new();
        let result = upsert(None, a, a, &MemoryUpdate::default(), 0.0, Utc::now());
        assert!(matches!(result, Err(AgentError::SelfEdge(id)) if id == a));
    }

    #[test]
    fn interests_merge_without_duplicates() {
        let mut interests = vec!["music".to_owned(), "hiking".to_owned()];
        merge_interests(
            &mut interests,
            &["hiking".to_owned(), " chess ".to_owned(), String::new()],
        );
        assert_eq!(interests, vec!["music", "hiking", "chess"]);
    }

    #[test]
    fn summaries_append_with_separator() {
        assert_eq!(append_summary(None, "first"), "first");
        assert_eq!(
            append_summary(Some("first".to_owned()), "second"),
            "first\n---\nsecond"
        );
    }

    #[test]
    fn notes_replace_and_summary_appends_on_existing_edge() {
        let (a, b) = (AgentId::new(), AgentId::new());
        let now = Utc::now();
        let first = MemoryUpdate {
            relationship_notes: Some("polite".to_owned()),
            summary: Some("talked about rain".to_owned()),
            ..MemoryUpdate::new(0.0, 0.05)
        };
        let second = MemoryUpdate {
            relationship_notes: Some("friendly".to_owned()),
            summary: Some("talked about songs".to_owned()),
            ..MemoryUpdate::new(0.0, 0.05)
        };
        let edge = upsert(None, a, b, &first, 0.0, now).unwrap();
        let edge = upsert(Some(edge), a, b, &second, 0.0, now).unwrap();
        assert_eq!(edge.relationship_notes.as_deref(), Some("friendly"));
        assert_eq!(
            edge.conversation_summary.as_deref(),
            Some("talked about rain\n---\ntalked about songs")
        );
    }

    #[test]
    fn conversation_updates_both_directions() {
        let (a, b) = (AgentId::new(), AgentId::new());
        let outcome = ConversationOutcome {
            sentiment: 0.5,
            quality: 0.5,
            message_count: 6,
            topic: Some("karaoke".to_owned()),
            mutual_interests: vec!["singing".to_owned()],
            ..ConversationOutcome::default()
        };
        let (ab, ba) = record_conversation(None, None, a, b, &outcome, Utc::now()).unwrap();
        assert_eq!((ab.from, ab.to), (a, b));
        assert_eq!((ba.from, ba.to), (b, a));
        assert!((ab.sentiment - 0.1).abs() < 1e-9);
        assert!((ba.familiarity - 0.05).abs() < 1e-9);
        assert_eq!(ab.interaction_count, ba.interaction_count);
        assert_eq!(ba.mutual_interests, vec!["singing"]);
    }

    #[test]
    fn rude_message_penalty() {
        let update = MemoryUpdate::rude_message();
        assert!((update.sentiment_delta + 0.1).abs() < f64::EPSILON);
        assert_eq!(update.topic.as_deref(), Some("received rude message"));
    }
}
