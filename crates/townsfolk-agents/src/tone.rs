//! Emotional tone of a single conversation message.
//!
//! [`MessageTone`] is what the advisor returns when it analyzes a message.
//! [`analyze_keywords`] produces the same shape from a fixed word list and
//! is used whenever the advisor is absent, slow, or failing.

use serde::{Deserialize, Serialize};

use crate::social::MemoryUpdate;

/// Words that mark a message as rude. Rudeness wins over positivity.
const RUDE_WORDS: &[&str] = &[
    "hate", "stupid", "idiot", "dumb", "ugly", "loser", "shut up", "suck", "terrible", "worst",
    "annoying", "boring", "lame",
];

/// Words that mark a message as positive.
const POSITIVE_WORDS: &[&str] = &[
    "love",
    "amazing",
    "awesome",
    "great",
    "wonderful",
    "fantastic",
    "beautiful",
    "fun",
    "happy",
    "thanks",
    "appreciate",
    "nice",
    "cool",
];

/// Tone of one message and its immediate effect on both moods.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageTone {
    /// Overall tone in `[-1, 1]`.
    #[serde(default)]
    pub sentiment: f64,
    /// Mean, insulting, or hurtful.
    #[serde(default)]
    pub is_rude: bool,
    /// Kind, supportive, or encouraging.
    #[serde(default)]
    pub is_positive: bool,
    /// Mood change for whoever received the message.
    #[serde(default)]
    pub receiver_mood_change: f64,
    /// Mood change for whoever sent it.
    #[serde(default)]
    pub sender_mood_change: f64,
}

impl MessageTone {
    /// A message with no emotional weight.
    pub const NEUTRAL: Self = Self {
        sentiment: 0.0,
        is_rude: false,
        is_positive: false,
        receiver_mood_change: 0.0,
        sender_mood_change: 0.0,
    };

    /// The receiver's memory penalty toward the sender, for rude messages.
    pub fn receiver_memory_update(&self) -> Option<MemoryUpdate> {
        self.is_rude.then(MemoryUpdate::rude_message)
    }
}

/// Classify a message by keyword. Matching is case-insensitive substring
/// matching, so "coolest" counts as positive.
pub fn analyze_keywords(message: &str) -> MessageTone {
    let lower = message.to_lowercase();
    if RUDE_WORDS.iter().any(|w| lower.contains(w)) {
        MessageTone {
            sentiment: -0.5,
            is_rude: true,
            is_positive: false,
            receiver_mood_change: -0.10,
            sender_mood_change: 0.0,
        }
    } else if POSITIVE_WORDS.iter().any(|w| lower.contains(w)) {
        MessageTone {
            sentiment: 0.5,
            is_rude: false,
            is_positive: true,
            receiver_mood_change: 0.05,
            sender_mood_change: 0.03,
        }
    } else {
        MessageTone::NEUTRAL
    }
}
