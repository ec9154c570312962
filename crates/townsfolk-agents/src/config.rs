//! Tunable parameters for need dynamics and conversation gates.
//!
//! [`NeedsConfig`] and [`ConversationConfig`] bundle every constant the
//! need and conversation modules read, so that a deployment (or a test) can
//! swap in its own tuning. Both deserialize from the `needs:` and
//! `conversation:` sections of `townsfolk.yaml`; missing keys fall back to
//! the defaults documented on each field.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// How a need that may be disabled behaves over time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DriftPolicy {
    /// The need is held at a fixed value on every decay pass.
    Pinned {
        /// The value the need is reset to.
        value: f64,
    },
    /// The need moves by `rate` per reference interval.
    Drift {
        /// Change per reference interval. Energy falls by it, hunger rises.
        rate: f64,
    },
}

/// Configuration for time-based need decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedsConfig {
    /// Elapsed seconds that count as one full decay step (default: 300).
    #[serde(default = "default_reference_interval_secs")]
    pub reference_interval_secs: f64,

    /// Elapsed seconds assumed when the agent has never ticked (default: 300).
    #[serde(default = "default_reference_interval_secs")]
    pub default_elapsed_secs: f64,

    /// Loneliness added per reference interval (default: 0.02).
    #[serde(default = "default_loneliness_growth")]
    pub loneliness_growth: f64,

    /// Fraction of mood lost per reference interval (default: 0.005).
    #[serde(default = "default_mood_decay")]
    pub mood_decay: f64,

    /// Mood never decays below this (default: 0.3).
    #[serde(default = "default_mood_floor")]
    pub mood_floor: f64,

    /// Energy behavior (default: drift at 0.02).
    #[serde(default = "default_energy_policy")]
    pub energy: DriftPolicy,

    /// Hunger behavior (default: drift at 0.03).
    #[serde(default = "default_hunger_policy")]
    pub hunger: DriftPolicy,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            reference_interval_secs: default_reference_interval_secs(),
            default_elapsed_secs: default_reference_interval_secs(),
            loneliness_growth: default_loneliness_growth(),
            mood_decay: default_mood_decay(),
            mood_floor: default_mood_floor(),
            energy: default_energy_policy(),
            hunger: default_hunger_policy(),
        }
    }
}

impl NeedsConfig {
    /// Tuning for a population that never tires and never eats: energy is
    /// pinned at 1 and hunger at 0.
    pub fn social_only() -> Self {
        Self {
            energy: DriftPolicy::Pinned { value: 1.0 },
            hunger: DriftPolicy::Pinned { value: 0.0 },
            ..Self::default()
        }
    }
}

const fn default_reference_interval_secs() -> f64 {
    300.0
}

const fn default_loneliness_growth() -> f64 {
    0.02
}

const fn default_mood_decay() -> f64 {
    0.005
}

const fn default_mood_floor() -> f64 {
    0.3
}

const fn default_energy_policy() -> DriftPolicy {
    DriftPolicy::Drift { rate: 0.02 }
}

const fn default_hunger_policy() -> DriftPolicy {
    DriftPolicy::Drift { rate: 0.03 }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Thresholds and probabilities for the accept, initiate, and end gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Below this many messages a conversation only ends on hostility
    /// (default: 3).
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,

    /// At or above this many messages the conversation is ended (default: 10).
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Length beyond which the fallback ends a conversation when the advisor
    /// cannot be reached (default: 20).
    #[serde(default = "default_fallback_max_messages")]
    pub fallback_max_messages: usize,

    /// End probability at `min_messages` (default: 0.15).
    #[serde(default = "default_base_end_probability")]
    pub base_end_probability: f64,

    /// End probability added per message past `min_messages` (default: 0.10).
    #[serde(default = "default_end_probability_step")]
    pub end_probability_step: f64,

    /// Cap on the sampled end probability (default: 0.8).
    #[serde(default = "default_max_end_probability")]
    pub max_end_probability: f64,

    /// End probability when relationship data is unavailable (default: 0.2).
    #[serde(default = "default_unavailable_end_probability")]
    pub unavailable_end_probability: f64,

    /// How many trailing messages the advisor sees (default: 6).
    #[serde(default = "default_advisor_window")]
    pub advisor_window: usize,

    /// Chance of accepting a stranger's request (default: 0.9).
    #[serde(default = "default_stranger_accept_probability")]
    pub stranger_accept_probability: f64,

    /// Sentiment below which a request is likely declined (default: -0.3).
    #[serde(default = "default_hostile_accept_sentiment")]
    pub hostile_accept_sentiment: f64,

    /// Chance of declining a disliked requester (default: 0.7).
    #[serde(default = "default_hostile_decline_probability")]
    pub hostile_decline_probability: f64,

    /// Interaction count above which the agent sometimes wants a break
    /// (default: 5).
    #[serde(default = "default_frequent_interaction_count")]
    pub frequent_interaction_count: u32,

    /// Chance of declining or skipping a frequent partner (default: 0.3).
    #[serde(default = "default_frequent_skip_probability")]
    pub frequent_skip_probability: f64,

    /// Chance of accepting anyone else (default: 0.95).
    #[serde(default = "default_accept_probability")]
    pub accept_probability: f64,

    /// Familiarity above which greetings turn familiar (default: 0.5).
    #[serde(default = "default_familiar_familiarity")]
    pub familiar_familiarity: f64,

    /// Interaction count above which greetings turn familiar (default: 3).
    #[serde(default = "default_familiar_interaction_count")]
    pub familiar_interaction_count: u32,

    /// Chance of initiating without relationship data (default: 0.7).
    #[serde(default = "default_unavailable_initiate_probability")]
    pub unavailable_initiate_probability: f64,

    /// Chance of approaching a stranger (default: 0.9).
    #[serde(default = "default_stranger_initiate_probability")]
    pub stranger_initiate_probability: f64,

    /// Sentiment below which initiation is sometimes skipped (default: -0.5).
    #[serde(default = "default_hostile_initiate_sentiment")]
    pub hostile_initiate_sentiment: f64,

    /// Chance of skipping a disliked target (default: 0.5).
    #[serde(default = "default_hostile_skip_probability")]
    pub hostile_skip_probability: f64,

    /// Chance of initiating with anyone else (default: 0.85).
    #[serde(default = "default_initiate_probability")]
    pub initiate_probability: f64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            min_messages: default_min_messages(),
            max_messages: default_max_messages(),
            fallback_max_messages: default_fallback_max_messages(),
            base_end_probability: default_base_end_probability(),
            end_probability_step: default_end_probability_step(),
            max_end_probability: default_max_end_probability(),
            unavailable_end_probability: default_unavailable_end_probability(),
            advisor_window: default_advisor_window(),
            stranger_accept_probability: default_stranger_accept_probability(),
            hostile_accept_sentiment: default_hostile_accept_sentiment(),
            hostile_decline_probability: default_hostile_decline_probability(),
            frequent_interaction_count: default_frequent_interaction_count(),
            frequent_skip_probability: default_frequent_skip_probability(),
            accept_probability: default_accept_probability(),
            familiar_familiarity: default_familiar_familiarity(),
            familiar_interaction_count: default_familiar_interaction_count(),
            unavailable_initiate_probability: default_unavailable_initiate_probability(),
            stranger_initiate_probability: default_stranger_initiate_probability(),
            hostile_initiate_sentiment: default_hostile_initiate_sentiment(),
            hostile_skip_probability: default_hostile_skip_probability(),
            initiate_probability: default_initiate_probability(),
        }
    }
}

const fn default_min_messages() -> usize {
    3
}

const fn default_max_messages() -> usize {
    10
}

const fn default_fallback_max_messages() -> usize {
    20
}

const fn default_base_end_probability() -> f64 {
    0.15
}

const fn default_end_probability_step() -> f64 {
    0.10
}

const fn default_max_end_probability() -> f64 {
    0.8
}

const fn default_unavailable_end_probability() -> f64 {
    0.2
}

const fn default_advisor_window() -> usize {
    6
}

const fn default_stranger_accept_probability() -> f64 {
    0.9
}

const fn default_hostile_accept_sentiment() -> f64 {
    -0.3
}

const fn default_hostile_decline_probability() -> f64 {
    0.7
}

const fn default_frequent_interaction_count() -> u32 {
    5
}

const fn default_frequent_skip_probability() -> f64 {
    0.3
}

const fn default_accept_probability() -> f64 {
    0.95
}

const fn default_familiar_familiarity() -> f64 {
    0.5
}

const fn default_familiar_interaction_count() -> u32 {
    3
}

const fn default_unavailable_initiate_probability() -> f64 {
    0.7
}

const fn default_stranger_initiate_probability() -> f64 {
    0.9
}

const fn default_hostile_initiate_sentiment() -> f64 {
    -0.5
}

const fn default_hostile_skip_probability() -> f64 {
    0.5
}

const fn default_initiate_probability() -> f64 {
    0.85
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_needs_drift() {
        let cfg = NeedsConfig::default();
        assert!(matches!(cfg.energy, DriftPolicy::Drift { .. }));
        assert!(matches!(cfg.hunger, DriftPolicy::Drift { .. }));
        assert!((cfg.reference_interval_secs - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn social_only_pins_energy_and_hunger() {
        let cfg = NeedsConfig::social_only();
        assert_eq!(cfg.energy, DriftPolicy::Pinned { value: 1.0 });
        assert_eq!(cfg.hunger, DriftPolicy::Pinned { value: 0.0 });
        assert!((cfg.loneliness_growth - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn conversation_defaults() {
        let cfg = ConversationConfig::default();
        assert_eq!(cfg.min_messages, 3);
        assert_eq!(cfg.max_messages, 10);
        assert_eq!(cfg.fallback_max_messages, 20);
        assert_eq!(cfg.advisor_window, 6);
    }
}
