//! Core entity structs: personality, needs, relationships, and the world.
//!
//! These are plain data. Mutation rules (decay, clamping, upserts) live in
//! `townsfolk-agents`; this crate only guarantees the shapes and the
//! defaults a freshly created agent starts with.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::actions::ActionTarget;
use crate::enums::{ActionKind, LocationCategory, RequesterKind};
use crate::ids::{AgentId, InteractionId, LocationId};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A tile coordinate on the world map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Create a position from its coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position, in tiles.
    pub fn distance_to(self, other: Self) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        dx.hypot(dy)
    }
}

// ---------------------------------------------------------------------------
// Personality
// ---------------------------------------------------------------------------

/// Affinity assumed for a location category the profile does not mention.
pub const NEUTRAL_AFFINITY: f64 = 0.5;

/// Static personality traits that bias decision scoring.
///
/// Every trait is in `[0.0, 1.0]`. The profile is read-only during a tick
/// and only refreshed between ticks by whatever learns from conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Personality {
    /// The avatar this profile belongs to.
    pub agent_id: AgentId,
    /// Preference for social interaction.
    pub sociability: f64,
    /// Preference for exploration.
    pub curiosity: f64,
    /// Tendency to accept and start conversations.
    pub agreeableness: f64,
    /// Natural energy level. High values prefer active actions.
    pub energy_baseline: f64,
    /// Affinity per location category.
    #[serde(default)]
    pub world_affinities: BTreeMap<LocationCategory, f64>,
    /// Free-text behavioral notes, only ever forwarded to the advisor.
    #[serde(default)]
    pub behavior_notes: Option<String>,
    /// Longer description of who this avatar is.
    #[serde(default)]
    pub profile_summary: Option<String>,
    /// How this avatar tends to talk.
    #[serde(default)]
    pub communication_style: Option<String>,
    /// Interests and hobbies.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Topics the avatar likes to bring up.
    #[serde(default)]
    pub conversation_topics: Vec<String>,
}

impl Personality {
    /// The profile handed to an agent that has none yet: very social, very
    /// curious, high energy.
    pub fn with_defaults(agent_id: AgentId) -> Self {
        let world_affinities = BTreeMap::from([
            (LocationCategory::Food, 0.8),
            (LocationCategory::Karaoke, 0.85),
            (LocationCategory::RestArea, 0.4),
            (LocationCategory::SocialHub, 0.9),
            (LocationCategory::WanderPoint, 0.75),
        ]);
        Self {
            agent_id,
            sociability: 0.85,
            curiosity: 0.8,
            agreeableness: 0.8,
            energy_baseline: 0.85,
            world_affinities,
            behavior_notes: None,
            profile_summary: None,
            communication_style: None,
            interests: Vec::new(),
            conversation_topics: Vec::new(),
        }
    }

    /// A profile with every trait and affinity at the midpoint.
    pub fn neutral(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            sociability: 0.5,
            curiosity: 0.5,
            agreeableness: 0.5,
            energy_baseline: 0.5,
            world_affinities: LocationCategory::ALL
                .iter()
                .map(|&c| (c, NEUTRAL_AFFINITY))
                .collect(),
            behavior_notes: None,
            profile_summary: None,
            communication_style: None,
            interests: Vec::new(),
            conversation_topics: Vec::new(),
        }
    }

    /// Affinity for a category, defaulting to [`NEUTRAL_AFFINITY`].
    pub fn affinity_for(&self, category: LocationCategory) -> f64 {
        self.world_affinities
            .get(&category)
            .copied()
            .unwrap_or(NEUTRAL_AFFINITY)
    }
}

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// Dynamic per-agent needs plus in-progress action bookkeeping.
///
/// `energy`, `hunger` and `loneliness` live in `[0, 1]`; `mood` lives in
/// `[-1, 1]`. If `action_expires_at` is set then `action_started_at` is set
/// too and is not later than the expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NeedState {
    /// The avatar these needs belong to.
    pub agent_id: AgentId,
    /// Physical energy (1 = fully rested).
    pub energy: f64,
    /// Hunger (0 = full).
    pub hunger: f64,
    /// Loneliness (0 = socially satisfied).
    pub loneliness: f64,
    /// Mood (-1 = miserable, 1 = elated).
    pub mood: f64,
    /// What the agent is currently doing.
    #[serde(default)]
    pub current_action: ActionKind,
    /// What the current action is aimed at.
    #[serde(default)]
    pub current_target: Option<ActionTarget>,
    /// When the current action began.
    #[serde(default)]
    pub action_started_at: Option<DateTime<Utc>>,
    /// When a locked activity ends. `None` for anything reconsiderable.
    #[serde(default)]
    pub action_expires_at: Option<DateTime<Utc>>,
    /// When this agent was last ticked.
    #[serde(default)]
    pub last_tick: Option<DateTime<Utc>>,
}

impl NeedState {
    /// Healthy starting needs: rested, fed, not lonely, in a great mood.
    pub const fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            energy: 1.0,
            hunger: 0.0,
            loneliness: 0.0,
            mood: 1.0,
            current_action: ActionKind::Idle,
            current_target: None,
            action_started_at: None,
            action_expires_at: None,
            last_tick: None,
        }
    }

    /// The four need scalars without the bookkeeping.
    pub const fn snapshot(&self) -> NeedSnapshot {
        NeedSnapshot {
            energy: self.energy,
            hunger: self.hunger,
            loneliness: self.loneliness,
            mood: self.mood,
        }
    }

    /// Whether start/expiry satisfy the ordering invariant.
    pub fn has_consistent_timestamps(&self) -> bool {
        match (self.action_started_at, self.action_expires_at) {
            (_, None) => true,
            (Some(start), Some(expiry)) => start <= expiry,
            (None, Some(_)) => false,
        }
    }

    /// Whether a locked activity is still running at `now`.
    pub fn activity_is_live(&self, now: DateTime<Utc>) -> bool {
        self.current_action.is_activity() && self.action_expires_at.is_some_and(|e| now < e)
    }
}

/// The four need values reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NeedSnapshot {
    /// Energy in `[0, 1]`.
    pub energy: f64,
    /// Hunger in `[0, 1]`.
    pub hunger: f64,
    /// Loneliness in `[0, 1]`.
    pub loneliness: f64,
    /// Mood in `[-1, 1]`.
    pub mood: f64,
}

/// Signed per-need deltas, e.g. a location's effects or a conversation's
/// aftermath. Missing needs deserialize as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "bindings/")]
pub struct NeedEffects {
    /// Change to energy.
    pub energy: f64,
    /// Change to hunger.
    pub hunger: f64,
    /// Change to loneliness.
    pub loneliness: f64,
    /// Change to mood.
    pub mood: f64,
}

impl NeedEffects {
    /// No change to anything.
    pub const ZERO: Self = Self {
        energy: 0.0,
        hunger: 0.0,
        loneliness: 0.0,
        mood: 0.0,
    };

    /// Every delta multiplied by `factor`.
    pub const fn scaled(self, factor: f64) -> Self {
        Self {
            energy: self.energy * factor,
            hunger: self.hunger * factor,
            loneliness: self.loneliness * factor,
            mood: self.mood * factor,
        }
    }
}

// ---------------------------------------------------------------------------
// Social memory
// ---------------------------------------------------------------------------

/// Directed relationship memory from one avatar toward another.
///
/// The reverse edge is a separate record and may disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SocialMemory {
    /// Who holds this opinion.
    pub from: AgentId,
    /// Who the opinion is about.
    pub to: AgentId,
    /// How `from` feels about `to`, in `[-1, 1]`.
    pub sentiment: f64,
    /// How well `from` knows `to`, in `[0, 1]`.
    pub familiarity: f64,
    /// Number of recorded interactions.
    pub interaction_count: u32,
    /// When the last interaction was recorded.
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
    /// What they last talked about.
    #[serde(default)]
    pub last_topic: Option<String>,
    /// Interests both sides share.
    #[serde(default)]
    pub mutual_interests: Vec<String>,
    /// Free-text notes about the relationship dynamic.
    #[serde(default)]
    pub relationship_notes: Option<String>,
    /// Running summary of past conversations.
    #[serde(default)]
    pub conversation_summary: Option<String>,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// A fixed location in the world with need effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldLocation {
    /// Location identifier.
    pub id: LocationId,
    /// Display name, e.g. "Corner Cafe".
    pub name: String,
    /// What kind of place this is.
    pub category: LocationCategory,
    /// Where it is.
    pub position: Position,
    /// Needs changed by one full visit.
    #[serde(default)]
    pub effects: NeedEffects,
    /// Seconds before the same avatar may use it again.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u32,
    /// Nominal visit length in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u32,
}

const fn default_cooldown_secs() -> u32 {
    300
}

const fn default_duration_secs() -> u32 {
    30
}

/// One avatar's visit to a world location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldInteraction {
    /// Record identifier.
    pub id: InteractionId,
    /// The visiting avatar.
    pub agent_id: AgentId,
    /// The visited location.
    pub location_id: LocationId,
    /// The activity performed there.
    pub activity: ActionKind,
    /// When the activity began.
    pub started_at: DateTime<Utc>,
    /// Until when the location is on cooldown for this avatar.
    pub cooldown_until: DateTime<Utc>,
    /// When the activity was settled, if it has been.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Another avatar within sensing range of the deciding agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NearbyEntity {
    /// The other avatar.
    pub id: AgentId,
    /// Display name, if known.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Where they stand.
    pub position: Position,
    /// Distance from the deciding agent.
    pub distance: f64,
    /// Whether a human is currently driving this avatar.
    pub is_online: bool,
    /// Outgoing sentiment toward them, if any memory exists.
    #[serde(default)]
    pub sentiment: Option<f64>,
    /// Outgoing familiarity toward them, if any memory exists.
    #[serde(default)]
    pub familiarity: Option<f64>,
    /// Last recorded interaction, if any.
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
}

/// A conversation request waiting for the deciding agent's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConversationRequest {
    /// Who wants to talk.
    pub requester_id: AgentId,
    /// Their display name, if known.
    #[serde(default)]
    pub requester_name: Option<String>,
    /// Their priority class.
    pub requester_kind: RequesterKind,
    /// Where they stand.
    #[serde(default)]
    pub position: Option<Position>,
    /// When the request lapses.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// One line of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TranscriptMessage {
    /// Who said it.
    pub sender_id: AgentId,
    /// Their display name.
    pub sender_name: String,
    /// What they said.
    pub content: String,
}
