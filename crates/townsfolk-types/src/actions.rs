//! Action targets, scored candidates, and the tick report.
//!
//! A target is a proper discriminated union (avatar, location, or raw
//! position) so that a resumed walk or activity always knows exactly what
//! it was aimed at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionKind, TickResult};
use crate::ids::{AgentId, LocationId};
use crate::structs::{NeedSnapshot, Position};

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// What an action is aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionTarget {
    /// Another avatar. `position` is where the actor heads: the avatar
    /// itself when approaching, a flee point when avoiding.
    Avatar {
        /// The avatar in question.
        id: AgentId,
        /// Display name, for logs and the client.
        #[serde(default)]
        name: Option<String>,
        /// Where the actor is heading.
        #[serde(default)]
        position: Option<Position>,
    },
    /// A world location.
    Location {
        /// The location in question.
        id: LocationId,
        /// Display name.
        name: String,
        /// Where the location is.
        position: Position,
    },
    /// A bare map coordinate.
    Position {
        /// The coordinate.
        position: Position,
    },
}

impl ActionTarget {
    /// Where the actor should walk, if the target has a place.
    pub const fn position(&self) -> Option<Position> {
        match self {
            Self::Avatar { position, .. } => *position,
            Self::Location { position, .. } | Self::Position { position } => Some(*position),
        }
    }

    /// The targeted avatar, if any.
    pub const fn avatar_id(&self) -> Option<AgentId> {
        match self {
            Self::Avatar { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// The targeted location, if any.
    pub const fn location_id(&self) -> Option<LocationId> {
        match self {
            Self::Location { id, .. } => Some(*id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// The weighted contributions that make up one candidate's utility.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScoreBreakdown {
    /// How well the action meets current needs.
    pub need: f64,
    /// How well it suits the personality.
    pub personality: f64,
    /// Pull or push from the relationship with the target.
    pub social: f64,
    /// Preference for the target location's category.
    pub affinity: f64,
    /// Penalty for repeating something recent. Subtracted.
    pub recency: f64,
    /// Gaussian noise for variety.
    pub jitter: f64,
}

impl ScoreBreakdown {
    /// Total utility: every term summed with recency subtracted.
    pub const fn total(&self) -> f64 {
        self.need + self.personality + self.social + self.affinity - self.recency + self.jitter
    }
}

/// A feasible action with its score filled in by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CandidateAction {
    /// What to do.
    pub kind: ActionKind,
    /// What to do it to.
    pub target: Option<ActionTarget>,
    /// Component contributions.
    pub breakdown: ScoreBreakdown,
    /// Combined utility.
    pub utility: f64,
}

impl CandidateAction {
    /// An unscored candidate.
    pub const fn new(kind: ActionKind, target: Option<ActionTarget>) -> Self {
        Self {
            kind,
            target,
            breakdown: ScoreBreakdown {
                need: 0.0,
                personality: 0.0,
                social: 0.0,
                affinity: 0.0,
                recency: 0.0,
                jitter: 0.0,
            },
            utility: 0.0,
        }
    }
}

/// The action chosen for execution this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SelectedAction {
    /// What to do.
    pub kind: ActionKind,
    /// What to do it to.
    pub target: Option<ActionTarget>,
    /// The utility it was chosen with.
    pub utility: f64,
    /// How long the action is expected to take, in seconds.
    pub duration_secs: Option<f64>,
}

// ---------------------------------------------------------------------------
// Tick output
// ---------------------------------------------------------------------------

/// What one tick produced, as returned to the polling caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickReport {
    /// The ticked avatar.
    pub agent_id: AgentId,
    /// What the agent is doing after execution. May differ from
    /// `decided`, e.g. a walk that arrived becomes an activity.
    pub action: ActionKind,
    /// What the pipeline or the resumed state handed to the executor.
    pub decided: ActionKind,
    /// Target of the current action.
    pub target: Option<ActionTarget>,
    /// Utility of the decided action.
    pub score: f64,
    /// Seconds left on a locked activity, else the decided duration.
    pub duration_secs: Option<f64>,
    /// Needs after the tick.
    pub needs: NeedSnapshot,
    /// How the executor handled the action.
    pub result: TickResult,
    /// Position after the tick.
    pub position: Position,
}

/// One scored option as written to the decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedOption {
    /// The action tag.
    pub kind: ActionKind,
    /// Its utility.
    pub utility: f64,
    /// Its target.
    pub target: Option<ActionTarget>,
}

/// Audit record of one tick's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    /// The ticked avatar.
    pub agent_id: AgentId,
    /// When the tick ran.
    pub tick_at: DateTime<Utc>,
    /// Needs after decay, before execution.
    pub needs: NeedSnapshot,
    /// Position before execution.
    pub position: Position,
    /// Every candidate the pipeline scored. Empty for resumed actions and
    /// interrupts.
    pub candidates: Vec<LoggedOption>,
    /// What was handed to the executor.
    pub selected: LoggedOption,
    /// How the executor handled it.
    pub result: TickResult,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn total_subtracts_recency() {
        let breakdown = ScoreBreakdown {
            need: 10.0,
            personality: 1.0,
            social: 0.5,
            affinity: 0.25,
            recency: 2.0,
            jitter: 0.25,
        };
        assert!((breakdown.total() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn target_accessors() {
        let id = AgentId::new();
        let avatar = ActionTarget::Avatar {
            id,
            name: None,
            position: Some(Position::new(1, 2)),
        };
        assert_eq!(avatar.avatar_id(), Some(id));
        assert_eq!(avatar.location_id(), None);
        assert_eq!(avatar.position(), Some(Position::new(1, 2)));

        let point = ActionTarget::Position {
            position: Position::new(7, 7),
        };
        assert_eq!(point.avatar_id(), None);
        assert_eq!(point.position(), Some(Position::new(7, 7)));
    }

    #[test]
    fn target_is_internally_tagged() {
        let target = ActionTarget::Position {
            position: Position::new(3, 4),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["kind"], "position");
        assert_eq!(json["position"]["x"], 3);
        let back: ActionTarget = serde_json::from_value(json).unwrap();
        assert_eq!(back, target);
    }
}
