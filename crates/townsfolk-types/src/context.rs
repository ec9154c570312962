//! The per-tick decision context.
//!
//! A [`DecisionContext`] is everything one agent knows when deciding what to
//! do. It is assembled fresh each tick by a context source and never mutated
//! during the decision.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, LocationId};
use crate::structs::{
    ConversationRequest, NearbyEntity, NeedState, Personality, Position, SocialMemory,
    WorldLocation,
};

/// Immutable input to one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    /// The deciding avatar.
    pub agent_id: AgentId,
    /// The tick instant. Scoring reads time only from here.
    pub now: DateTime<Utc>,
    /// Where the agent stands.
    pub position: Position,
    /// Static traits.
    pub personality: Personality,
    /// Needs after this tick's decay.
    pub needs: NeedState,
    /// Outgoing relationship edges.
    pub social_memories: Vec<SocialMemory>,
    /// Avatars within sensing range, nearest first.
    pub nearby: Vec<NearbyEntity>,
    /// The location catalog.
    pub locations: Vec<WorldLocation>,
    /// Locations this agent may not use yet.
    pub cooldowns: BTreeSet<LocationId>,
    /// Whether the agent is in a conversation right now.
    pub in_conversation: bool,
    /// Requests waiting on this agent, oldest first.
    pub pending_requests: Vec<ConversationRequest>,
}

impl DecisionContext {
    /// The outgoing edge toward `other`, if one exists.
    pub fn memory_for(&self, other: AgentId) -> Option<&SocialMemory> {
        self.social_memories.iter().find(|m| m.to == other)
    }

    /// A nearby avatar by id.
    pub fn nearby_entity(&self, id: AgentId) -> Option<&NearbyEntity> {
        self.nearby.iter().find(|e| e.id == id)
    }

    /// A catalog location by id.
    pub fn location(&self, id: LocationId) -> Option<&WorldLocation> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Whether `id` is still on cooldown for this agent.
    pub fn on_cooldown(&self, id: LocationId) -> bool {
        self.cooldowns.contains(&id)
    }
}
