//! In-process world store.
//!
//! [`InMemoryWorld`] keeps every piece of agent and world state behind a
//! single [`std::sync::Mutex`] and implements all three storage seams, so
//! a tick's write is naturally atomic. It backs the demo runner and the
//! service tests; a deployment would put a database behind the same traits.
//!
//! Histories are bounded. A location visit is dropped once it is settled
//! and its cooldown has passed, and each agent keeps only its most recent
//! decision log entries.
//!
//! Conversation bookkeeping is minimal: an initiation leaves a request in
//! the target's queue, a join pairs the two avatars, and a leave unpairs
//! them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use townsfolk_agents::{
    ConversationOutcome, MemoryUpdate, NeedOverride, apply_effects, record_conversation,
    set_needs, social, upsert,
};
use townsfolk_types::{
    ActionKind, ActionTarget, AgentId, ConversationRequest, DecisionContext, DecisionLogEntry,
    LocationId, NearbyEntity, NeedEffects, NeedSnapshot, NeedState, Personality, Position,
    RequesterKind, SocialMemory, WorldInteraction, WorldLocation,
};
use tracing::{debug, info};

use crate::executor::{TickOutcome, later};
use crate::store::{AgentProfile, ContextSource, StateSink, StoreError, TickLock};

/// How long an initiation stays in the target's queue.
const REQUEST_TTL_SECS: i64 = 30;

/// Default radius for gathering nearby avatars, in tiles.
pub const DEFAULT_NEARBY_RADIUS: f64 = 30.0;

/// Default number of decision log entries kept per agent.
pub const DEFAULT_DECISION_LOG_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the store holds, guarded by one lock.
#[derive(Debug, Default)]
struct WorldState {
    names: BTreeMap<AgentId, String>,
    positions: BTreeMap<AgentId, Position>,
    personalities: BTreeMap<AgentId, Personality>,
    needs: BTreeMap<AgentId, NeedState>,
    memories: BTreeMap<(AgentId, AgentId), SocialMemory>,
    locations: Vec<WorldLocation>,
    /// Visits still in progress or on cooldown, per agent.
    interactions: BTreeMap<AgentId, Vec<WorldInteraction>>,
    online: BTreeSet<AgentId>,
    /// Partner of each avatar currently in a conversation.
    partners: BTreeMap<AgentId, AgentId>,
    requests: BTreeMap<AgentId, Vec<ConversationRequest>>,
    /// Lease expiry of each held tick lock.
    locks: BTreeMap<AgentId, DateTime<Utc>>,
    decision_log: BTreeMap<AgentId, VecDeque<DecisionLogEntry>>,
}

impl WorldState {
    fn position(&self, agent: AgentId) -> Result<Position, StoreError> {
        self.positions
            .get(&agent)
            .copied()
            .ok_or(StoreError::UnknownAgent(agent))
    }

    fn needs_mut(&mut self, agent: AgentId) -> &mut NeedState {
        self.needs
            .entry(agent)
            .or_insert_with(|| NeedState::new(agent))
    }

    fn personality(&mut self, agent: AgentId) -> Personality {
        self.personalities
            .entry(agent)
            .or_insert_with(|| Personality::with_defaults(agent))
            .clone()
    }

    fn nearby(&self, agent: AgentId, here: Position, radius: f64) -> Vec<NearbyEntity> {
        let mut nearby: Vec<NearbyEntity> = self
            .positions
            .iter()
            .filter(|(id, _)| **id != agent)
            .filter_map(|(id, position)| {
                let distance = here.distance_to(*position);
                if distance > radius {
                    return None;
                }
                let memory = self.memories.get(&(agent, *id));
                Some(NearbyEntity {
                    id: *id,
                    display_name: self.names.get(id).cloned(),
                    position: *position,
                    distance,
                    is_online: self.online.contains(id),
                    sentiment: memory.map(|m| m.sentiment),
                    familiarity: memory.map(|m| m.familiarity),
                    last_interaction: memory.and_then(|m| m.last_interaction),
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        nearby
    }

    fn cooldowns(&self, agent: AgentId, now: DateTime<Utc>) -> BTreeSet<LocationId> {
        self.interactions
            .get(&agent)
            .into_iter()
            .flatten()
            .filter(|i| i.cooldown_until > now)
            .map(|i| i.location_id)
            .collect()
    }

    /// Settle the visit to `completed`, record `started`, and forget
    /// settled visits whose cooldown is over.
    fn track_visits(
        &mut self,
        agent: AgentId,
        completed: Option<LocationId>,
        started: Option<&WorldInteraction>,
        now: DateTime<Utc>,
    ) {
        let visits = self.interactions.entry(agent).or_default();
        if let Some(location) = completed
            && let Some(visit) = visits
                .iter_mut()
                .rev()
                .find(|i| i.location_id == location && i.completed_at.is_none())
        {
            visit.completed_at = Some(now);
        }
        if let Some(started) = started {
            visits.push(started.clone());
        }
        visits.retain(|i| i.completed_at.is_none() || i.cooldown_until > now);
        if visits.is_empty() {
            self.interactions.remove(&agent);
        }
    }

    fn log_decision(&mut self, entry: &DecisionLogEntry, capacity: usize) {
        if capacity == 0 {
            return;
        }
        let log = self.decision_log.entry(entry.agent_id).or_default();
        while log.len() >= capacity {
            log.pop_front();
        }
        log.push_back(entry.clone());
    }

    fn unpair(&mut self, agent: AgentId) {
        if let Some(partner) = self.partners.remove(&agent)
            && self.partners.get(&partner) == Some(&agent)
        {
            self.partners.remove(&partner);
        }
    }

    /// Keep the conversation queues in step with what the tick decided.
    fn follow_conversation(&mut self, agent: AgentId, outcome: &TickOutcome, now: DateTime<Utc>) {
        let partner = outcome
            .report
            .target
            .as_ref()
            .and_then(ActionTarget::avatar_id);
        match (outcome.report.decided, partner) {
            (ActionKind::InitiateConversation, Some(target)) => {
                if self.partners.contains_key(&target) {
                    return;
                }
                let request = ConversationRequest {
                    requester_id: agent,
                    requester_name: self.names.get(&agent).cloned(),
                    requester_kind: RequesterKind::from_online(self.online.contains(&agent)),
                    position: Some(outcome.position),
                    expires_at: Some(later(now, REQUEST_TTL_SECS)),
                };
                let queue = self.requests.entry(target).or_default();
                queue.retain(|r| r.requester_id != agent);
                queue.push(request);
                debug!(from = %agent, to = %target, "conversation request queued");
            }
            (ActionKind::JoinConversation, Some(requester)) => {
                if let Some(queue) = self.requests.get_mut(&agent) {
                    queue.retain(|r| r.requester_id != requester);
                }
                self.unpair(agent);
                self.unpair(requester);
                self.partners.insert(agent, requester);
                self.partners.insert(requester, agent);
                info!(agent_id = %agent, partner = %requester, "conversation joined");
            }
            (ActionKind::LeaveConversation, _) => {
                self.unpair(agent);
                info!(agent_id = %agent, "conversation left");
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A complete world held in process memory.
#[derive(Debug)]
pub struct InMemoryWorld {
    nearby_radius: f64,
    decision_log_capacity: usize,
    state: Mutex<WorldState>,
}

impl Default for InMemoryWorld {
    fn default() -> Self {
        Self::new(DEFAULT_NEARBY_RADIUS)
    }
}

impl InMemoryWorld {
    /// Create an empty world that gathers nearby avatars within
    /// `nearby_radius` tiles.
    pub fn new(nearby_radius: f64) -> Self {
        Self {
            nearby_radius,
            decision_log_capacity: DEFAULT_DECISION_LOG_CAPACITY,
            state: Mutex::new(WorldState::default()),
        }
    }

    /// Keep at most `capacity` decision log entries per agent, dropping the
    /// oldest first. Zero keeps none.
    #[must_use]
    pub const fn with_decision_log_capacity(mut self, capacity: usize) -> Self {
        self.decision_log_capacity = capacity;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, WorldState>, StoreError> {
        self.state.lock().map_err(|_poisoned| StoreError::Poisoned {
            context: "world state".to_owned(),
        })
    }

    /// Place an agent in the world. Without a personality the defaults are
    /// used. Existing needs and memories are kept.
    pub fn initialize_agent(
        &self,
        id: AgentId,
        name: impl Into<String>,
        position: Position,
        personality: Option<Personality>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.names.insert(id, name.into());
        state.positions.insert(id, position);
        state
            .personalities
            .insert(id, personality.unwrap_or_else(|| Personality::with_defaults(id)));
        state.needs_mut(id);
        Ok(())
    }

    /// Add a location to the catalog, replacing any with the same id.
    pub fn add_location(&self, location: WorldLocation) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.locations.retain(|l| l.id != location.id);
        state.locations.push(location);
        Ok(())
    }

    /// Mark an avatar as player-controlled (online) or not.
    pub fn set_online(&self, agent: AgentId, online: bool) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if online {
            state.online.insert(agent);
        } else {
            state.online.remove(&agent);
        }
        Ok(())
    }

    /// Pair two avatars in a conversation, or end the agent's conversation
    /// with `None`.
    pub fn set_conversation(
        &self,
        agent: AgentId,
        partner: Option<AgentId>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.unpair(agent);
        if let Some(partner) = partner {
            state.unpair(partner);
            state.partners.insert(agent, partner);
            state.partners.insert(partner, agent);
        }
        Ok(())
    }

    /// Queue a conversation request for `agent`.
    pub fn push_request(
        &self,
        agent: AgentId,
        request: ConversationRequest,
    ) -> Result<(), StoreError> {
        self.lock()?.requests.entry(agent).or_default().push(request);
        Ok(())
    }

    /// Operator override of an agent's needs.
    pub fn set_needs(&self, agent: AgentId, update: NeedOverride) -> Result<NeedSnapshot, StoreError> {
        let mut state = self.lock()?;
        state.position(agent)?;
        let needs = state.needs_mut(agent);
        set_needs(needs, update)?;
        Ok(needs.snapshot())
    }

    /// Retained decisions for one agent, oldest first.
    pub fn decision_log(&self, agent: AgentId) -> Result<Vec<DecisionLogEntry>, StoreError> {
        Ok(self
            .lock()?
            .decision_log
            .get(&agent)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// The agent's persisted need state, if any.
    pub fn needs(&self, agent: AgentId) -> Result<Option<NeedState>, StoreError> {
        Ok(self.lock()?.needs.get(&agent).cloned())
    }

    /// The agent's position, if it is in the world.
    pub fn position(&self, agent: AgentId) -> Result<Option<Position>, StoreError> {
        Ok(self.lock()?.positions.get(&agent).copied())
    }

    /// The agent's conversation partner, if any.
    pub fn partner(&self, agent: AgentId) -> Result<Option<AgentId>, StoreError> {
        Ok(self.lock()?.partners.get(&agent).copied())
    }

    /// The agent's location visits that are still in progress or on
    /// cooldown.
    pub fn interactions(&self, agent: AgentId) -> Result<Vec<WorldInteraction>, StoreError> {
        Ok(self
            .lock()?
            .interactions
            .get(&agent)
            .cloned()
            .unwrap_or_default())
    }

    /// Ids of every agent in the world.
    pub fn agents(&self) -> Result<Vec<AgentId>, StoreError> {
        Ok(self.lock()?.positions.keys().copied().collect())
    }
}

impl ContextSource for InMemoryWorld {
    fn build_context(
        &self,
        agent: AgentId,
        now: DateTime<Utc>,
    ) -> Result<DecisionContext, StoreError> {
        let mut state = self.lock()?;
        let position = state.position(agent)?;
        let personality = state.personality(agent);
        let needs = state.needs_mut(agent).clone();

        let social_memories = state
            .memories
            .values()
            .filter(|m| m.from == agent)
            .cloned()
            .collect();

        let pending_requests = state.requests.get_mut(&agent).map_or_else(Vec::new, |queue| {
            queue.retain(|r| r.expires_at.is_none_or(|expiry| expiry > now));
            queue.clone()
        });

        Ok(DecisionContext {
            agent_id: agent,
            now,
            position,
            personality,
            needs,
            social_memories,
            nearby: state.nearby(agent, position, self.nearby_radius),
            locations: state.locations.clone(),
            cooldowns: state.cooldowns(agent, now),
            in_conversation: state.partners.contains_key(&agent),
            pending_requests,
        })
    }

    fn social_memory(
        &self,
        from: AgentId,
        to: AgentId,
    ) -> Result<Option<SocialMemory>, StoreError> {
        Ok(self.lock()?.memories.get(&(from, to)).cloned())
    }

    fn agent_profile(&self, agent: AgentId) -> Result<AgentProfile, StoreError> {
        let mut state = self.lock()?;
        state.position(agent)?;
        Ok(AgentProfile {
            name: state
                .names
                .get(&agent)
                .cloned()
                .unwrap_or_else(|| agent.short()),
            personality: state.personality(agent),
            needs: state.needs_mut(agent).snapshot(),
        })
    }
}

impl StateSink for InMemoryWorld {
    fn save_tick(&self, outcome: &TickOutcome, log_decision: bool) -> Result<(), StoreError> {
        let agent = outcome.report.agent_id;
        let now = outcome.log_entry.tick_at;
        let mut state = self.lock()?;
        state.position(agent)?;

        // Every fallible step runs before the first write.
        let mut edges = Vec::with_capacity(outcome.memory_updates.len());
        for pending in &outcome.memory_updates {
            let existing = state.memories.get(&(agent, pending.to)).cloned();
            let edge = upsert(
                existing,
                agent,
                pending.to,
                &pending.update,
                social::TICK_BASELINE,
                now,
            )?;
            edges.push(edge);
        }

        state.needs.insert(agent, outcome.needs.clone());
        state.positions.insert(agent, outcome.position);
        for edge in edges {
            state.memories.insert((edge.from, edge.to), edge);
        }
        state.track_visits(
            agent,
            outcome.interaction_completed,
            outcome.interaction_started.as_ref(),
            now,
        );
        state.follow_conversation(agent, outcome, now);
        if log_decision {
            state.log_decision(&outcome.log_entry, self.decision_log_capacity);
        }
        Ok(())
    }

    fn upsert_social_memory(
        &self,
        from: AgentId,
        to: AgentId,
        update: &MemoryUpdate,
        baseline: f64,
        now: DateTime<Utc>,
    ) -> Result<SocialMemory, StoreError> {
        let mut state = self.lock()?;
        let existing = state.memories.get(&(from, to)).cloned();
        let edge = upsert(existing, from, to, update, baseline, now)?;
        state.memories.insert((from, to), edge.clone());
        Ok(edge)
    }

    fn record_conversation(
        &self,
        a: AgentId,
        b: AgentId,
        outcome: &ConversationOutcome,
        now: DateTime<Utc>,
    ) -> Result<(SocialMemory, SocialMemory), StoreError> {
        let mut state = self.lock()?;
        let forward = state.memories.get(&(a, b)).cloned();
        let backward = state.memories.get(&(b, a)).cloned();
        let (forward, backward) = record_conversation(forward, backward, a, b, outcome, now)?;
        state.memories.insert((a, b), forward.clone());
        state.memories.insert((b, a), backward.clone());
        Ok((forward, backward))
    }

    fn apply_need_delta(
        &self,
        agent: AgentId,
        effects: &NeedEffects,
    ) -> Result<NeedSnapshot, StoreError> {
        let mut state = self.lock()?;
        state.position(agent)?;
        let needs = state.needs_mut(agent);
        apply_effects(needs, effects);
        Ok(needs.snapshot())
    }
}

impl TickLock for InMemoryWorld {
    fn acquire(
        &self,
        agent: AgentId,
        lease: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        if state.locks.get(&agent).is_some_and(|expiry| *expiry > now) {
            return Ok(false);
        }
        let expiry = chrono::Duration::from_std(lease)
            .ok()
            .and_then(|lease| now.checked_add_signed(lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        state.locks.insert(agent, expiry);
        Ok(true)
    }

    fn release(&self, agent: AgentId) -> Result<(), StoreError> {
        self.lock()?.locks.remove(&agent);
        Ok(())
    }
}
