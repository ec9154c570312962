//! Storage seams: where contexts come from and where tick results go.
//!
//! The decision core never talks to a database directly. The tick and
//! conversation services are generic over these traits, so any backend
//! (the bundled [`InMemoryWorld`](crate::memory::InMemoryWorld), a SQL
//! store, a cache) can sit behind them. Implementations are shared across
//! tasks and must be `Send + Sync`.

use chrono::{DateTime, Utc};
use townsfolk_agents::{AgentError, ConversationOutcome, MemoryUpdate};
use townsfolk_types::{
    AgentId, DecisionContext, NeedEffects, NeedSnapshot, Personality, SocialMemory,
};

use crate::executor::TickOutcome;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The agent has no position, so it is not part of the world.
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    /// A lock guarding shared state was poisoned by a panicking writer.
    #[error("state poisoned: {context}")]
    Poisoned {
        /// Which piece of state.
        context: String,
    },

    /// A write was refused because it would break an invariant.
    #[error("write rejected: {source}")]
    Rejected {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },
}

/// Who an agent is, as handed to the conversation advisor.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    /// Display name.
    pub name: String,
    /// Static traits.
    pub personality: Personality,
    /// Current needs.
    pub needs: NeedSnapshot,
}

/// Read side: builds decision contexts and answers relationship lookups.
pub trait ContextSource: Send + Sync {
    /// Assemble the context for one tick at `now`. A missing personality or
    /// need state is created with defaults rather than reported.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAgent`] if the agent has no position.
    fn build_context(&self, agent: AgentId, now: DateTime<Utc>)
    -> Result<DecisionContext, StoreError>;

    /// The directed edge `from -> to`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn social_memory(&self, from: AgentId, to: AgentId)
    -> Result<Option<SocialMemory>, StoreError>;

    /// Name, personality, and needs of an agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAgent`] if the agent does not exist.
    fn agent_profile(&self, agent: AgentId) -> Result<AgentProfile, StoreError>;
}

/// Write side: persists tick outcomes and conversation aftermath.
pub trait StateSink: Send + Sync {
    /// Persist everything a tick produced as one atomic write: needs,
    /// position, memory upserts, visit records, and (when `log_decision`)
    /// the decision log entry. Nothing is written if any part fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write is refused or the backend fails.
    fn save_tick(&self, outcome: &TickOutcome, log_decision: bool) -> Result<(), StoreError>;

    /// Apply `update` to the edge `from -> to`, creating it from
    /// `baseline` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] for a self edge.
    fn upsert_social_memory(
        &self,
        from: AgentId,
        to: AgentId,
        update: &MemoryUpdate,
        baseline: f64,
        now: DateTime<Utc>,
    ) -> Result<SocialMemory, StoreError>;

    /// Record a finished conversation on both edges of the pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] if `a == b`.
    fn record_conversation(
        &self,
        a: AgentId,
        b: AgentId,
        outcome: &ConversationOutcome,
        now: DateTime<Utc>,
    ) -> Result<(SocialMemory, SocialMemory), StoreError>;

    /// Add need deltas to an agent, clamped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAgent`] if the agent does not exist.
    fn apply_need_delta(
        &self,
        agent: AgentId,
        effects: &NeedEffects,
    ) -> Result<NeedSnapshot, StoreError>;
}

/// Per-agent mutual exclusion around a tick.
pub trait TickLock: Send + Sync {
    /// Try to take the agent's lock for at most `lease`, measured from
    /// `now`. Returns whether the lock was obtained. A lease that ran out
    /// before `now` counts as free.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lock state cannot be read.
    fn acquire(
        &self,
        agent: AgentId,
        lease: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Give the agent's lock back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lock state cannot be written.
    fn release(&self, agent: AgentId) -> Result<(), StoreError>;
}

/// Source of the tick instant.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
