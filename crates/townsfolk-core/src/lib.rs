//! Decision pipeline, tick executor, and services for Townsfolk agents.
//!
//! One tick takes an immutable [`DecisionContext`], picks an action by
//! scoring candidates and sampling a softmax over them, applies it, and
//! describes every resulting write in a [`TickOutcome`]. The services wrap
//! that pure core with locking, persistence, and the conversation advisor.
//!
//! # Modules
//!
//! - [`candidates`] -- Candidate action generation from the context.
//! - [`config`] -- Configuration loading from `townsfolk.yaml`, with the
//!   `general` and `social_only` presets.
//! - [`conversation`] -- [`ConversationService`] and the
//!   [`ConversationAdvisor`] seam.
//! - [`decision`] -- Interrupts, scoring, and selection in one call.
//! - [`executor`] -- The per-tick state machine and action effects.
//! - [`memory`] -- [`InMemoryWorld`], an in-process store.
//! - [`scoring`] -- The six-term utility scorer.
//! - [`selection`] -- Interrupt check, softmax selection, action durations.
//! - [`store`] -- Storage traits: context source, state sink, tick lock, clock.
//! - [`tick`] -- [`TickService`], lock-guarded tick orchestration.
//! - [`wander`] -- Socially biased wander targets.
//!
//! [`DecisionContext`]: townsfolk_types::DecisionContext
//! [`TickOutcome`]: executor::TickOutcome
//! [`ConversationService`]: conversation::ConversationService
//! [`ConversationAdvisor`]: conversation::ConversationAdvisor
//! [`InMemoryWorld`]: memory::InMemoryWorld
//! [`TickService`]: tick::TickService

pub mod candidates;
pub mod config;
pub mod conversation;
pub mod decision;
pub mod executor;
pub mod memory;
pub mod scoring;
pub mod selection;
pub mod store;
pub mod tick;
pub mod wander;

pub use config::{ConfigError, DecisionConfig, Profile, TownsfolkConfig};
pub use conversation::{
    AdvisorError, ConversationAdvisor, ConversationService, EndAdvice, EndConsultation,
    EndDecision, MessageAnalysisRequest, NoAdvisor,
};
pub use decision::{Decision, DecisionError, make_decision};
pub use executor::{TickOutcome, execute_tick};
pub use memory::InMemoryWorld;
pub use store::{AgentProfile, Clock, ContextSource, StateSink, StoreError, SystemClock, TickLock};
pub use tick::{TickError, TickService};
