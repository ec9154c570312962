//! Need dynamics, social memory, and conversation policy for Townsfolk agents.
//!
//! This crate is the per-agent logic layer: everything that operates on one
//! agent's state without touching I/O or the clock. It sits between
//! `townsfolk-types` (the data) and `townsfolk-core` (the decision pipeline
//! and the services that persist its results).
//!
//! # Modules
//!
//! - [`config`] -- Tunables for decay and the conversation gates ([`NeedsConfig`], [`ConversationConfig`])
//! - [`conversation`] -- Accept, initiate, and end gates over social memory
//! - [`error`] -- Error types for agent operations ([`AgentError`])
//! - [`needs`] -- Time decay, effect application, overrides, and post-conversation deltas
//! - [`social`] -- Directed social-memory upserts and conversation outcomes
//! - [`tone`] -- Keyword-based message tone, the advisor's local fallback

pub mod config;
pub mod conversation;
pub mod error;
pub mod needs;
pub mod social;
pub mod tone;

// Re-export primary types at crate root for convenience.
pub use config::{ConversationConfig, DriftPolicy, NeedsConfig};
pub use conversation::{
    AcceptDecision, EndReason, EndVerdict, InitiateDecision, Relationship, decide_accept,
    decide_initiate, end_probability, evaluate_end, fallback_end,
};
pub use error::AgentError;
pub use needs::{NeedOverride, apply_effects, conversation_outcome, decay, repair, set_needs};
pub use social::{ConversationOutcome, MemoryUpdate, record_conversation, upsert};
pub use tone::{MessageTone, analyze_keywords};
