//! Shared type definitions for the Townsfolk NPC decision core.
//!
//! This crate is the single source of truth for the data that flows through
//! a tick. Wire types are exported to `TypeScript` via `ts-rs` for the game
//! client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for avatars, locations, and visits
//! - [`enums`] -- Action tags, location categories, requester classes, tick results
//! - [`structs`] -- Personality, needs, social memory, and world data
//! - [`actions`] -- Action targets, scored candidates, and the tick report
//! - [`context`] -- The immutable per-tick decision context

pub mod actions;
pub mod context;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::{
    ActionTarget, CandidateAction, DecisionLogEntry, LoggedOption, ScoreBreakdown,
    SelectedAction, TickReport,
};
pub use context::DecisionContext;
pub use enums::{ActionKind, LocationCategory, RequesterKind, TickResult};
pub use ids::{AgentId, InteractionId, LocationId};
pub use structs::{
    ConversationRequest, NEUTRAL_AFFINITY, NearbyEntity, NeedEffects, NeedSnapshot, NeedState,
    Personality, Position, SocialMemory, TranscriptMessage, WorldInteraction, WorldLocation,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Files land in `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::AgentId::export_all();
        let _ = crate::ids::LocationId::export_all();
        let _ = crate::ids::InteractionId::export_all();

        // Enums
        let _ = crate::enums::ActionKind::export_all();
        let _ = crate::enums::LocationCategory::export_all();
        let _ = crate::enums::RequesterKind::export_all();
        let _ = crate::enums::TickResult::export_all();

        // Structs
        let _ = crate::structs::Position::export_all();
        let _ = crate::structs::Personality::export_all();
        let _ = crate::structs::NeedState::export_all();
        let _ = crate::structs::NeedSnapshot::export_all();
        let _ = crate::structs::NeedEffects::export_all();
        let _ = crate::structs::SocialMemory::export_all();
        let _ = crate::structs::WorldLocation::export_all();
        let _ = crate::structs::WorldInteraction::export_all();
        let _ = crate::structs::NearbyEntity::export_all();
        let _ = crate::structs::ConversationRequest::export_all();
        let _ = crate::structs::TranscriptMessage::export_all();

        // Actions
        let _ = crate::actions::ActionTarget::export_all();
        let _ = crate::actions::ScoreBreakdown::export_all();
        let _ = crate::actions::CandidateAction::export_all();
        let _ = crate::actions::SelectedAction::export_all();
        let _ = crate::actions::TickReport::export_all();
    }
}
