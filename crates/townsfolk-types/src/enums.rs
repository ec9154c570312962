//! Enumeration types shared by the decision core and its callers.
//!
//! Action tags and location categories serialize in `snake_case` because the
//! tick report is consumed verbatim by the game client.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Action tags
// ---------------------------------------------------------------------------

/// Every action an avatar can be doing or be asked to do.
///
/// The `Interact*` tags are location activities: an agent holding one of
/// them with a live expiry is locked in place until the expiry passes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Do nothing this tick.
    #[default]
    Idle,
    /// Walk toward a socially biased random point.
    Wander,
    /// Travel toward a world location.
    WalkToLocation,
    /// Eat at a food location.
    InteractFood,
    /// Sing at a karaoke location.
    InteractKaraoke,
    /// Rest at a rest area.
    InteractRest,
    /// Hang out at a social hub.
    InteractSocialHub,
    /// Take in the view at a wander point.
    InteractWanderPoint,
    /// Start a conversation with a nearby avatar.
    InitiateConversation,
    /// Accept a pending conversation request.
    JoinConversation,
    /// Leave the current conversation.
    LeaveConversation,
    /// Step away from a disliked avatar.
    AvoidAvatar,
    /// Walk toward a nearby avatar.
    Move,
    /// Stay exactly where you are.
    StandStill,
}

impl ActionKind {
    /// The wire tag for this action (`"walk_to_location"`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Wander => "wander",
            Self::WalkToLocation => "walk_to_location",
            Self::InteractFood => "interact_food",
            Self::InteractKaraoke => "interact_karaoke",
            Self::InteractRest => "interact_rest",
            Self::InteractSocialHub => "interact_social_hub",
            Self::InteractWanderPoint => "interact_wander_point",
            Self::InitiateConversation => "initiate_conversation",
            Self::JoinConversation => "join_conversation",
            Self::LeaveConversation => "leave_conversation",
            Self::AvoidAvatar => "avoid_avatar",
            Self::Move => "move",
            Self::StandStill => "stand_still",
        }
    }

    /// Whether this is a location activity (`interact_*`).
    pub const fn is_activity(self) -> bool {
        self.activity_category().is_some()
    }

    /// The location category an activity tag belongs to.
    pub const fn activity_category(self) -> Option<LocationCategory> {
        match self {
            Self::InteractFood => Some(LocationCategory::Food),
            Self::InteractKaraoke => Some(LocationCategory::Karaoke),
            Self::InteractRest => Some(LocationCategory::RestArea),
            Self::InteractSocialHub => Some(LocationCategory::SocialHub),
            Self::InteractWanderPoint => Some(LocationCategory::WanderPoint),
            _ => None,
        }
    }

    /// Whether this action starts or joins a conversation.
    pub const fn is_conversation_entry(self) -> bool {
        matches!(self, Self::InitiateConversation | Self::JoinConversation)
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// The fixed set of world location categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LocationCategory {
    /// Somewhere to eat.
    Food,
    /// A karaoke stage.
    Karaoke,
    /// Benches and quiet corners.
    RestArea,
    /// A plaza where avatars gather.
    SocialHub,
    /// A scenic point worth walking to.
    WanderPoint,
}

impl LocationCategory {
    /// All categories in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Food,
        Self::Karaoke,
        Self::RestArea,
        Self::SocialHub,
        Self::WanderPoint,
    ];

    /// The activity an avatar performs on arriving at this category.
    pub const fn activity(self) -> ActionKind {
        match self {
            Self::Food => ActionKind::InteractFood,
            Self::Karaoke => ActionKind::InteractKaraoke,
            Self::RestArea => ActionKind::InteractRest,
            Self::SocialHub => ActionKind::InteractSocialHub,
            Self::WanderPoint => ActionKind::InteractWanderPoint,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation requests
// ---------------------------------------------------------------------------

/// Priority class of whoever sent a pending conversation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum RequesterKind {
    /// A human at the keyboard. Always answered immediately.
    Player,
    /// Another autonomous agent.
    Robot,
}

impl RequesterKind {
    /// Online avatars are treated as players, everyone else as robots.
    pub const fn from_online(is_online: bool) -> Self {
        if is_online { Self::Player } else { Self::Robot }
    }
}

// ---------------------------------------------------------------------------
// Tick results
// ---------------------------------------------------------------------------

/// What the tick executor did with the action it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TickResult {
    /// An ordinary action was executed.
    #[default]
    Success,
    /// The agent reached its destination and started the activity there.
    ArrivedStartedActivity,
    /// The agent is still busy with a locked activity.
    ActivityInProgress,
    /// The activity expired this tick and its effects were settled.
    ActivityCompleted,
}

impl TickResult {
    /// Whether the executor already wrote the action bookkeeping itself.
    pub const fn owns_bookkeeping(self) -> bool {
        !matches!(self, Self::Success)
    }
}
