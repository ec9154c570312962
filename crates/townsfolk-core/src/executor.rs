//! The per-agent tick state machine.
//!
//! States live in the persisted [`NeedState`]:
//!
//! - **free** -- anything without a live expiry; decided fresh each tick
//! - **walking** -- `walk_to_location` toward a catalog location; stepped
//!   each tick until within the arrival radius
//! - **in activity** -- an `interact_*` tag with an expiry; locked in place,
//!   receiving a share of the location's effects each tick
//!
//! A tick either resumes the committed walk or activity, or runs the full
//! decision pipeline, then executes the result. [`execute_tick`] is pure:
//! it returns a [`TickOutcome`] describing every write, and the caller
//! persists it in one go.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use townsfolk_agents::{MemoryUpdate, NeedsConfig, apply_effects, decay, repair};
use townsfolk_types::{
    ActionKind, ActionTarget, AgentId, DecisionContext, DecisionLogEntry, InteractionId,
    LocationId, LoggedOption, NeedEffects, NeedState, Position, SelectedAction, TickReport,
    TickResult, WorldInteraction, WorldLocation,
};
use tracing::{debug, info};

use crate::config::DecisionConfig;
use crate::decision::{self, DecisionError};
use crate::wander::to_tile;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A social-memory upsert from the ticked agent toward someone else.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMemoryUpdate {
    /// The other avatar.
    pub to: AgentId,
    /// What changes.
    pub update: MemoryUpdate,
}

/// Everything one tick wants written, in one value.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// The agent's needs and bookkeeping after the tick, `last_tick`
    /// stamped.
    pub needs: NeedState,
    /// Where the agent ends up.
    pub position: Position,
    /// What to send back to the caller.
    pub report: TickReport,
    /// Edges to upsert from this agent.
    pub memory_updates: Vec<PendingMemoryUpdate>,
    /// A location visit that began this tick.
    pub interaction_started: Option<WorldInteraction>,
    /// A location visit that ended this tick.
    pub interaction_completed: Option<LocationId>,
    /// Audit record of the decision.
    pub log_entry: DecisionLogEntry,
}

/// Result of executing one action, before reporting.
struct Execution {
    needs: NeedState,
    position: Position,
    result: TickResult,
    memory_updates: Vec<PendingMemoryUpdate>,
    interaction_started: Option<WorldInteraction>,
    interaction_completed: Option<LocationId>,
}

impl Execution {
    const fn new(needs: NeedState, position: Position) -> Self {
        Self {
            needs,
            position,
            result: TickResult::Success,
            memory_updates: Vec::new(),
            interaction_started: None,
            interaction_completed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Run one full tick for the agent in `ctx`.
///
/// Loaded needs are repaired and decayed first. Then a committed walk or
/// activity is resumed if there is one, else the decision pipeline runs.
/// The chosen action is executed and the resulting state returned.
///
/// # Errors
///
/// Returns [`DecisionError`] if the pipeline had nothing to choose from.
pub fn execute_tick(
    mut ctx: DecisionContext,
    decision_config: &DecisionConfig,
    needs_config: &NeedsConfig,
    rng: &mut impl Rng,
) -> Result<TickOutcome, DecisionError> {
    let now = ctx.now;
    repair(&mut ctx.needs);
    decay(&mut ctx.needs, now, needs_config);

    let commitment = resume(&ctx, decision_config);
    let (selected, candidates) = if let Commitment::Held(selected) = commitment {
        (selected, Vec::new())
    } else {
        if matches!(commitment, Commitment::Lost) {
            clear_action(&mut ctx.needs);
        }
        let decided = decision::make_decision(&ctx, decision_config, rng)?;
        (decided.selected, decided.candidates)
    };

    let mut execution = execute(&ctx, &selected, decision_config, rng);
    execution.needs.last_tick = Some(now);

    let duration_secs = execution
        .needs
        .action_expires_at
        .filter(|_| execution.needs.current_action.is_activity())
        .and_then(|expiry| expiry.signed_duration_since(now).to_std().ok())
        .map(|d| d.as_secs_f64())
        .or(selected.duration_secs);

    let report = TickReport {
        agent_id: ctx.agent_id,
        action: execution.needs.current_action,
        decided: selected.kind,
        target: execution.needs.current_target.clone(),
        score: selected.utility,
        duration_secs,
        needs: execution.needs.snapshot(),
        result: execution.result,
        position: execution.position,
    };

    let log_entry = DecisionLogEntry {
        agent_id: ctx.agent_id,
        tick_at: now,
        needs: ctx.needs.snapshot(),
        position: ctx.position,
        candidates: candidates
            .iter()
            .map(|c| LoggedOption {
                kind: c.kind,
                utility: c.utility,
                target: c.target.clone(),
            })
            .collect(),
        selected: LoggedOption {
            kind: selected.kind,
            utility: selected.utility,
            target: selected.target.clone(),
        },
        result: execution.result,
    };

    info!(
        agent_id = %ctx.agent_id,
        decided = %selected.kind,
        action = %report.action,
        result = ?report.result,
        x = report.position.x,
        y = report.position.y,
        "tick processed"
    );

    Ok(TickOutcome {
        needs: execution.needs,
        position: execution.position,
        report,
        memory_updates: execution.memory_updates,
        interaction_started: execution.interaction_started,
        interaction_completed: execution.interaction_completed,
        log_entry,
    })
}

// ---------------------------------------------------------------------------
// Resumption
// ---------------------------------------------------------------------------

/// Where an agent stands with respect to a walk or activity.
enum Commitment {
    /// Nothing to resume.
    Free,
    /// The committed location left the catalog.
    Lost,
    /// Resume this action.
    Held(SelectedAction),
}

/// The committed action for an agent that is mid-activity or mid-walk.
fn resume(ctx: &DecisionContext, config: &DecisionConfig) -> Commitment {
    let needs = &ctx.needs;
    let kind = needs.current_action;
    let committed = (kind.is_activity() && needs.action_expires_at.is_some())
        || kind == ActionKind::WalkToLocation;
    if !committed {
        return Commitment::Free;
    }

    let Some(location) = needs
        .current_target
        .as_ref()
        .and_then(ActionTarget::location_id)
        .and_then(|id| ctx.location(id))
    else {
        debug!(
            agent_id = %ctx.agent_id,
            action = %kind,
            "committed location is gone, deciding afresh"
        );
        return Commitment::Lost;
    };

    let target = Some(location_target(location));
    if kind.is_activity() {
        return Commitment::Held(SelectedAction {
            kind,
            target,
            utility: config.activity_score,
            duration_secs: Some(f64::from(location.duration_secs)),
        });
    }

    let distance = ctx.position.distance_to(location.position);
    if distance > config.arrival_radius {
        Commitment::Held(SelectedAction {
            kind: ActionKind::WalkToLocation,
            target,
            utility: config.walking_score,
            duration_secs: None,
        })
    } else {
        Commitment::Held(SelectedAction {
            kind: location.category.activity(),
            target,
            utility: config.activity_score,
            duration_secs: Some(f64::from(location.duration_secs)),
        })
    }
}

fn location_target(location: &WorldLocation) -> ActionTarget {
    ActionTarget::Location {
        id: location.id,
        name: location.name.clone(),
        position: location.position,
    }
}

fn clear_action(needs: &mut NeedState) {
    needs.current_action = ActionKind::Idle;
    needs.current_target = None;
    needs.action_started_at = None;
    needs.action_expires_at = None;
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Apply `action` to the decayed state in `ctx`.
fn execute(
    ctx: &DecisionContext,
    action: &SelectedAction,
    config: &DecisionConfig,
    rng: &mut impl Rng,
) -> Execution {
    let mut out = Execution::new(ctx.needs.clone(), ctx.position);
    let heading = action.target.as_ref().and_then(ActionTarget::position);

    match action.kind {
        ActionKind::Idle => apply(&mut out.needs, 0.05, 0.0, 0.0, 0.01),
        ActionKind::StandStill | ActionKind::LeaveConversation => {}
        ActionKind::Wander => {
            apply(&mut out.needs, -0.03, 0.0, 0.0, 0.02);
            if let Some(target) = heading {
                out.position = step_per_axis(ctx.position, target, config.walk_step);
            }
        }
        ActionKind::Move => {
            if let Some(target) = heading {
                out.position = step_toward(ctx.position, target, config.walk_step, 0.0);
            }
            apply(&mut out.needs, -0.02, 0.0, 0.0, 0.0);
        }
        ActionKind::AvoidAvatar => {
            if let Some(target) = heading {
                out.position = step_toward(ctx.position, target, config.avoid_step, 1.0);
            }
            apply(&mut out.needs, -0.03, 0.0, 0.0, -0.05);
        }
        ActionKind::InitiateConversation => {
            apply(&mut out.needs, -0.05, 0.0, -0.2, 0.0);
            if let Some(to) = action.target.as_ref().and_then(ActionTarget::avatar_id) {
                out.memory_updates.push(PendingMemoryUpdate {
                    to,
                    update: MemoryUpdate::new(0.05, 0.1),
                });
            }
        }
        ActionKind::JoinConversation => apply(&mut out.needs, 0.0, 0.0, -0.15, 0.05),
        ActionKind::WalkToLocation => {
            if let Some(location) = target_location(ctx, action) {
                let distance = ctx.position.distance_to(location.position);
                if distance <= config.arrival_radius {
                    start_activity(&mut out, ctx, location, config, rng);
                } else {
                    out.position =
                        step_toward(ctx.position, location.position, config.walk_step, 0.0);
                    apply(&mut out.needs, -0.02, 0.0, 0.0, 0.0);
                }
            }
        }
        ActionKind::InteractFood
        | ActionKind::InteractKaraoke
        | ActionKind::InteractRest
        | ActionKind::InteractSocialHub
        | ActionKind::InteractWanderPoint => {
            if let Some(location) = target_location(ctx, action) {
                let running = ctx.needs.current_action == action.kind
                    && ctx.needs.action_expires_at.is_some();
                if running {
                    continue_activity(&mut out, ctx, location);
                } else {
                    start_activity(&mut out, ctx, location, config, rng);
                }
            }
        }
    }

    if !out.result.owns_bookkeeping() {
        let is_new = out.needs.current_action != action.kind;
        out.needs.current_action = action.kind;
        out.needs.current_target.clone_from(&action.target);
        if is_new {
            out.needs.action_started_at = Some(ctx.now);
        }
        out.needs.action_expires_at = None;
    }
    out
}

fn target_location<'a>(
    ctx: &'a DecisionContext,
    action: &SelectedAction,
) -> Option<&'a WorldLocation> {
    action
        .target
        .as_ref()
        .and_then(ActionTarget::location_id)
        .and_then(|id| ctx.location(id))
}

fn apply(needs: &mut NeedState, energy: f64, hunger: f64, loneliness: f64, mood: f64) {
    apply_effects(
        needs,
        &NeedEffects {
            energy,
            hunger,
            loneliness,
            mood,
        },
    );
}

/// Begin the location's activity: lock the agent in place for a short,
/// jittered duration and record the visit.
fn start_activity(
    out: &mut Execution,
    ctx: &DecisionContext,
    location: &WorldLocation,
    config: &DecisionConfig,
    rng: &mut impl Rng,
) {
    let activity = location.category.activity();
    let jitter = rng.random::<f64>().mul_add(2.0, -1.0);
    let secs = i64::from(to_tile(config.activity_base_secs + jitter))
        .max(config.activity_min_secs)
        .min(config.activity_max_secs);
    let expiry = later(ctx.now, secs);

    out.needs.current_action = activity;
    out.needs.current_target = Some(location_target(location));
    out.needs.action_started_at = Some(ctx.now);
    out.needs.action_expires_at = Some(expiry);
    out.interaction_started = Some(WorldInteraction {
        id: InteractionId::new(),
        agent_id: ctx.agent_id,
        location_id: location.id,
        activity,
        started_at: ctx.now,
        cooldown_until: later(ctx.now, i64::from(location.cooldown_secs)),
        completed_at: None,
    });
    out.result = TickResult::ArrivedStartedActivity;

    info!(
        agent_id = %ctx.agent_id,
        activity = %activity,
        location = %location.name,
        duration_secs = secs,
        "activity started"
    );
}

/// Apply this tick's share of a running activity, or settle it once the
/// expiry has passed.
fn continue_activity(out: &mut Execution, ctx: &DecisionContext, location: &WorldLocation) {
    let (Some(start), Some(expiry)) = (ctx.needs.action_started_at, ctx.needs.action_expires_at)
    else {
        return;
    };
    let total = seconds_between(start, expiry);
    let last_tick = ctx.needs.last_tick;

    if ctx.now < expiry {
        let share = if total > 0.0 {
            let from = last_tick.map_or(start, |t| t.max(start));
            (seconds_between(from, ctx.now) / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        apply_effects(&mut out.needs, &location.effects.scaled(share));
        out.result = TickResult::ActivityInProgress;
        debug!(
            agent_id = %ctx.agent_id,
            activity = %ctx.needs.current_action,
            share,
            "activity in progress"
        );
        return;
    }

    let applied = match last_tick {
        Some(t) if total > 0.0 => (seconds_between(start, t) / total).clamp(0.0, 1.0),
        _ => 0.0,
    };
    let remainder = 1.0 - applied;
    apply_effects(&mut out.needs, &location.effects.scaled(remainder));
    clear_action(&mut out.needs);
    out.interaction_completed = Some(location.id);
    out.result = TickResult::ActivityCompleted;
    info!(
        agent_id = %ctx.agent_id,
        location = %location.name,
        remainder,
        "activity completed"
    );
}

/// Signed seconds from `from` to `to`; negative spans count as zero.
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    to.signed_duration_since(from)
        .to_std()
        .map_or(0.0, |d| d.as_secs_f64())
}

/// `at` plus `secs` seconds, saturating at the end of representable time.
pub(crate) fn later(at: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    at.checked_add_signed(Duration::seconds(secs))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Step toward `target` by at most `max_step` along the straight line.
/// The offset is truncated to whole tiles. `min_distance` floors the
/// divisor.
fn step_toward(from: Position, target: Position, max_step: f64, min_distance: f64) -> Position {
    let dx = f64::from(target.x) - f64::from(from.x);
    let dy = f64::from(target.y) - f64::from(from.y);
    let distance = dx.hypot(dy).max(min_distance);
    let factor = if distance > 0.0 {
        (max_step / distance).min(1.0)
    } else {
        1.0
    };
    Position::new(
        from.x.saturating_add(to_tile(dx * factor)),
        from.y.saturating_add(to_tile(dy * factor)),
    )
}

/// Step toward `target` by at most `max_step` tiles on each axis.
fn step_per_axis(from: Position, target: Position, max_step: f64) -> Position {
    let limit = to_tile(max_step).max(0);
    let dx = target.x.saturating_sub(from.x).clamp(-limit, limit);
    let dy = target.y.saturating_sub(from.y).clamp(-limit, limit);
    Position::new(from.x.saturating_add(dx), from.y.saturating_add(dy))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use townsfolk_types::{LocationCategory, NearbyEntity, Personality};

    use super::*;

    fn cafe(position: Position) -> WorldLocation {
        WorldLocation {
            id: LocationId::new(),
            name: "Corner Cafe".to_owned(),
            category: LocationCategory::Food,
            position,
            effects: NeedEffects {
                hunger: -0.4,
                ..NeedEffects::ZERO
            },
            cooldown_secs: 300,
            duration_secs: 30,
        }
    }

    fn context(now: DateTime<Utc>, position: Position, locations: Vec<WorldLocation>) -> DecisionContext {
        let agent_id = AgentId::new();
        let mut needs = NeedState::new(agent_id);
        needs.last_tick = Some(now);
        DecisionContext {
            agent_id,
            now,
            position,
            personality: Personality::with_defaults(agent_id),
            needs,
            social_memories: Vec::new(),
            nearby: Vec::new(),
            locations,
            cooldowns: BTreeSet::new(),
            in_conversation: false,
            pending_requests: Vec::new(),
        }
    }

    fn frozen() -> NeedsConfig {
        // Pin everything so effects are the only change.
        let mut cfg = NeedsConfig::social_only();
        cfg.energy = townsfolk_agents::DriftPolicy::Pinned { value: 1.0 };
        cfg.hunger = townsfolk_agents::DriftPolicy::Drift { rate: 0.0 };
        cfg.loneliness_growth = 0.0;
        cfg.mood_decay = 0.0;
        cfg
    }

    #[test]
    fn activity_continues_then_completes_exactly_once() {
        let start = Utc::now();
        let expiry = start + Duration::seconds(5);
        let location = cafe(Position::new(10, 10));
        let mut ctx = context(start, Position::new(10, 10), vec![location.clone()]);
        ctx.needs.hunger = 0.8;
        ctx.needs.current_action = ActionKind::InteractFood;
        ctx.needs.current_target = Some(location_target(&location));
        ctx.needs.action_started_at = Some(start);
        ctx.needs.action_expires_at = Some(expiry);
        ctx.needs.last_tick = Some(start);

        let cfg = DecisionConfig::default();
        let mut rng = SmallRng::seed_from_u64(1);

        // Two seconds in: still eating, two fifths of the meal applied.
        let mut first = ctx.clone();
        first.now = start + Duration::seconds(2);
        let outcome = execute_tick(first, &cfg, &frozen(), &mut rng).unwrap();
        assert_eq!(outcome.report.result, TickResult::ActivityInProgress);
        assert_eq!(outcome.report.action, ActionKind::InteractFood);
        assert_eq!(outcome.needs.action_expires_at, Some(expiry));
        assert!((outcome.needs.hunger - (0.8 - 0.16)).abs() < 1e-9);
        assert!(outcome.report.duration_secs.is_some_and(|d| (d - 3.0).abs() < 1e-6));

        // Past the expiry: the remaining three fifths, then free.
        let mut second = ctx;
        second.needs = outcome.needs;
        second.now = expiry + Duration::seconds(1);
        let done = execute_tick(second, &cfg, &frozen(), &mut rng).unwrap();
        assert_eq!(done.report.result, TickResult::ActivityCompleted);
        assert_eq!(done.report.action, ActionKind::Idle);
        assert!(done.needs.action_expires_at.is_none());
        assert!(done.needs.current_target.is_none());
        assert_eq!(done.interaction_completed, Some(location.id));
        assert!((done.needs.hunger - 0.4).abs() < 1e-9);
    }

    #[test]
    fn completion_without_partials_applies_everything() {
        let start = Utc::now();
        let location = cafe(Position::new(10, 10));
        let mut ctx = context(start + Duration::seconds(9), Position::new(10, 10), vec![location.clone()]);
        ctx.needs.hunger = 0.8;
        ctx.needs.current_action = ActionKind::InteractFood;
        ctx.needs.current_target = Some(location_target(&location));
        ctx.needs.action_started_at = Some(start);
        ctx.needs.action_expires_at = Some(start + Duration::seconds(6));
        ctx.needs.last_tick = Some(start);

        let mut rng = SmallRng::seed_from_u64(2);
        let done = execute_tick(ctx, &DecisionConfig::default(), &frozen(), &mut rng).unwrap();
        assert_eq!(done.report.result, TickResult::ActivityCompleted);
        assert!((done.needs.hunger - 0.4).abs() < 1e-9);
    }

    #[test]
    fn walking_steps_then_arrives_into_the_activity() {
        let now = Utc::now();
        let location = cafe(Position::new(16, 10));
        let mut ctx = context(now, Position::new(10, 10), vec![location.clone()]);
        ctx.needs.current_action = ActionKind::WalkToLocation;
        ctx.needs.current_target = Some(location_target(&location));
        ctx.needs.action_started_at = Some(now);

        let cfg = DecisionConfig::default();
        let mut rng = SmallRng::seed_from_u64(3);
        let step = execute_tick(ctx.clone(), &cfg, &frozen(), &mut rng).unwrap();
        assert_eq!(step.report.result, TickResult::Success);
        assert_eq!(step.report.action, ActionKind::WalkToLocation);
        assert_eq!(step.position, Position::new(13, 10));
        assert!((step.report.score - cfg.walking_score).abs() < f64::EPSILON);
        // Still the same walk: the start stamp is kept.
        assert_eq!(step.needs.action_started_at, Some(now));
        assert!(step.log_entry.candidates.is_empty());

        let mut arrived = ctx;
        arrived.position = Position::new(16, 11);
        let outcome = execute_tick(arrived, &cfg, &frozen(), &mut rng).unwrap();
        assert_eq!(outcome.report.result, TickResult::ArrivedStartedActivity);
        assert_eq!(outcome.report.action, ActionKind::InteractFood);
        let started = outcome.interaction_started.unwrap();
        assert_eq!(started.location_id, location.id);
        assert_eq!(started.cooldown_until, now + Duration::seconds(300));
        let length = outcome.needs.action_expires_at.unwrap() - now;
        assert!((5..=8).contains(&length.num_seconds()));
    }

    #[test]
    fn vanished_location_frees_the_agent() {
        let now = Utc::now();
        let gone = cafe(Position::new(40, 10));
        let mut ctx = context(now, Position::new(10, 10), Vec::new());
        ctx.needs.current_action = ActionKind::InteractFood;
        ctx.needs.current_target = Some(location_target(&gone));
        ctx.needs.action_started_at = Some(now);
        ctx.needs.action_expires_at = Some(now + Duration::seconds(5));

        let mut rng = SmallRng::seed_from_u64(4);
        let outcome =
            execute_tick(ctx, &DecisionConfig::social_only(), &frozen(), &mut rng).unwrap();
        assert_eq!(outcome.report.result, TickResult::Success);
        assert_ne!(outcome.report.action, ActionKind::InteractFood);
        assert!(!outcome.log_entry.candidates.is_empty());
    }

    #[test]
    fn initiating_records_memory_and_relieves_loneliness() {
        let now = Utc::now();
        let mut ctx = context(now, Position::new(10, 10), Vec::new());
        let other = AgentId::new();
        ctx.needs.loneliness = 0.5;
        ctx.nearby.push(NearbyEntity {
            id: other,
            display_name: None,
            position: Position::new(12, 10),
            distance: 2.0,
            is_online: false,
            sentiment: None,
            familiarity: None,
            last_interaction: None,
        });
        let action = SelectedAction {
            kind: ActionKind::InitiateConversation,
            target: Some(ActionTarget::Avatar {
                id: other,
                name: None,
                position: Some(Position::new(12, 10)),
            }),
            utility: 12.0,
            duration_secs: Some(25.0),
        };
        let mut rng = SmallRng::seed_from_u64(5);
        let out = execute(&ctx, &action, &DecisionConfig::default(), &mut rng);
        assert!((out.needs.loneliness - 0.3).abs() < 1e-9);
        assert!((out.needs.energy - 0.95).abs() < 1e-9);
        assert_eq!(out.memory_updates.len(), 1);
        assert_eq!(out.memory_updates.first().map(|u| u.to), Some(other));
        assert_eq!(out.needs.current_action, ActionKind::InitiateConversation);
        assert_eq!(out.needs.action_started_at, Some(now));
        assert!(out.needs.action_expires_at.is_none());
    }

    #[test]
    fn movement_rules() {
        let from = Position::new(10, 10);
        assert_eq!(step_toward(from, Position::new(20, 10), 3.0, 0.0), Position::new(13, 10));
        assert_eq!(step_toward(from, Position::new(11, 10), 3.0, 0.0), Position::new(11, 10));
        assert_eq!(step_toward(from, from, 3.0, 0.0), from);
        // Avoid floors the divisor at one tile.
        assert_eq!(step_toward(from, Position::new(10, 10), 4.0, 1.0), from);
        assert_eq!(step_toward(from, Position::new(2, 10), 4.0, 1.0), Position::new(6, 10));
        assert_eq!(step_per_axis(from, Position::new(20, 5), 3.0), Position::new(13, 7));
        assert_eq!(step_per_axis(from, Position::new(11, 9), 3.0), Position::new(11, 9));
    }
}
