//! Candidate generation: the feasible actions for one tick.
//!
//! The list always contains [`ActionKind::Idle`] and [`ActionKind::Wander`],
//! so the selector never sees an empty set from here. Social options depend
//! on who is nearby and how the agent feels about them; location options
//! are a configuration knob.

use rand::Rng;
use townsfolk_types::{
    ActionKind, ActionTarget, CandidateAction, DecisionContext, NearbyEntity, Position,
};

use crate::config::DecisionConfig;
use crate::wander::{clamp_to_map, to_tile, wander_target};

/// Build every feasible action for the agent in `ctx`, unscored.
pub fn generate(
    ctx: &DecisionContext,
    config: &DecisionConfig,
    rng: &mut impl Rng,
) -> Vec<CandidateAction> {
    let mut candidates = vec![
        CandidateAction::new(ActionKind::Idle, None),
        CandidateAction::new(
            ActionKind::Wander,
            Some(ActionTarget::Position {
                position: wander_target(ctx, config, rng),
            }),
        ),
    ];

    if config.generate_location_actions {
        candidates.extend(ctx.locations.iter().map(|location| {
            CandidateAction::new(
                ActionKind::WalkToLocation,
                Some(ActionTarget::Location {
                    id: location.id,
                    name: location.name.clone(),
                    position: location.position,
                }),
            )
        }));
    }

    if ctx.in_conversation {
        candidates.push(CandidateAction::new(ActionKind::LeaveConversation, None));
    } else {
        candidates.extend(
            ctx.nearby
                .iter()
                .filter_map(|entity| social_candidate(ctx, entity, config)),
        );
    }

    candidates
}

/// The one social option a nearby avatar offers, if any: avoid when
/// disliked and close, talk when close, approach when in range.
fn social_candidate(
    ctx: &DecisionContext,
    entity: &NearbyEntity,
    config: &DecisionConfig,
) -> Option<CandidateAction> {
    let sentiment = ctx
        .memory_for(entity.id)
        .map(|m| m.sentiment)
        .or(entity.sentiment);
    let disliked = sentiment.is_some_and(|s| s < config.dislike_threshold);

    let (kind, heading) = if disliked && entity.distance <= config.avoid_radius() {
        (
            ActionKind::AvoidAvatar,
            flee_point(ctx.position, entity.position, config),
        )
    } else if entity.distance <= config.conversation_radius {
        (ActionKind::InitiateConversation, entity.position)
    } else if entity.distance <= config.approach_radius {
        (ActionKind::Move, entity.position)
    } else {
        return None;
    };

    Some(CandidateAction::new(
        kind,
        Some(ActionTarget::Avatar {
            id: entity.id,
            name: entity.display_name.clone(),
            position: Some(heading),
        }),
    ))
}

/// A point `flee_distance` tiles from `from`, directly away from `threat`,
/// clamped to `[1, W-2] x [1, H-2]`.
pub fn flee_point(from: Position, threat: Position, config: &DecisionConfig) -> Position {
    let dx = f64::from(from.x) - f64::from(threat.x);
    let dy = f64::from(from.y) - f64::from(threat.y);
    let d = dx.hypot(dy).max(1.0);
    let x = to_tile((dx / d).mul_add(config.flee_distance, f64::from(from.x)));
    let y = to_tile((dy / d).mul_add(config.flee_distance, f64::from(from.y)));
    clamp_to_map(x, y, 1, config)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use townsfolk_types::{
        AgentId, LocationCategory, LocationId, NeedEffects, NeedState, Personality, SocialMemory,
        WorldLocation,
    };

    use super::*;

    fn context() -> DecisionContext {
        let agent_id = AgentId::new();
        DecisionContext {
            agent_id,
            now: Utc::now(),
            position: Position::new(30, 20),
            personality: Personality::neutral(agent_id),
            needs: NeedState::new(agent_id),
            social_memories: Vec::new(),
            nearby: Vec::new(),
            locations: vec![WorldLocation {
                id: LocationId::new(),
                name: "Corner Cafe".to_owned(),
                category: LocationCategory::Food,
                position: Position::new(5, 5),
                effects: NeedEffects::ZERO,
                cooldown_secs: 300,
                duration_secs: 30,
            }],
            cooldowns: BTreeSet::new(),
            in_conversation: false,
            pending_requests: Vec::new(),
        }
    }

    fn add_nearby(ctx: &mut DecisionContext, dx: i32, sentiment: Option<f64>) -> AgentId {
        let id = AgentId::new();
        let position = Position::new(ctx.position.x.saturating_add(dx), ctx.position.y);
        ctx.nearby.push(NearbyEntity {
            id,
            display_name: Some("Ana".to_owned()),
            position,
            distance: ctx.position.distance_to(position),
            is_online: false,
            sentiment,
            familiarity: sentiment.map(|_| 0.3),
            last_interaction: None,
        });
        if let Some(sentiment) = sentiment {
            ctx.social_memories.push(SocialMemory {
                from: ctx.agent_id,
                to: id,
                sentiment,
                familiarity: 0.3,
                interaction_count: 2,
                last_interaction: None,
                last_topic: None,
                mutual_interests: Vec::new(),
                relationship_notes: None,
                conversation_summary: None,
            });
        }
        id
    }

    fn kinds(candidates: &[CandidateAction]) -> Vec<ActionKind> {
        candidates.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn idle_and_wander_are_always_present() {
        let ctx = context();
        let mut rng = SmallRng::seed_from_u64(1);
        for config in [DecisionConfig::default(), DecisionConfig::social_only()] {
            let kinds = kinds(&generate(&ctx, &config, &mut rng));
            assert!(kinds.contains(&ActionKind::Idle));
            assert!(kinds.contains(&ActionKind::Wander));
        }
    }

    #[test]
    fn location_actions_follow_the_knob() {
        let ctx = context();
        let mut rng = SmallRng::seed_from_u64(2);
        let general = generate(&ctx, &DecisionConfig::default(), &mut rng);
        assert!(kinds(&general).contains(&ActionKind::WalkToLocation));
        let social = generate(&ctx, &DecisionConfig::social_only(), &mut rng);
        assert!(!kinds(&social).contains(&ActionKind::WalkToLocation));
    }

    #[test]
    fn nearby_avatars_map_to_social_options_by_distance() {
        let mut ctx = context();
        let close = add_nearby(&mut ctx, 3, None);
        let mid = add_nearby(&mut ctx, 20, Some(0.4));
        let _far = add_nearby(&mut ctx, -29, None);
        // Disliked and inside the extended radius: avoid instead of talk.
        let enemy = add_nearby(&mut ctx, -17, Some(-0.6));
        let mut rng = SmallRng::seed_from_u64(3);
        let candidates = generate(&ctx, &DecisionConfig::social_only(), &mut rng);

        let find = |id: AgentId| {
            candidates
                .iter()
                .find(|c| c.target.as_ref().and_then(ActionTarget::avatar_id) == Some(id))
                .map(|c| c.kind)
        };
        assert_eq!(find(close), Some(ActionKind::InitiateConversation));
        assert_eq!(find(mid), Some(ActionKind::Move));
        assert_eq!(find(enemy), Some(ActionKind::AvoidAvatar));
        assert_eq!(
            candidates
                .iter()
                .filter(|c| c.kind == ActionKind::Move)
                .count(),
            2
        );
    }

    #[test]
    fn conversing_agents_can_only_leave() {
        let mut ctx = context();
        add_nearby(&mut ctx, 3, None);
        ctx.in_conversation = true;
        let mut rng = SmallRng::seed_from_u64(4);
        let kinds = kinds(&generate(&ctx, &DecisionConfig::social_only(), &mut rng));
        assert_eq!(
            kinds,
            vec![
                ActionKind::Idle,
                ActionKind::Wander,
                ActionKind::LeaveConversation
            ]
        );
    }

    #[test]
    fn flee_point_moves_directly_away_and_clamps() {
        let cfg = DecisionConfig::default();
        let flee = flee_point(Position::new(30, 20), Position::new(33, 24), &cfg);
        assert_eq!(flee, Position::new(27, 16));

        let cornered = flee_point(Position::new(1, 1), Position::new(4, 4), &cfg);
        assert_eq!(cornered, Position::new(1, 1));
    }
}
