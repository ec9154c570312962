//! Utility scoring for candidate actions.
//!
//! Five independent terms are computed per candidate, each multiplied by its
//! weight from [`DecisionConfig`], then a weighted Gaussian jitter is added:
//!
//! ```text
//! utility = need + personality + social + affinity - recency + jitter
//! ```
//!
//! Each term is a pure function of the action tag and whatever the target
//! resolves to in the [`DecisionContext`]. The only randomness is the
//! jitter, drawn from the injected generator.

use rand::Rng;
use townsfolk_types::{
    ActionKind, CandidateAction, DecisionContext, NearbyEntity, NeedEffects, NeedState,
    Personality, ScoreBreakdown, SocialMemory, WorldLocation,
};

use crate::config::DecisionConfig;

/// Draw from `N(0, std_dev)` with a Box-Muller transform over two uniform
/// draws.
pub fn gaussian(rng: &mut impl Rng, std_dev: f64) -> f64 {
    // `random` yields [0, 1); flip it so the log never sees zero.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    let radius = (-2.0 * u1.ln()).sqrt();
    radius * (std::f64::consts::TAU * u2).cos() * std_dev
}

/// What a candidate's target resolves to in the context.
#[derive(Debug, Clone, Copy, Default)]
struct Resolved<'a> {
    avatar: Option<&'a NearbyEntity>,
    memory: Option<&'a SocialMemory>,
    location: Option<&'a WorldLocation>,
}

impl<'a> Resolved<'a> {
    fn of(candidate: &CandidateAction, ctx: &'a DecisionContext) -> Self {
        let Some(target) = &candidate.target else {
            return Self::default();
        };
        if let Some(id) = target.avatar_id() {
            return Self {
                avatar: ctx.nearby_entity(id),
                memory: ctx.memory_for(id),
                location: None,
            };
        }
        Self {
            avatar: None,
            memory: None,
            location: target.location_id().and_then(|id| ctx.location(id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// How much one visit to a location would help, before scaling.
///
/// Only helpful directions count: less hunger when hungry, more energy when
/// tired, less loneliness when lonely, a better mood when it has room to
/// improve.
pub fn location_gain(needs: &NeedState, effects: &NeedEffects) -> f64 {
    let hunger = (-effects.hunger).max(0.0) * needs.hunger;
    let energy = effects.energy.max(0.0) * (1.0 - needs.energy);
    let loneliness = (-effects.loneliness).max(0.0) * needs.loneliness;
    let mood = effects.mood.max(0.0) * (1.0 - needs.mood) / 2.0;
    hunger + energy + loneliness + mood
}

/// Unweighted need-satisfaction term.
pub fn need_satisfaction(
    kind: ActionKind,
    needs: &NeedState,
    location: Option<&WorldLocation>,
    config: &DecisionConfig,
) -> f64 {
    let lonely = needs.loneliness;
    match kind {
        ActionKind::InitiateConversation | ActionKind::JoinConversation => {
            lonely.mul_add(3.0, config.conversation_base_bonus) + 2.0
        }
        ActionKind::LeaveConversation => (1.0 - lonely).mul_add(3.0, 1.0),
        ActionKind::Move | ActionKind::AvoidAvatar => {
            lonely.mul_add(2.0, config.movement_base_bonus) + 3.0
        }
        ActionKind::Wander => {
            (1.0 - lonely).mul_add(2.0, config.movement_base_bonus.mul_add(0.8, 2.0))
        }
        ActionKind::Idle | ActionKind::StandStill => {
            (1.0 - needs.energy).mul_add(config.idle_rest_weight, config.idle_penalty)
        }
        ActionKind::WalkToLocation
        | ActionKind::InteractFood
        | ActionKind::InteractKaraoke
        | ActionKind::InteractRest
        | ActionKind::InteractSocialHub
        | ActionKind::InteractWanderPoint => {
            let gain = location.map_or(0.0, |l| location_gain(needs, &l.effects));
            gain.mul_add(config.location_need_scale, config.activity_base_bonus)
        }
    }
}

/// Unweighted personality-alignment term.
///
/// A walk to a location is scored as the activity waiting there.
pub fn personality_alignment(
    kind: ActionKind,
    personality: &Personality,
    location: Option<&WorldLocation>,
) -> f64 {
    let kind = match (kind, location) {
        (ActionKind::WalkToLocation, Some(location)) => location.category.activity(),
        _ => kind,
    };
    let soc = personality.sociability;
    let cur = personality.curiosity;
    let agr = personality.agreeableness;
    let energy = personality.energy_baseline;

    match kind {
        ActionKind::InitiateConversation => agr.mul_add(0.5, soc.mul_add(2.0, 1.0)),
        ActionKind::JoinConversation => agr.mul_add(0.8, soc.mul_add(2.0, 1.0)),
        ActionKind::Wander => energy.mul_add(0.8, cur + 0.4),
        ActionKind::Idle | ActionKind::InteractRest => (1.0 - energy) * 0.3,
        ActionKind::InteractFood => energy.mul_add(0.5, 0.4),
        ActionKind::InteractKaraoke => energy.mul_add(0.5, soc.mul_add(0.6, 0.3)),
        ActionKind::InteractSocialHub => energy.mul_add(0.5, soc * 0.8),
        ActionKind::InteractWanderPoint => energy.mul_add(0.5, cur * 0.7),
        ActionKind::WalkToLocation
        | ActionKind::LeaveConversation
        | ActionKind::AvoidAvatar
        | ActionKind::Move
        | ActionKind::StandStill => 0.0,
    }
}

/// Unweighted social-memory term. Zero without a nearby target avatar.
pub fn social_bias(
    kind: ActionKind,
    target: Option<&NearbyEntity>,
    memory: Option<&SocialMemory>,
) -> f64 {
    let Some(target) = target else {
        return 0.0;
    };
    let mut score = 0.0;

    match memory {
        Some(memory) => {
            if kind == ActionKind::InitiateConversation {
                score += memory.sentiment.mul_add(0.8, memory.familiarity * 0.5);
                if memory.interaction_count > 3 {
                    score += 0.2;
                }
                if memory.interaction_count > 10 {
                    score += 0.2;
                }
                let shared = u32::try_from(memory.mutual_interests.len()).unwrap_or(u32::MAX);
                score += (f64::from(shared) * 0.1).min(0.4);
            }
            if memory.sentiment < -0.5 {
                score -= 0.5;
            }
            if kind == ActionKind::AvoidAvatar {
                score += memory.sentiment.abs() * 1.5;
                if target.distance <= 3.0 {
                    score += 0.5;
                }
            }
        }
        None => {
            if kind == ActionKind::InitiateConversation {
                score += 0.4;
            }
        }
    }

    if target.is_online && kind == ActionKind::InitiateConversation {
        score += 0.2;
    }
    score
}

/// Unweighted world-affinity term for location actions.
///
/// | affinity      | score                |
/// |---------------|----------------------|
/// | `a >= 0.7`    | `0.6 + (a - 0.7) * 2` |
/// | `a >= 0.5`    | `0.2 + (a - 0.5) * 2` |
/// | otherwise     | `a - 0.3`            |
pub fn world_affinity(
    kind: ActionKind,
    personality: &Personality,
    location: Option<&WorldLocation>,
) -> f64 {
    let category = match (kind, location) {
        (ActionKind::WalkToLocation, Some(location)) => location.category,
        (kind, Some(location)) if kind.is_activity() => location.category,
        _ => return 0.0,
    };
    affinity_band(personality.affinity_for(category))
}

fn affinity_band(affinity: f64) -> f64 {
    if affinity >= 0.7 {
        (affinity - 0.7).mul_add(2.0, 0.6)
    } else if affinity >= 0.5 {
        (affinity - 0.5).mul_add(2.0, 0.2)
    } else {
        affinity - 0.3
    }
}

/// Unweighted recency penalty: re-contacting a recent partner, or a
/// location still on cooldown.
pub fn recency_penalty(
    kind: ActionKind,
    memory: Option<&SocialMemory>,
    location: Option<&WorldLocation>,
    ctx: &DecisionContext,
    config: &DecisionConfig,
) -> f64 {
    let mut penalty = 0.0;

    if kind == ActionKind::InitiateConversation
        && let Some(last) = memory.and_then(|m| m.last_interaction)
        && config.recent_interaction_hours > 0.0
    {
        // A last interaction in the future counts as just now.
        let hours = ctx
            .now
            .signed_duration_since(last)
            .to_std()
            .map_or(0.0, |d| d.as_secs_f64() / 3600.0);
        if hours < config.recent_interaction_hours {
            penalty += (hours / config.recent_interaction_hours).mul_add(-0.5, 0.5);
        }
    }

    if let Some(location) = location
        && ctx.on_cooldown(location.id)
    {
        penalty += config.cooldown_penalty;
    }
    penalty
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Fill in the breakdown and utility of one candidate.
pub fn score(
    mut candidate: CandidateAction,
    ctx: &DecisionContext,
    config: &DecisionConfig,
    rng: &mut impl Rng,
) -> CandidateAction {
    let resolved = Resolved::of(&candidate, ctx);
    let kind = candidate.kind;

    let breakdown = ScoreBreakdown {
        need: need_satisfaction(kind, &ctx.needs, resolved.location, config) * config.need_weight,
        personality: personality_alignment(kind, &ctx.personality, resolved.location)
            * config.personality_weight,
        social: social_bias(kind, resolved.avatar, resolved.memory) * config.social_weight,
        affinity: world_affinity(kind, &ctx.personality, resolved.location)
            * config.affinity_weight,
        recency: recency_penalty(kind, resolved.memory, resolved.location, ctx, config)
            * config.recency_weight,
        jitter: gaussian(rng, config.jitter_std_dev) * config.jitter_weight,
    };

    candidate.breakdown = breakdown;
    candidate.utility = breakdown.total();
    candidate
}

/// Score every candidate.
pub fn score_all(
    candidates: Vec<CandidateAction>,
    ctx: &DecisionContext,
    config: &DecisionConfig,
    rng: &mut impl Rng,
) -> Vec<CandidateAction> {
    candidates
        .into_iter()
        .map(|c| score(c, ctx, config, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, Utc};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use townsfolk_types::{ActionTarget, AgentId, LocationCategory, LocationId, Position};

    use super::*;

    fn context() -> DecisionContext {
        let agent_id = AgentId::new();
        DecisionContext {
            agent_id,
            now: Utc::now(),
            position: Position::new(10, 10),
            personality: Personality::with_defaults(agent_id),
            needs: NeedState::new(agent_id),
            social_memories: Vec::new(),
            nearby: Vec::new(),
            locations: Vec::new(),
            cooldowns: BTreeSet::new(),
            in_conversation: false,
            pending_requests: Vec::new(),
        }
    }

    fn cafe() -> WorldLocation {
        WorldLocation {
            id: LocationId::new(),
            name: "Corner Cafe".to_owned(),
            category: LocationCategory::Food,
            position: Position::new(14, 10),
            effects: NeedEffects {
                hunger: -0.4,
                mood: 0.1,
                ..NeedEffects::ZERO
            },
            cooldown_secs: 300,
            duration_secs: 30,
        }
    }

    fn entity(id: AgentId, distance: f64) -> NearbyEntity {
        NearbyEntity {
            id,
            display_name: None,
            position: Position::new(13, 10),
            distance,
            is_online: false,
            sentiment: None,
            familiarity: None,
            last_interaction: None,
        }
    }

    fn memory(from: AgentId, to: AgentId, sentiment: f64, familiarity: f64) -> SocialMemory {
        SocialMemory {
            from,
            to,
            sentiment,
            familiarity,
            interaction_count: 1,
            last_interaction: None,
            last_topic: None,
            mutual_interests: Vec::new(),
            relationship_notes: None,
            conversation_summary: None,
        }
    }

    #[test]
    fn hungry_agent_prefers_food_travel_over_idle() {
        let ctx = context();
        let mut needs = ctx.needs.clone();
        needs.hunger = 0.9;
        let cfg = DecisionConfig::default();
        let cafe = cafe();

        let travel = need_satisfaction(ActionKind::WalkToLocation, &needs, Some(&cafe), &cfg);
        let idle = need_satisfaction(ActionKind::Idle, &needs, None, &cfg);
        assert!(travel > idle, "travel {travel} <= idle {idle}");
        assert!((travel - 3.6).abs() < 1e-9);
    }

    #[test]
    fn tired_agent_finds_idle_less_bad() {
        let ctx = context();
        let cfg = DecisionConfig::default();
        let mut tired = ctx.needs.clone();
        tired.energy = 0.2;
        let rested = need_satisfaction(ActionKind::Idle, &ctx.needs, None, &cfg);
        let weary = need_satisfaction(ActionKind::Idle, &tired, None, &cfg);
        assert!(weary > rested);

        let social = DecisionConfig::social_only();
        let idle = need_satisfaction(ActionKind::Idle, &tired, None, &social);
        assert!((idle + 50.0).abs() < 1e-9);
    }

    #[test]
    fn liked_target_beats_stranger_for_initiation() {
        let me = AgentId::new();
        let (friend, stranger) = (AgentId::new(), AgentId::new());
        let friend_entity = entity(friend, 5.0);
        let stranger_entity = entity(stranger, 5.0);
        let edge = memory(me, friend, 0.8, 0.6);

        let liked = social_bias(
            ActionKind::InitiateConversation,
            Some(&friend_entity),
            Some(&edge),
        );
        let unknown = social_bias(ActionKind::InitiateConversation, Some(&stranger_entity), None);
        assert!(liked > unknown, "liked {liked} <= unknown {unknown}");
    }

    #[test]
    fn social_bias_needs_a_nearby_target() {
        assert!(social_bias(ActionKind::InitiateConversation, None, None).abs() < f64::EPSILON);
    }

    #[test]
    fn avoidance_grows_with_dislike_and_proximity() {
        let me = AgentId::new();
        let foe = AgentId::new();
        let edge = memory(me, foe, -0.8, 0.2);
        let far = social_bias(ActionKind::AvoidAvatar, Some(&entity(foe, 10.0)), Some(&edge));
        let near = social_bias(ActionKind::AvoidAvatar, Some(&entity(foe, 2.0)), Some(&edge));
        // 0.8 * 1.5 - 0.5 for the strong dislike.
        assert!((far - 0.7).abs() < 1e-9);
        assert!((near - far - 0.5).abs() < 1e-9);
    }

    #[test]
    fn affinity_bands() {
        assert!((affinity_band(0.9) - 1.0).abs() < 1e-9);
        assert!((affinity_band(0.6) - 0.4).abs() < 1e-9);
        assert!((affinity_band(0.4) - 0.1).abs() < 1e-9);
        assert!((affinity_band(0.1) + 0.2).abs() < 1e-9);
        let personality = Personality::with_defaults(AgentId::new());
        assert!(world_affinity(ActionKind::Wander, &personality, Some(&cafe())).abs() < 1e-9);
    }

    #[test]
    fn walking_to_a_location_borrows_the_activity_alignment() {
        let personality = Personality::with_defaults(AgentId::new());
        let cafe = cafe();
        let walk = personality_alignment(ActionKind::WalkToLocation, &personality, Some(&cafe));
        let eat = personality_alignment(ActionKind::InteractFood, &personality, None);
        assert!((walk - eat).abs() < 1e-12);
        assert!(walk > 0.0);
    }

    #[test]
    fn recency_penalizes_recent_partners_and_cooldowns() {
        let mut ctx = context();
        let cfg = DecisionConfig::default();
        let partner = AgentId::new();
        let mut edge = memory(ctx.agent_id, partner, 0.5, 0.5);
        edge.last_interaction = Some(ctx.now - Duration::seconds(90));
        let fresh = recency_penalty(ActionKind::InitiateConversation, Some(&edge), None, &ctx, &cfg);
        // 90 s is half of the 0.05 h window.
        assert!((fresh - 0.25).abs() < 1e-9);

        edge.last_interaction = Some(ctx.now - Duration::hours(1));
        let stale = recency_penalty(ActionKind::InitiateConversation, Some(&edge), None, &ctx, &cfg);
        assert!(stale.abs() < f64::EPSILON);

        let cafe = cafe();
        ctx.cooldowns.insert(cafe.id);
        let cooling = recency_penalty(ActionKind::WalkToLocation, None, Some(&cafe), &ctx, &cfg);
        assert!((cooling - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn score_weights_and_sums_terms() {
        let mut ctx = context();
        let cafe = cafe();
        ctx.locations.push(cafe.clone());
        let cfg = DecisionConfig {
            jitter_weight: 0.0,
            ..DecisionConfig::default()
        };
        let candidate = CandidateAction::new(
            ActionKind::WalkToLocation,
            Some(ActionTarget::Location {
                id: cafe.id,
                name: cafe.name.clone(),
                position: cafe.position,
            }),
        );
        let mut rng = SmallRng::seed_from_u64(5);
        let scored = score(candidate, &ctx, &cfg, &mut rng);
        assert!((scored.utility - scored.breakdown.total()).abs() < 1e-12);
        assert!(scored.breakdown.jitter.abs() < f64::EPSILON);
        // Food affinity 0.8 sits in the top band.
        assert!((scored.breakdown.affinity - 0.8).abs() < 1e-9);
    }

    #[test]
    fn gaussian_is_centered_with_the_requested_spread() {
        let mut rng = SmallRng::seed_from_u64(42);
        let draws: Vec<f64> = (0..5000).map(|_| gaussian(&mut rng, 0.1)).collect();
        let n = f64::from(u32::try_from(draws.len()).unwrap_or(1));
        let mean = draws.iter().sum::<f64>() / n;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.01);
        assert!((var.sqrt() - 0.1).abs() < 0.01);
        assert!(draws.iter().all(|d| d.is_finite()));
    }
}
