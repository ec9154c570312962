//! Socially biased wander targets.
//!
//! A wander target is half a random step and half a pull toward liked
//! avatars (or a push away from disliked ones). With nobody nearby the
//! target is purely random.

use std::f64::consts::TAU;

use rand::Rng;
use townsfolk_types::{DecisionContext, Position};

use crate::config::DecisionConfig;

/// Loneliness above which strangers look slightly attractive and liked
/// avatars pull harder.
const LONELY_THRESHOLD: f64 = 0.5;

/// Sentiment assumed for a stranger when the agent is lonely.
const LONELY_STRANGER_SENTIMENT: f64 = 0.1;

/// Mood below which disliked avatars push harder.
const LOW_MOOD_THRESHOLD: f64 = 0.3;

/// Truncate a continuous coordinate to a tile index, saturating at the
/// `i32` range.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn to_tile(value: f64) -> i32 {
    if value.is_nan() { 0 } else { value.trunc() as i32 }
}

/// Clamp a coordinate into `[margin, limit - 2]` on both axes.
pub(crate) fn clamp_to_map(x: i32, y: i32, margin: i32, config: &DecisionConfig) -> Position {
    let max_x = config.map_width.saturating_sub(2).max(margin);
    let max_y = config.map_height.saturating_sub(2).max(margin);
    Position::new(x.clamp(margin, max_x), y.clamp(margin, max_y))
}

/// Uniform draw in `[low, high)`. Tolerates an inverted range.
fn uniform(rng: &mut impl Rng, low: f64, high: f64) -> f64 {
    (high - low).mul_add(rng.random::<f64>(), low)
}

/// Compute this tick's wander target for the agent in `ctx`.
///
/// 1. Draw a random heading and a distance in the configured range.
/// 2. Sum the unit directions toward each nearby avatar, weighted by
///    sentiment, distance, familiarity, loneliness, and mood.
/// 3. Normalize the social vector and rescale it to the drawn distance.
/// 4. Blend social and random components and clamp to the map with a
///    two-tile margin.
pub fn wander_target(ctx: &DecisionContext, config: &DecisionConfig, rng: &mut impl Rng) -> Position {
    let angle = uniform(rng, 0.0, TAU);
    let distance = uniform(rng, config.wander_min_distance, config.wander_max_distance);
    let random_dx = angle.cos() * distance;
    let random_dy = angle.sin() * distance;

    let here = ctx.position;
    let loneliness = ctx.needs.loneliness;
    let mood = ctx.needs.mood;

    let mut social_dx = 0.0;
    let mut social_dy = 0.0;
    let mut total = 0.0;

    for entity in &ctx.nearby {
        let (sentiment, familiarity) = ctx.memory_for(entity.id).map_or_else(
            || {
                let sentiment = if loneliness > LONELY_THRESHOLD {
                    LONELY_STRANGER_SENTIMENT
                } else {
                    0.0
                };
                (sentiment, 0.0)
            },
            |m| (m.sentiment, m.familiarity),
        );

        let d = entity.distance.max(1.0);
        let dx = (f64::from(entity.position.x) - f64::from(here.x)) / d;
        let dy = (f64::from(entity.position.y) - f64::from(here.y)) / d;

        let distance_weight = 1.0 / d.mul_add(0.1, 1.0);
        let mut influence = sentiment * distance_weight * familiarity.mul_add(0.5, 1.0);
        if sentiment > 0.0 && loneliness > LONELY_THRESHOLD {
            influence *= 1.0 + loneliness;
        }
        if sentiment < 0.0 && mood < LOW_MOOD_THRESHOLD {
            influence *= 1.5;
        }

        social_dx += dx * influence;
        social_dy += dy * influence;
        total += influence.abs();
    }

    if total > 0.0 {
        social_dx /= total;
        social_dy /= total;
        let magnitude = social_dx.hypot(social_dy);
        if magnitude > 0.0 {
            social_dx = social_dx / magnitude * distance;
            social_dy = social_dy / magnitude * distance;
        }
    }

    let (final_dx, final_dy) = if ctx.nearby.is_empty() {
        (random_dx, random_dy)
    } else {
        (
            social_dx.mul_add(
                config.social_wander_influence,
                random_dx * config.wander_randomness,
            ),
            social_dy.mul_add(
                config.social_wander_influence,
                random_dy * config.wander_randomness,
            ),
        )
    };

    clamp_to_map(
        to_tile(f64::from(here.x) + final_dx),
        to_tile(f64::from(here.y) + final_dy),
        2,
        config,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use townsfolk_types::{AgentId, NearbyEntity, NeedState, Personality, SocialMemory};

    use super::*;

    fn context_at(position: Position) -> DecisionContext {
        let agent_id = AgentId::new();
        DecisionContext {
            agent_id,
            now: Utc::now(),
            position,
            personality: Personality::neutral(agent_id),
            needs: NeedState::new(agent_id),
            social_memories: Vec::new(),
            nearby: Vec::new(),
            locations: Vec::new(),
            cooldowns: BTreeSet::new(),
            in_conversation: false,
            pending_requests: Vec::new(),
        }
    }

    fn friend_at(ctx: &mut DecisionContext, position: Position, sentiment: f64) {
        let id = AgentId::new();
        ctx.nearby.push(NearbyEntity {
            id,
            display_name: None,
            position,
            distance: ctx.position.distance_to(position),
            is_online: false,
            sentiment: Some(sentiment),
            familiarity: Some(0.8),
            last_interaction: None,
        });
        ctx.social_memories.push(SocialMemory {
            from: ctx.agent_id,
            to: id,
            sentiment,
            familiarity: 0.8,
            interaction_count: 4,
            last_interaction: None,
            last_topic: None,
            mutual_interests: Vec::new(),
            relationship_notes: None,
            conversation_summary: None,
        });
    }

    #[test]
    fn targets_stay_inside_the_margin() {
        let cfg = DecisionConfig::default();
        let mut rng = SmallRng::seed_from_u64(7);
        for corner in [Position::new(0, 0), Position::new(59, 39), Position::new(2, 38)] {
            let ctx = context_at(corner);
            for _ in 0..200 {
                let target = wander_target(&ctx, &cfg, &mut rng);
                assert!((2..=58).contains(&target.x));
                assert!((2..=38).contains(&target.y));
            }
        }
    }

    #[test]
    fn liked_avatar_pulls_the_target() {
        let cfg = DecisionConfig::default();
        let mut rng = SmallRng::seed_from_u64(11);
        let mut ctx = context_at(Position::new(30, 20));
        friend_at(&mut ctx, Position::new(45, 20), 0.9);

        let east = (0..400)
            .filter(|_| wander_target(&ctx, &cfg, &mut rng).x > 30)
            .count();
        assert!(east > 240, "only {east} of 400 targets went east");
    }

    #[test]
    fn disliked_avatar_pushes_the_target() {
        let cfg = DecisionConfig::default();
        let mut rng = SmallRng::seed_from_u64(13);
        let mut ctx = context_at(Position::new(30, 20));
        friend_at(&mut ctx, Position::new(45, 20), -0.9);

        let west = (0..400)
            .filter(|_| wander_target(&ctx, &cfg, &mut rng).x < 30)
            .count();
        assert!(west > 300, "only {west} of 400 targets went west");
    }

    #[test]
    fn to_tile_truncates_toward_zero() {
        assert_eq!(to_tile(3.9), 3);
        assert_eq!(to_tile(-3.9), -3);
        assert_eq!(to_tile(f64::NAN), 0);
    }
}
