//! Need dynamics: time decay, effect application, and manual overrides.
//!
//! Every function here leaves `energy`, `hunger` and `loneliness` inside
//! `[0, 1]` and `mood` inside `[-1, 1]`, whatever the input magnitudes or
//! the elapsed time. Non-finite deltas count as zero.
//!
//! Decay never touches `last_tick`; the caller stamps it when the tick's
//! state is written.

use chrono::{DateTime, Utc};
use townsfolk_types::{NeedEffects, NeedState};
use tracing::warn;

use crate::config::{DriftPolicy, NeedsConfig};
use crate::error::AgentError;

// ---------------------------------------------------------------------------
// Clamping
// ---------------------------------------------------------------------------

/// Clamp into `[0, 1]`. NaN collapses to 0.
pub const fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamp into `[-1, 1]`. NaN collapses to 0.
pub const fn clamp_signed(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

const fn finite_or_zero(delta: f64) -> f64 {
    if delta.is_finite() { delta } else { 0.0 }
}

// ---------------------------------------------------------------------------
// Decay
// ---------------------------------------------------------------------------

/// Seconds since `last_tick`, or the configured default when the agent has
/// never been ticked. Clock skew never yields a negative value.
pub fn elapsed_secs(last_tick: Option<DateTime<Utc>>, now: DateTime<Utc>, config: &NeedsConfig) -> f64 {
    last_tick.map_or(config.default_elapsed_secs, |last| {
        now.signed_duration_since(last).to_std().map_or(0.0, |d| d.as_secs_f64())
    })
}

/// Apply one decay pass for the time elapsed since the agent's last tick.
///
/// # Formulas
///
/// With `tf = elapsed / reference_interval`:
///
/// ```text
/// loneliness = min(1, l + loneliness_growth * tf)
/// mood       = max(mood_floor, m * max(0, 1 - mood_decay * tf))
/// energy     = pinned value | max(0, e - rate * tf)
/// hunger     = pinned value | min(1, h + rate * tf)
/// ```
pub fn decay(needs: &mut NeedState, now: DateTime<Utc>, config: &NeedsConfig) {
    let elapsed = elapsed_secs(needs.last_tick, now, config);
    let tf = if config.reference_interval_secs > 0.0 {
        elapsed / config.reference_interval_secs
    } else {
        0.0
    };

    needs.loneliness = clamp_unit(config.loneliness_growth.mul_add(tf, needs.loneliness));

    // The factor bottoms out at zero so long gaps never flip the sign.
    let factor = (-config.mood_decay).mul_add(tf, 1.0).max(0.0);
    let decayed = needs.mood * factor;
    needs.mood = clamp_signed(decayed.max(config.mood_floor));

    needs.energy = match config.energy {
        DriftPolicy::Pinned { value } => clamp_unit(value),
        DriftPolicy::Drift { rate } => clamp_unit((-rate).mul_add(tf, needs.energy)),
    };
    needs.hunger = match config.hunger {
        DriftPolicy::Pinned { value } => clamp_unit(value),
        DriftPolicy::Drift { rate } => clamp_unit(rate.mul_add(tf, needs.hunger)),
    };
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Add per-need deltas and clamp each need to its range.
pub fn apply_effects(needs: &mut NeedState, effects: &NeedEffects) {
    needs.energy = clamp_unit(needs.energy + finite_or_zero(effects.energy));
    needs.hunger = clamp_unit(needs.hunger + finite_or_zero(effects.hunger));
    needs.loneliness = clamp_unit(needs.loneliness + finite_or_zero(effects.loneliness));
    needs.mood = clamp_signed(needs.mood + finite_or_zero(effects.mood));
}

/// Need deltas for one participant once a conversation is over.
///
/// `sentiment` is how the conversation went for them in `[-1, 1]`,
/// `quality` how substantial it was in `[0, 1]`.
pub fn conversation_outcome(sentiment: f64, quality: f64, message_count: usize) -> NeedEffects {
    let sentiment = clamp_signed(sentiment);
    let quality = clamp_unit(quality);
    let capped_15 = f64::from(u32::try_from(message_count.min(15)).unwrap_or(15));
    let capped_10 = f64::from(u32::try_from(message_count.min(10)).unwrap_or(10));

    let tiring = capped_15.mul_add(0.005, 0.03);
    let energy = if sentiment > 0.5 { -tiring * 0.5 } else { -tiring };

    let relief = capped_10.mul_add(0.01, quality.mul_add(0.15, 0.1));
    let relief_scale = if sentiment > 0.3 {
        1.3
    } else if sentiment < -0.3 {
        0.5
    } else {
        1.0
    };

    NeedEffects {
        energy,
        hunger: capped_15.mul_add(0.003, 0.02),
        loneliness: -relief * relief_scale,
        mood: sentiment * 0.15 * quality.mul_add(0.5, 0.5),
    }
}

// ---------------------------------------------------------------------------
// Overrides and repair
// ---------------------------------------------------------------------------

/// An operator override of an agent's needs. `None` leaves a need alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeedOverride {
    /// New energy.
    pub energy: Option<f64>,
    /// New hunger.
    pub hunger: Option<f64>,
    /// New loneliness.
    pub loneliness: Option<f64>,
    /// New mood.
    pub mood: Option<f64>,
}

/// Overwrite the provided needs, clamping each into its range.
///
/// Nothing is written unless every provided value is finite.
pub fn set_needs(needs: &mut NeedState, update: NeedOverride) -> Result<(), AgentError> {
    let fields = [
        ("energy", update.energy),
        ("hunger", update.hunger),
        ("loneliness", update.loneliness),
        ("mood", update.mood),
    ];
    for (need, value) in fields {
        if let Some(value) = value
            && !value.is_finite()
        {
            return Err(AgentError::InvalidNeedValue { need, value });
        }
    }

    if let Some(v) = update.energy {
        needs.energy = clamp_unit(v);
    }
    if let Some(v) = update.hunger {
        needs.hunger = clamp_unit(v);
    }
    if let Some(v) = update.loneliness {
        needs.loneliness = clamp_unit(v);
    }
    if let Some(v) = update.mood {
        needs.mood = clamp_signed(v);
    }
    Ok(())
}

/// Bring a loaded state back inside its invariants.
///
/// Out-of-range needs are clamped. An expiry without a start, or before its
/// start, is dropped. Returns whether anything changed.
pub fn repair(needs: &mut NeedState) -> bool {
    let before = needs.snapshot();
    needs.energy = clamp_unit(needs.energy);
    needs.hunger = clamp_unit(needs.hunger);
    needs.loneliness = clamp_unit(needs.loneliness);
    needs.mood = clamp_signed(needs.mood);
    let mut changed = needs.snapshot() != before;

    if !needs.has_consistent_timestamps() {
        warn!(
            agent_id = %needs.agent_id,
            action = %needs.current_action,
            "dropping action expiry with inconsistent start"
        );
        needs.action_expires_at = None;
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use townsfolk_types::{ActionKind, AgentId};

    use super::*;

    fn in_bounds(needs: &NeedState) -> bool {
        (0.0..=1.0).contains(&needs.energy)
            && (0.0..=1.0).contains(&needs.hunger)
            && (0.0..=1.0).contains(&needs.loneliness)
            && (-1.0..=1.0).contains(&needs.mood)
    }

    #[test]
    fn decay_stays_in_bounds_for_extreme_inputs() {
        let now = Utc::now();
        let magnitudes = [-1e12, -3.0, -0.5, 0.0, 0.5, 3.0, 1e12, f64::INFINITY, f64::NAN];
        let gaps = [0, 1, 300, 86_400, 10_000_000_000];
        for config in [NeedsConfig::default(), NeedsConfig::social_only()] {
            for &m in &magnitudes {
                for &gap in &gaps {
                    let mut needs = NeedState::new(AgentId::new());
                    needs.energy = m;
                    needs.hunger = m;
                    needs.loneliness = m;
                    needs.mood = m;
                    needs.last_tick = Some(now - Duration::seconds(gap));
                    decay(&mut needs, now, &config);
                    assert!(in_bounds(&needs), "out of bounds for {m} after {gap}s");
                }
            }
        }
    }

    #[test]
    fn long_absence_never_flips_mood() {
        let now = Utc::now();
        let config = NeedsConfig::default();
        for start in [-0.5, 0.9] {
            let mut needs = NeedState::new(AgentId::new());
            needs.mood = start;
            needs.last_tick = Some(now - Duration::hours(100));
            decay(&mut needs, now, &config);
            assert!(
                (needs.mood - config.mood_floor).abs() < f64::EPSILON,
                "mood from {start} ended at {}",
                needs.mood
            );
        }
    }

    #[test]
    fn effects_stay_in_bounds_for_extreme_deltas() {
        let deltas = [-1e9, -1.0, 0.3, 1e9, f64::NAN, f64::NEG_INFINITY];
        for &d in &deltas {
            let mut needs = NeedState::new(AgentId::new());
            let effects = NeedEffects {
                energy: d,
                hunger: d,
                loneliness: d,
                mood: d,
            };
            apply_effects(&mut needs, &effects);
            apply_effects(&mut needs, &effects);
            assert!(in_bounds(&needs));
        }
    }

    #[test]
    fn hunger_effect_round_trip_clamps_at_zero() {
        let mut needs = NeedState::new(AgentId::new());
        needs.hunger = 0.5;
        let meal = NeedEffects {
            hunger: -0.4,
            ..NeedEffects::ZERO
        };
        apply_effects(&mut needs, &meal);
        assert!((needs.hunger - 0.1).abs() < 1e-9);
        apply_effects(&mut needs, &meal);
        assert!(needs.hunger.abs() < f64::EPSILON);
        assert!(needs.hunger >= 0.0);
    }

    #[test]
    fn one_reference_interval_of_decay() {
        let now = Utc::now();
        let mut needs = NeedState::new(AgentId::new());
        needs.loneliness = 0.5;
        needs.energy = 0.5;
        needs.hunger = 0.5;
        needs.last_tick = Some(now - Duration::seconds(300));
        decay(&mut needs, now, &NeedsConfig::default());
        assert!((needs.loneliness - 0.52).abs() < 1e-9);
        assert!((needs.mood - 0.995).abs() < 1e-9);
        assert!((needs.energy - 0.48).abs() < 1e-9);
        assert!((needs.hunger - 0.53).abs() < 1e-9);
    }

    #[test]
    fn pinned_needs_are_reset() {
        let now = Utc::now();
        let mut needs = NeedState::new(AgentId::new());
        needs.energy = 0.2;
        needs.hunger = 0.9;
        needs.last_tick = Some(now);
        decay(&mut needs, now, &NeedsConfig::social_only());
        assert!((needs.energy - 1.0).abs() < f64::EPSILON);
        assert!(needs.hunger.abs() < f64::EPSILON);
    }

    #[test]
    fn low_mood_is_lifted_to_floor() {
        let now = Utc::now();
        let mut needs = NeedState::new(AgentId::new());
        needs.mood = -0.6;
        needs.last_tick = Some(now);
        decay(&mut needs, now, &NeedsConfig::default());
        assert!((needs.mood - 0.3).abs() < 1e-9);
    }

    #[test]
    fn never_ticked_uses_default_elapsed() {
        let now = Utc::now();
        let cfg = NeedsConfig::default();
        assert!((elapsed_secs(None, now, &cfg) - 300.0).abs() < f64::EPSILON);
        // Clock skew: a last tick in the future counts as no time at all.
        let future = now + Duration::seconds(30);
        assert!(elapsed_secs(Some(future), now, &cfg).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_does_not_touch_bookkeeping() {
        let now = Utc::now();
        let mut needs = NeedState::new(AgentId::new());
        let stamp = now - Duration::seconds(60);
        needs.last_tick = Some(stamp);
        needs.current_action = ActionKind::Wander;
        decay(&mut needs, now, &NeedsConfig::default());
        assert_eq!(needs.last_tick, Some(stamp));
        assert_eq!(needs.current_action, ActionKind::Wander);
    }

    #[test]
    fn set_needs_clamps_and_rejects_non_finite() {
        let mut needs = NeedState::new(AgentId::new());
        let update = NeedOverride {
            energy: Some(4.0),
            mood: Some(-9.0),
            ..NeedOverride::default()
        };
        assert!(set_needs(&mut needs, update).is_ok());
        assert!((needs.energy - 1.0).abs() < f64::EPSILON);
        assert!((needs.mood + 1.0).abs() < f64::EPSILON);

        let bad = NeedOverride {
            hunger: Some(0.4),
            loneliness: Some(f64::NAN),
            ..NeedOverride::default()
        };
        assert!(matches!(
            set_needs(&mut needs, bad),
            Err(AgentError::InvalidNeedValue { need: "loneliness", .. })
        ));
        // Nothing from the rejected override was written.
        assert!(needs.hunger.abs() < f64::EPSILON);
    }

    #[test]
    fn repair_drops_orphan_expiry() {
        let mut needs = NeedState::new(AgentId::new());
        needs.action_expires_at = Some(Utc::now());
        assert!(repair(&mut needs));
        assert!(needs.action_expires_at.is_none());
        assert!(!repair(&mut needs));
    }

    #[test]
    fn conversation_outcome_shapes() {
        let good = conversation_outcome(0.8, 1.0, 12);
        assert!(good.energy < 0.0);
        assert!(good.loneliness < -0.3);
        assert!(good.mood > 0.0);
        assert!((good.hunger - (0.02 + 12.0 * 0.003)).abs() < 1e-9);

        let bad = conversation_outcome(-0.8, 0.0, 4);
        assert!(bad.mood < 0.0);
        assert!((bad.loneliness + (0.1 + 0.04) * 0.5).abs() < 1e-9);
    }
}
