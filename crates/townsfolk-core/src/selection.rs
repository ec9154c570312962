//! Interrupt check, softmax selection, and action durations.

use rand::Rng;
use townsfolk_types::{
    ActionKind, ActionTarget, CandidateAction, DecisionContext, RequesterKind, SelectedAction,
};
use tracing::debug;

use crate::config::DecisionConfig;

/// Nominal duration of an action in seconds.
pub const fn duration_for(kind: ActionKind) -> f64 {
    match kind {
        ActionKind::Idle | ActionKind::StandStill => 0.5,
        ActionKind::Wander => 8.0,
        ActionKind::WalkToLocation | ActionKind::AvoidAvatar => 5.0,
        ActionKind::InteractFood
        | ActionKind::InteractKaraoke
        | ActionKind::InteractRest
        | ActionKind::InteractSocialHub
        | ActionKind::InteractWanderPoint => 3.0,
        ActionKind::InitiateConversation | ActionKind::JoinConversation => 25.0,
        ActionKind::LeaveConversation => 1.0,
        ActionKind::Move => 6.0,
    }
}

/// Check pending conversation requests before any scoring.
///
/// Requests are examined oldest first and expired ones are skipped. A
/// player's request is always joined. Anyone else's is joined with the
/// configured probability; on a miss the next request is examined.
pub fn check_interrupts(
    ctx: &DecisionContext,
    config: &DecisionConfig,
    rng: &mut impl Rng,
) -> Option<SelectedAction> {
    for request in &ctx.pending_requests {
        if request.expires_at.is_some_and(|expiry| expiry <= ctx.now) {
            continue;
        }
        let utility = match request.requester_kind {
            RequesterKind::Player => config.player_interrupt_score,
            RequesterKind::Robot => {
                if rng.random::<f64>() >= config.robot_accept_probability {
                    continue;
                }
                config.robot_interrupt_score
            }
        };
        debug!(
            agent_id = %ctx.agent_id,
            requester = %request.requester_id,
            kind = ?request.requester_kind,
            "conversation request interrupts decision"
        );
        return Some(SelectedAction {
            kind: ActionKind::JoinConversation,
            target: Some(ActionTarget::Avatar {
                id: request.requester_id,
                name: request.requester_name.clone(),
                position: request.position,
            }),
            utility,
            duration_secs: Some(duration_for(ActionKind::JoinConversation)),
        });
    }
    None
}

/// Sample one candidate from a Boltzmann distribution over utilities.
///
/// Candidates with non-positive utility are dropped unless every candidate
/// is non-positive. Utilities are shifted by their maximum before
/// exponentiating. A temperature that is not positive, or so small that the
/// scaled utilities overflow, degenerates to picking the highest utility
/// (the first one on ties). Returns `None` only for an empty slice.
pub fn softmax_select<'a>(
    candidates: &'a [CandidateAction],
    temperature: f64,
    rng: &mut impl Rng,
) -> Option<&'a CandidateAction> {
    let positive: Vec<&CandidateAction> = candidates.iter().filter(|c| c.utility > 0.0).collect();
    let pool: Vec<&CandidateAction> = if positive.is_empty() {
        candidates.iter().collect()
    } else {
        positive
    };

    match pool.as_slice() {
        [] => return None,
        [only] => return Some(*only),
        _ => {}
    }

    if temperature.is_nan() || temperature <= 0.0 {
        return argmax(&pool);
    }
    let scaled: Vec<f64> = pool.iter().map(|c| c.utility / temperature).collect();
    if scaled.iter().any(|v| !v.is_finite()) {
        return argmax(&pool);
    }
    let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = scaled.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = weights.iter().sum();

    let r = rng.random::<f64>();
    let mut cumulative = 0.0;
    for (candidate, weight) in pool.iter().zip(&weights) {
        cumulative += weight / sum;
        if r <= cumulative {
            return Some(*candidate);
        }
    }
    pool.last().copied()
}

fn argmax<'a>(pool: &[&'a CandidateAction]) -> Option<&'a CandidateAction> {
    pool.iter()
        .copied()
        .reduce(|best, c| if c.utility > best.utility { c } else { best })
}

/// Turn a scored candidate into the action handed to the executor.
pub fn select(candidate: &CandidateAction) -> SelectedAction {
    SelectedAction {
        kind: candidate.kind,
        target: candidate.target.clone(),
        utility: candidate.utility,
        duration_secs: Some(duration_for(candidate.kind)),
    }
}
