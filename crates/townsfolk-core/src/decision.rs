//! The decision pipeline: interrupts, generation, scoring, selection.

use rand::Rng;
use townsfolk_types::{AgentId, CandidateAction, DecisionContext, SelectedAction};
use tracing::{debug, error};

use crate::candidates;
use crate::config::DecisionConfig;
use crate::scoring;
use crate::selection;

/// Errors that can occur while deciding.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// Nothing was left to choose from. Generation always yields idle, so
    /// this is a broken invariant rather than a runtime condition.
    #[error("no candidate actions for agent {agent_id}")]
    EmptyCandidates {
        /// The agent being decided for.
        agent_id: AgentId,
    },
}

/// What the pipeline chose and what it chose from.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// The action to execute.
    pub selected: SelectedAction,
    /// Every scored candidate. Empty when an interrupt fired.
    pub candidates: Vec<CandidateAction>,
}

/// Decide what the agent in `ctx` does next.
///
/// A live conversation request may short-circuit everything; otherwise
/// candidates are generated, scored, and sampled at the configured
/// temperature.
///
/// # Errors
///
/// Returns [`DecisionError::EmptyCandidates`] if generation produced
/// nothing, which cannot happen unless generation is broken.
pub fn make_decision(
    ctx: &DecisionContext,
    config: &DecisionConfig,
    rng: &mut impl Rng,
) -> Result<Decision, DecisionError> {
    if let Some(selected) = selection::check_interrupts(ctx, config, rng) {
        return Ok(Decision {
            selected,
            candidates: Vec::new(),
        });
    }

    let generated = candidates::generate(ctx, config, rng);
    let scored = scoring::score_all(generated, ctx, config, rng);

    let Some(chosen) = selection::softmax_select(&scored, config.temperature, rng) else {
        error!(agent_id = %ctx.agent_id, "candidate generation produced no actions");
        return Err(DecisionError::EmptyCandidates {
            agent_id: ctx.agent_id,
        });
    };
    let selected = selection::select(chosen);

    debug!(
        agent_id = %ctx.agent_id,
        action = %selected.kind,
        utility = selected.utility,
        candidates = scored.len(),
        "action selected"
    );
    Ok(Decision {
        selected,
        candidates: scored,
    })
}
