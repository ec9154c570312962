//! Tick orchestration: lock, load, decide, execute, persist, release.
//!
//! [`TickService::run_tick`] is what a caller polls for each agent. The
//! agent's lock is taken with a bounded retry; contention is not an error,
//! the poll simply yields no decision. Once the lock is held the tick runs
//! synchronously and the lock is given back on every path.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use townsfolk_agents::NeedsConfig;
use townsfolk_types::{AgentId, TickReport};
use tracing::{debug, warn};

use crate::config::{DecisionConfig, TickConfig, TownsfolkConfig};
use crate::decision::DecisionError;
use crate::executor::execute_tick;
use crate::store::{Clock, ContextSource, StateSink, StoreError, TickLock};

/// Errors that can occur while running a tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The store could not be read or written.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The decision pipeline failed.
    #[error("decision error: {source}")]
    Decision {
        /// The underlying decision error.
        #[from]
        source: DecisionError,
    },
}

/// Runs ticks for any agent against a shared store.
#[derive(Debug)]
pub struct TickService<S, C> {
    store: Arc<S>,
    clock: C,
    decision: DecisionConfig,
    needs: NeedsConfig,
    tick: TickConfig,
}

impl<S, C> TickService<S, C>
where
    S: ContextSource + StateSink + TickLock,
    C: Clock,
{
    /// Create a service over `store`, reading the time from `clock`.
    pub fn new(store: Arc<S>, clock: C, config: &TownsfolkConfig) -> Self {
        Self {
            store,
            clock,
            decision: config.decision.clone(),
            needs: config.needs.clone(),
            tick: config.tick.clone(),
        }
    }

    /// The store this service ticks against.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one tick for `agent`.
    ///
    /// Returns `Ok(None)` when the agent's lock could not be taken within
    /// the configured attempts.
    ///
    /// # Errors
    ///
    /// Returns [`TickError`] if the store fails or the pipeline has nothing
    /// to choose from. Nothing is persisted in that case.
    pub async fn run_tick(
        &self,
        agent: AgentId,
        rng: &mut impl Rng,
    ) -> Result<Option<TickReport>, TickError> {
        if !self.acquire(agent).await? {
            warn!(
                agent_id = %agent,
                attempts = self.tick.lock_attempts,
                "tick lock busy, skipping this poll"
            );
            return Ok(None);
        }

        let result = self.tick_locked(agent, rng);
        let released = self.store.release(agent);
        if let Err(e) = &released {
            warn!(agent_id = %agent, error = %e, "failed to release tick lock");
        }
        let report = result?;
        released?;
        Ok(Some(report))
    }

    async fn acquire(&self, agent: AgentId) -> Result<bool, StoreError> {
        let lease = Duration::from_secs(self.tick.lock_lease_secs);
        let backoff = Duration::from_millis(self.tick.lock_backoff_ms);
        let attempts = self.tick.lock_attempts.max(1);
        for attempt in 1..=attempts {
            if self.store.acquire(agent, lease, self.clock.now())? {
                return Ok(true);
            }
            debug!(agent_id = %agent, attempt, "tick lock contended");
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
            }
        }
        Ok(false)
    }

    fn tick_locked(&self, agent: AgentId, rng: &mut impl Rng) -> Result<TickReport, TickError> {
        let now = self.clock.now();
        let ctx = self.store.build_context(agent, now)?;
        let outcome = execute_tick(ctx, &self.decision, &self.needs, rng)?;
        self.store.save_tick(&outcome, self.tick.decision_log)?;
        Ok(outcome.report)
    }
}
