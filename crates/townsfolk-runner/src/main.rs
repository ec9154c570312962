//! Demo runner for the Townsfolk decision core.
//!
//! Seeds a small town in memory and polls every resident on its own task,
//! the way a game server would ask each NPC "are you free yet?". When an
//! LLM backend is configured it advises conversations; without one every
//! conversation question is answered by the local rules.
//!
//! # Architecture
//!
//! ```text
//! poll --> TickService --> InMemoryWorld
//!              |
//!   paired? --> ConversationService --> LlmAdvisor (optional, timed out)
//! ```

mod advisor;
mod config;
mod error;
mod llm;
mod parse;
mod population;
mod prompt;

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::advisor::LlmAdvisor;
use crate::config::RunnerConfig;
use crate::llm::LlmClient;
use crate::population::Town;
use crate::prompt::PromptEngine;

/// Application entry point.
///
/// Loads configuration, initializes logging, builds the advisor if one is
/// configured, then seeds and runs the demo town.
///
/// # Errors
///
/// Returns an error if configuration, templates, or the town fail.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RunnerConfig::from_env()?;
    let tuning = config.load_tuning()?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&tuning.logging.level));
    if tuning.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(
        config_path = %config.config_path.display(),
        profile = ?tuning.profile,
        advisor_timeout_ms = tuning.advisor.timeout_ms,
        poll_interval_ms = config.poll_interval.as_millis(),
        "townsfolk-runner starting"
    );

    let advisor = match &config.llm {
        Some(backend) => {
            let prompts = PromptEngine::new(&config.templates_dir)?;
            let client = LlmClient::new(backend);
            info!(
                backend = client.name(),
                model = backend.model,
                templates_dir = config.templates_dir,
                "conversation advisor configured"
            );
            Some(LlmAdvisor::new(client, prompts))
        }
        None => {
            info!("no LLM backend configured, conversations use local rules only");
            None
        }
    };

    let town = Arc::new(Town::new(&tuning, advisor));
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let residents = town.seed(config.demo_agents, &mut rng)?;

    let summaries = Arc::clone(&town)
        .run(&residents, config.demo_ticks, config.poll_interval, config.seed)
        .await?;

    for resident in &residents {
        if let Some(needs) = town.world().needs(resident.id)? {
            info!(
                name = %resident.name,
                action = %needs.current_action,
                energy = needs.energy,
                hunger = needs.hunger,
                loneliness = needs.loneliness,
                mood = needs.mood,
                "final state"
            );
        }
    }

    let decisions: u32 = summaries.values().map(|s| s.decisions).sum();
    let lines: u32 = summaries.values().map(|s| s.lines).sum();
    info!(
        residents = summaries.len(),
        decisions,
        lines,
        "demo finished"
    );

    Ok(())
}
