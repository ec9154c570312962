//! The demo town: a small population driven by the decision core.
//!
//! [`Town::seed`] lays out a handful of locations and residents with varied
//! personalities. [`Town::run`] then polls every resident on its own task.
//! Paired residents trade scripted small talk through the conversation
//! service, which classifies each line, decides when someone walks away,
//! and records the result on both sides.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::Utc;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use townsfolk_agents::ConversationOutcome;
use townsfolk_core::{
    ContextSource, ConversationAdvisor, ConversationService, InMemoryWorld, SystemClock,
    TickService, TownsfolkConfig,
};
use townsfolk_types::{
    ActionKind, ActionTarget, AgentId, LocationCategory, LocationId, NeedEffects, Personality,
    Position, TickReport, TranscriptMessage, WorldLocation,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const NAMES: &[&str] = &[
    "Ada", "Brook", "Cyrus", "Dana", "Ezra", "Fern", "Gus", "Hana", "Ivo", "Juno", "Kit", "Lena",
];

const STYLES: &[&str] = &[
    "Warm and chatty, asks lots of questions.",
    "Dry humor, short sentences.",
    "Earnest and a little formal.",
    "Excitable, jumps between topics.",
];

const SMALL_TALK: &[&str] = &[
    "Nice weather for a walk today.",
    "Have you tried the noodles at the cafe? They're amazing!",
    "I was just at the fountain, it's packed.",
    "What have you been up to?",
    "I love the music over at the karaoke bar.",
    "Honestly, this is kind of boring.",
    "Thanks for stopping to chat.",
    "Did you hear someone won the arcade tournament?",
];

/// Length at which a transcript counts as a full conversation.
const FULL_CONVERSATION: f64 = 10.0;

/// Someone who lives in the demo town.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resident {
    /// Their id.
    pub id: AgentId,
    /// Their display name.
    pub name: String,
}

/// What one resident's task did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidentSummary {
    /// Ticks that produced a decision.
    pub decisions: u32,
    /// Polls skipped because the tick lock was busy.
    pub skipped: u32,
    /// Ticks that failed.
    pub failures: u32,
    /// Lines spoken in conversations.
    pub lines: u32,
}

#[derive(Debug, Default)]
struct Chat {
    transcript: Vec<TranscriptMessage>,
    sentiment_sum: f64,
}

/// A world, the services that drive it, and the conversations in flight.
pub struct Town<A> {
    world: Arc<InMemoryWorld>,
    ticks: TickService<InMemoryWorld, SystemClock>,
    talk: ConversationService<InMemoryWorld, A>,
    chats: Mutex<BTreeMap<(AgentId, AgentId), Chat>>,
}

impl<A> Town<A>
where
    A: ConversationAdvisor + 'static,
{
    /// Build an empty town from the tuning file.
    pub fn new(tuning: &TownsfolkConfig, advisor: Option<A>) -> Self {
        let world = Arc::new(
            InMemoryWorld::new(tuning.tick.nearby_radius)
                .with_decision_log_capacity(tuning.tick.decision_log_capacity),
        );
        Self {
            ticks: TickService::new(Arc::clone(&world), SystemClock, tuning),
            talk: ConversationService::new(Arc::clone(&world), advisor, tuning),
            world,
            chats: Mutex::new(BTreeMap::new()),
        }
    }

    /// The world this town runs in.
    pub const fn world(&self) -> &Arc<InMemoryWorld> {
        &self.world
    }

    /// Lay out the locations and `count` residents.
    pub fn seed(&self, count: usize, rng: &mut impl Rng) -> anyhow::Result<Vec<Resident>> {
        for location in catalog() {
            self.world.add_location(location)?;
        }

        let mut residents = Vec::with_capacity(count);
        for (index, base) in NAMES.iter().cycle().take(count).enumerate() {
            let round = index.checked_div(NAMES.len()).unwrap_or(0);
            let name = if round == 0 {
                (*base).to_owned()
            } else {
                format!("{base} {}", round.saturating_add(1))
            };
            let id = AgentId::new();
            let position = Position::new(rng.random_range(2..58), rng.random_range(2..38));
            self.world
                .initialize_agent(id, name.clone(), position, Some(personality(id, rng)))
                .with_context(|| format!("failed to place {name}"))?;
            debug!(agent_id = %id, name = %name, x = position.x, y = position.y, "resident placed");
            residents.push(Resident { id, name });
        }
        info!(residents = residents.len(), "town seeded");
        Ok(residents)
    }

    /// Poll every resident `ticks` times, `poll` apart, each on its own
    /// task with its own seeded random source.
    pub async fn run(
        self: Arc<Self>,
        residents: &[Resident],
        ticks: u32,
        poll: Duration,
        seed: u64,
    ) -> anyhow::Result<BTreeMap<String, ResidentSummary>> {
        let mut tasks = JoinSet::new();
        for (offset, resident) in (0_u64..).zip(residents) {
            let town = Arc::clone(&self);
            let resident = resident.clone();
            let rng = SmallRng::seed_from_u64(seed.wrapping_add(offset));
            tasks.spawn(async move {
                let summary = town.live(&resident, ticks, poll, rng).await;
                (resident.name, summary)
            });
        }

        let mut summaries = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, summary) = joined.context("resident task panicked")?;
            let summary = summary.with_context(|| format!("{name} stopped early"))?;
            info!(
                name = %name,
                decisions = summary.decisions,
                skipped = summary.skipped,
                failures = summary.failures,
                lines = summary.lines,
                "resident finished"
            );
            summaries.insert(name, summary);
        }
        Ok(summaries)
    }

    async fn live(
        &self,
        resident: &Resident,
        ticks: u32,
        poll: Duration,
        mut rng: SmallRng,
    ) -> anyhow::Result<ResidentSummary> {
        let mut summary = ResidentSummary::default();
        let mut interval = tokio::time::interval(poll);
        for _ in 0..ticks {
            interval.tick().await;
            match self.ticks.run_tick(resident.id, &mut rng).await {
                Ok(Some(report)) => {
                    summary.decisions = summary.decisions.saturating_add(1);
                    self.narrate(resident, &report, &mut rng);
                }
                Ok(None) => summary.skipped = summary.skipped.saturating_add(1),
                Err(e) => {
                    warn!(name = %resident.name, error = %e, "tick failed");
                    summary.failures = summary.failures.saturating_add(1);
                }
            }

            let partner = self.world.partner(resident.id)?;
            self.close_abandoned(resident.id, partner)?;

            // The lower id of a pair drives the conversation.
            if let Some(partner) = partner
                && resident.id < partner
            {
                self.chat_turn(resident.id, partner, &mut rng).await?;
                summary.lines = summary.lines.saturating_add(1);
            }
        }
        Ok(summary)
    }

    /// Log what a tick decided, giving social decisions a spoken line.
    fn narrate(&self, resident: &Resident, report: &TickReport, rng: &mut impl Rng) {
        let other = report.target.as_ref().and_then(ActionTarget::avatar_id);
        match (report.decided, other) {
            (ActionKind::InitiateConversation, Some(target)) => {
                let decision = self.talk.initiate(resident.id, target, &self.name_of(target), rng);
                info!(name = %resident.name, line = %decision.message, "calls out");
            }
            (ActionKind::JoinConversation, Some(requester)) => {
                let decision = self.talk.accept(resident.id, requester, &self.name_of(requester), rng);
                info!(name = %resident.name, line = %decision.message, "answers");
            }
            _ => info!(
                name = %resident.name,
                action = %report.action,
                score = report.score,
                energy = report.needs.energy,
                mood = report.needs.mood,
                "tick processed"
            ),
        }
    }

    fn name_of(&self, agent: AgentId) -> String {
        self.world
            .agent_profile(agent)
            .map_or_else(|_unknown| agent.short(), |p| p.name)
    }

    /// One line of small talk between `a` and `b`, then the listener's
    /// decision on whether to walk away.
    async fn chat_turn(&self, a: AgentId, b: AgentId, rng: &mut impl Rng) -> anyhow::Result<()> {
        let spoken = self.transcript(a, b)?.len();
        let (speaker, listener) = if spoken % 2 == 0 { (a, b) } else { (b, a) };
        let line = SMALL_TALK.choose(rng).copied().unwrap_or("Hi!");
        let speaker_name = self.name_of(speaker);

        let tone = self
            .talk
            .analyze_message(speaker, listener, line, Utc::now())
            .await?;
        let transcript = self.with_chat(a, b, |chat| {
            chat.transcript.push(TranscriptMessage {
                sender_id: speaker,
                sender_name: speaker_name.clone(),
                content: line.to_owned(),
            });
            chat.sentiment_sum += tone.sentiment;
            chat.transcript.clone()
        })?;
        info!(name = %speaker_name, line, sentiment = tone.sentiment, "says");

        let verdict = self
            .talk
            .should_end(listener, speaker, &speaker_name, &transcript, rng)
            .await;
        if verdict.end {
            info!(
                name = %self.name_of(listener),
                line = verdict.farewell.as_deref().unwrap_or(""),
                reason = ?verdict.reason,
                "walks away"
            );
            self.wrap_up(a, b)?;
        }
        Ok(())
    }

    /// Record a finished conversation and separate the pair.
    fn wrap_up(&self, a: AgentId, b: AgentId) -> anyhow::Result<()> {
        let chat = self
            .chats
            .lock()
            .map_err(|_poisoned| anyhow!("chat table poisoned"))?
            .remove(&(a, b))
            .unwrap_or_default();
        self.record(a, b, &chat)?;
        self.world.set_conversation(a, None)?;
        Ok(())
    }

    /// Record every open chat of `agent` whose pairing a tick has since
    /// broken, for example by leaving or by joining someone else.
    fn close_abandoned(&self, agent: AgentId, partner: Option<AgentId>) -> anyhow::Result<()> {
        let abandoned: Vec<((AgentId, AgentId), Chat)> = {
            let mut chats = self
                .chats
                .lock()
                .map_err(|_poisoned| anyhow!("chat table poisoned"))?;
            let keys: Vec<(AgentId, AgentId)> = chats
                .keys()
                .filter(|&&(a, b)| {
                    (a == agent && partner != Some(b)) || (b == agent && partner != Some(a))
                })
                .copied()
                .collect();
            keys.into_iter()
                .filter_map(|key| chats.remove(&key).map(|chat| (key, chat)))
                .collect()
        };

        for ((a, b), chat) in abandoned {
            info!(
                name = %self.name_of(agent),
                lines = chat.transcript.len(),
                "conversation broken off"
            );
            self.record(a, b, &chat)?;
        }
        Ok(())
    }

    fn record(&self, a: AgentId, b: AgentId, chat: &Chat) -> anyhow::Result<()> {
        let count = u32::try_from(chat.transcript.len()).unwrap_or(u32::MAX);
        let outcome = ConversationOutcome {
            sentiment: if count == 0 {
                0.0
            } else {
                chat.sentiment_sum / f64::from(count)
            },
            quality: (f64::from(count) / FULL_CONVERSATION).min(1.0),
            message_count: chat.transcript.len(),
            topic: Some("small talk".to_owned()),
            ..ConversationOutcome::default()
        };
        self.talk.finish(a, b, &outcome, Utc::now())?;
        Ok(())
    }

    fn transcript(&self, a: AgentId, b: AgentId) -> anyhow::Result<Vec<TranscriptMessage>> {
        self.with_chat(a, b, |chat| chat.transcript.clone())
    }

    fn with_chat<T>(
        &self,
        a: AgentId,
        b: AgentId,
        f: impl FnOnce(&mut Chat) -> T,
    ) -> anyhow::Result<T> {
        let mut chats = self
            .chats
            .lock()
            .map_err(|_poisoned| anyhow!("chat table poisoned"))?;
        Ok(f(chats.entry((a, b)).or_default()))
    }
}

/// A resident with randomized traits and a speaking style.
fn personality(id: AgentId, rng: &mut impl Rng) -> Personality {
    let mut personality = Personality::with_defaults(id);
    personality.sociability = rng.random_range(0.2..=0.95);
    personality.curiosity = rng.random_range(0.2..=0.95);
    personality.agreeableness = rng.random_range(0.3..=0.95);
    personality.energy_baseline = rng.random_range(0.3..=0.9);
    personality.communication_style = STYLES.choose(rng).map(|s| (*s).to_owned());
    personality
}

/// The demo town's fixed locations.
fn catalog() -> Vec<WorldLocation> {
    let place = |name: &str, category, x, y, effects| WorldLocation {
        id: LocationId::new(),
        name: name.to_owned(),
        category,
        position: Position::new(x, y),
        effects,
        cooldown_secs: 300,
        duration_secs: 30,
    };
    vec![
        place(
            "Corner Cafe",
            LocationCategory::Food,
            12,
            8,
            NeedEffects { energy: 0.1, hunger: -0.5, loneliness: -0.05, mood: 0.05 },
        ),
        place(
            "Starlight Karaoke",
            LocationCategory::Karaoke,
            45,
            10,
            NeedEffects { energy: -0.1, hunger: 0.05, loneliness: -0.2, mood: 0.2 },
        ),
        place(
            "Willow Bench",
            LocationCategory::RestArea,
            8,
            30,
            NeedEffects { energy: 0.4, hunger: 0.0, loneliness: 0.0, mood: 0.05 },
        ),
        place(
            "Fountain Plaza",
            LocationCategory::SocialHub,
            30,
            20,
            NeedEffects { energy: -0.05, hunger: 0.0, loneliness: -0.3, mood: 0.1 },
        ),
        place(
            "Hilltop Lookout",
            LocationCategory::WanderPoint,
            52,
            34,
            NeedEffects { energy: -0.1, hunger: 0.05, loneliness: 0.0, mood: 0.15 },
        ),
    ]
}
