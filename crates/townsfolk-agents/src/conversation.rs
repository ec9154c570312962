//! Conversation policy gates: accept a request, initiate, end.
//!
//! Each gate is a short ladder of deterministic thresholds over the
//! relationship, with a weighted coin flip on each rung. None of them run
//! the utility scorer. The end gate may defer to an external advisor; it
//! says so by returning [`EndVerdict::Consult`] and leaves the call (and
//! its timeout) to the caller.

use rand::Rng;
use rand::seq::IndexedRandom;
use townsfolk_types::SocialMemory;
use tracing::debug;

use crate::config::ConversationConfig;
use crate::tone::analyze_keywords;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// What the gate knows about the other party.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relationship<'a> {
    /// No memory store could be consulted.
    Unavailable,
    /// The store was consulted and holds no edge toward them.
    Stranger,
    /// The outgoing edge toward them.
    Known(&'a SocialMemory),
}

impl<'a> Relationship<'a> {
    /// Build from a store lookup.
    pub const fn from_lookup(memory: Option<&'a SocialMemory>) -> Self {
        match memory {
            Some(m) => Self::Known(m),
            None => Self::Stranger,
        }
    }
}

/// Answer to a conversation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptDecision {
    /// Whether the request is accepted.
    pub accept: bool,
    /// Greeting or excuse, spoken to the requester.
    pub message: String,
}

/// Whether to open a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateDecision {
    /// Whether to go ahead.
    pub initiate: bool,
    /// Opening line, or the reason for not opening.
    pub message: String,
}

/// Outcome of the fixed-rule end check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndVerdict {
    /// Leave with this line.
    End {
        /// Spoken on the way out.
        farewell: String,
        /// Why, for logs.
        reason: EndReason,
    },
    /// Keep talking.
    Continue,
    /// The rules have no opinion; ask the advisor.
    Consult,
}

/// Why a conversation was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The partner was rude early on.
    Hostile,
    /// The message cap was reached.
    TooLong,
    /// The per-turn end roll succeeded.
    Natural,
    /// The advisor decided.
    Advisor,
    /// The advisor was unreachable and the fallback cap was passed.
    Fallback,
    /// Relationship data was unavailable and the reduced roll succeeded.
    Unavailable,
}

impl EndVerdict {
    /// Whether the verdict ends the conversation.
    pub const fn ends(&self) -> bool {
        matches!(self, Self::End { .. })
    }

    const fn end(farewell: String, reason: EndReason) -> Self {
        Self::End { farewell, reason }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

const STRANGER_GREETINGS: &[&str] = &[
    "Hey {name}! Let's chat!",
    "Hi {name}! What's up?",
    "Yo {name}! Sure thing!",
];

const BUSY_EXCUSES: &[&str] = &[
    "Sorry, I'm heading somewhere right now!",
    "Maybe later, I'm exploring!",
    "Catch me in a bit!",
];

const HOSTILE_DECLINES: &[&str] = &[
    "Not really in the mood right now",
    "Maybe another time",
    "I'm busy, sorry",
];

const FREQUENT_DECLINES: &[&str] = &[
    "We just talked! Let me walk around a bit",
    "Gonna explore for a while, catch you later!",
    "Talked a lot already, need to stretch my legs!",
];

const FAMILIAR_ACCEPTS: &[&str] = &[
    "Hey {name}! What's up?",
    "Yo {name}! Good to see you!",
    "Hey {name}! What's new?",
    "Hey {name}! Great to see you again!",
];

const CASUAL_ACCEPTS: &[&str] = &[
    "Sure, let's chat!",
    "Hey, what's up?",
    "Sure thing!",
    "Yeah, what's going on?",
];

const RARE_DECLINES: &[&str] = &["I'm on my way somewhere, maybe later!", "Catch me in a sec!"];

const STRANGER_OPENERS: &[&str] = &[
    "Hey {name}! What's up?",
    "Hi {name}! How's it going?",
    "Yo {name}! Let's chat!",
    "Hey {name}! Nice to meet you!",
];

const FAMILIAR_OPENERS: &[&str] = &[
    "Hey {name}! What's up?",
    "Yo {name}! What's new?",
    "Hey {name}! How's it going?",
];

const WARM_OPENERS: &[&str] = &[
    "Hey {name}! Good to see you!",
    "Yo {name}! What's up?",
    "Hey {name}! Got a minute?",
];

const NEUTRAL_OPENERS: &[&str] = &["Hey {name}!", "Yo {name}! What's up?", "Hey, how's it going?"];

const FORCED_FAREWELLS: &[&str] = &[
    "Hey {name}, I should get going! Great chat!",
    "Gotta run, catch you later {name}!",
    "Nice talking to you {name}! See you around!",
    "I'm gonna walk around for a bit. Talk later!",
];

const NATURAL_FAREWELLS: &[&str] = &[
    "Anyway, gotta run! Talk later {name}!",
    "Alright, gonna walk around. See ya!",
    "Nice chat! Catch you later!",
    "I'm gonna explore a bit. Talk soon!",
    "Good talk! See you around!",
];

const HOSTILE_FAREWELL: &str = "I don't appreciate that. Bye.";
const UNAVAILABLE_FAREWELL: &str = "Gotta run, talk later!";
const FALLBACK_FAREWELL: &str = "Hey, I should get going. Talk later!";

/// Pick a template and fill in the name.
fn pick(rng: &mut impl Rng, templates: &[&str], name: &str) -> String {
    templates
        .choose(rng)
        .copied()
        .unwrap_or("Hey!")
        .replace("{name}", name)
}

/// One weighted coin flip.
fn roll(rng: &mut impl Rng, probability: f64) -> bool {
    rng.random::<f64>() < probability
}

const fn is_familiar(memory: &SocialMemory, config: &ConversationConfig) -> bool {
    memory.familiarity > config.familiar_familiarity
        || memory.interaction_count > config.familiar_interaction_count
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// Decide whether to accept a conversation request from `requester_name`.
pub fn decide_accept(
    relationship: Relationship<'_>,
    requester_name: &str,
    config: &ConversationConfig,
    rng: &mut impl Rng,
) -> AcceptDecision {
    let decision = match relationship {
        Relationship::Unavailable => AcceptDecision {
            accept: true,
            message: "Sure, let's chat!".to_owned(),
        },
        Relationship::Stranger => {
            if roll(rng, config.stranger_accept_probability) {
                AcceptDecision {
                    accept: true,
                    message: pick(rng, STRANGER_GREETINGS, requester_name),
                }
            } else {
                AcceptDecision {
                    accept: false,
                    message: pick(rng, BUSY_EXCUSES, requester_name),
                }
            }
        }
        Relationship::Known(memory) => accept_known(memory, requester_name, config, rng),
    };
    debug!(
        requester = requester_name,
        accept = decision.accept,
        "conversation request answered"
    );
    decision
}

fn accept_known(
    memory: &SocialMemory,
    requester_name: &str,
    config: &ConversationConfig,
    rng: &mut impl Rng,
) -> AcceptDecision {
    if memory.sentiment < config.hostile_accept_sentiment
        && roll(rng, config.hostile_decline_probability)
    {
        return decline(rng, HOSTILE_DECLINES, requester_name);
    }
    if memory.interaction_count > config.frequent_interaction_count
        && roll(rng, config.frequent_skip_probability)
    {
        return decline(rng, FREQUENT_DECLINES, requester_name);
    }
    if roll(rng, config.accept_probability) {
        let templates = if is_familiar(memory, config) {
            FAMILIAR_ACCEPTS
        } else {
            CASUAL_ACCEPTS
        };
        AcceptDecision {
            accept: true,
            message: pick(rng, templates, requester_name),
        }
    } else {
        decline(rng, RARE_DECLINES, requester_name)
    }
}

fn decline(rng: &mut impl Rng, templates: &[&str], requester_name: &str) -> AcceptDecision {
    AcceptDecision {
        accept: false,
        message: pick(rng, templates, requester_name),
    }
}

/// Decide whether to open a conversation with `target_name`.
pub fn decide_initiate(
    relationship: Relationship<'_>,
    target_name: &str,
    config: &ConversationConfig,
    rng: &mut impl Rng,
) -> InitiateDecision {
    let skip = |reason: &str| InitiateDecision {
        initiate: false,
        message: reason.to_owned(),
    };

    let decision = match relationship {
        Relationship::Unavailable => {
            if roll(rng, config.unavailable_initiate_probability) {
                InitiateDecision {
                    initiate: true,
                    message: format!("Hey {target_name}! What's up?"),
                }
            } else {
                skip("Just walking around")
            }
        }
        Relationship::Stranger => {
            if roll(rng, config.stranger_initiate_probability) {
                InitiateDecision {
                    initiate: true,
                    message: pick(rng, STRANGER_OPENERS, target_name),
                }
            } else {
                skip("Exploring for now")
            }
        }
        Relationship::Known(memory) => {
            if memory.sentiment < config.hostile_initiate_sentiment
                && roll(rng, config.hostile_skip_probability)
            {
                skip("Not feeling it right now")
            } else if memory.interaction_count > config.frequent_interaction_count
                && roll(rng, config.frequent_skip_probability)
            {
                skip("Gonna explore a bit")
            } else if roll(rng, config.initiate_probability) {
                InitiateDecision {
                    initiate: true,
                    message: known_opener(memory, target_name, config, rng),
                }
            } else {
                skip("Just walking around")
            }
        }
    };
    debug!(
        target = target_name,
        initiate = decision.initiate,
        "initiation considered"
    );
    decision
}

fn known_opener(
    memory: &SocialMemory,
    target_name: &str,
    config: &ConversationConfig,
    rng: &mut impl Rng,
) -> String {
    let tier = if is_familiar(memory, config) {
        FAMILIAR_OPENERS
    } else if memory.sentiment > 0.0 {
        WARM_OPENERS
    } else {
        NEUTRAL_OPENERS
    };
    let mut openers: Vec<String> = tier
        .iter()
        .map(|t| t.replace("{name}", target_name))
        .collect();

    let recent: Vec<&String> = memory.mutual_interests.iter().take(3).collect();
    if let Some(interest) = recent.choose(rng) {
        openers.push(format!("Hey {target_name}! Been thinking about {interest}!"));
    }

    openers
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| format!("Hey {target_name}!"))
}

/// Run the fixed-rule end ladder for a conversation of `message_count`
/// messages whose latest line is `last_message`.
///
/// Returns [`EndVerdict::Consult`] when no rule fires and the relationship
/// store is available; the caller then asks the advisor and falls back to
/// [`fallback_end`] on failure.
pub fn evaluate_end(
    relationship: Relationship<'_>,
    message_count: usize,
    last_message: &str,
    partner_name: &str,
    config: &ConversationConfig,
    rng: &mut impl Rng,
) -> EndVerdict {
    if matches!(relationship, Relationship::Unavailable) {
        return if message_count >= config.min_messages
            && roll(rng, config.unavailable_end_probability)
        {
            EndVerdict::end(UNAVAILABLE_FAREWELL.to_owned(), EndReason::Unavailable)
        } else {
            EndVerdict::Continue
        };
    }

    if message_count < config.min_messages {
        return if analyze_keywords(last_message).is_rude {
            EndVerdict::end(HOSTILE_FAREWELL.to_owned(), EndReason::Hostile)
        } else {
            EndVerdict::Continue
        };
    }

    if message_count >= config.max_messages {
        debug!(partner = partner_name, message_count, "conversation hit message cap");
        return EndVerdict::end(pick(rng, FORCED_FAREWELLS, partner_name), EndReason::TooLong);
    }

    let probability = end_probability(message_count, config);
    if roll(rng, probability) {
        debug!(
            partner = partner_name,
            message_count, probability, "conversation ended naturally"
        );
        return EndVerdict::end(pick(rng, NATURAL_FAREWELLS, partner_name), EndReason::Natural);
    }

    EndVerdict::Consult
}

/// Per-turn end probability: grows linearly past `min_messages`, capped.
pub fn end_probability(message_count: usize, config: &ConversationConfig) -> f64 {
    let past_min = message_count.saturating_sub(config.min_messages);
    let steps = f64::from(u32::try_from(past_min).unwrap_or(u32::MAX));
    steps
        .mul_add(config.end_probability_step, config.base_end_probability)
        .min(config.max_end_probability)
}

/// Verdict when the advisor could not be consulted.
pub fn fallback_end(message_count: usize, config: &ConversationConfig) -> EndVerdict {
    if message_count > config.fallback_max_messages {
        EndVerdict::end(FALLBACK_FAREWELL.to_owned(), EndReason::Fallback)
    } else {
        EndVerdict::Continue
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use townsfolk_types::AgentId;

    use super::*;

    fn memory(sentiment: f64, familiarity: f64, count: u32) -> SocialMemory {
        SocialMemory {
            from: AgentId::new(),
            to: AgentId::new(),
            sentiment,
            familiarity,
            interaction_count: count,
            last_interaction: None,
            last_topic: None,
            mutual_interests: Vec::new(),
            relationship_notes: None,
            conversation_summary: None,
        }
    }

    #[test]
    fn unavailable_store_always_accepts() {
        let mut rng = SmallRng::seed_from_u64(1);
        let cfg = ConversationConfig::default();
        for _ in 0..50 {
            let d = decide_accept(Relationship::Unavailable, "Mo", &cfg, &mut rng);
            assert!(d.accept);
            assert_eq!(d.message, "Sure, let's chat!");
        }
    }

    #[test]
    fn strangers_are_mostly_accepted_by_name() {
        let mut rng = SmallRng::seed_from_u64(2);
        let cfg = ConversationConfig::default();
        let mut accepted = 0;
        for _ in 0..200 {
            let d = decide_accept(Relationship::Stranger, "Mo", &cfg, &mut rng);
            if d.accept {
                accepted += 1;
                assert!(d.message.contains("Mo"));
            }
        }
        assert!(accepted > 160, "accepted {accepted}/200");
    }

    #[test]
    fn disliked_requesters_are_mostly_declined() {
        let mut rng = SmallRng::seed_from_u64(3);
        let cfg = ConversationConfig::default();
        let edge = memory(-0.8, 0.2, 1);
        let declined = (0..200)
            .filter(|_| !decide_accept(Relationship::Known(&edge), "Mo", &cfg, &mut rng).accept)
            .count();
        assert!(declined > 110, "declined {declined}/200");
    }

    #[test]
    fn familiar_accept_uses_name() {
        let mut rng = SmallRng::seed_from_u64(4);
        let cfg = ConversationConfig::default();
        let edge = memory(0.6, 0.9, 2);
        let d = (0..20)
            .map(|_| decide_accept(Relationship::Known(&edge), "Mo", &cfg, &mut rng))
            .find(|d| d.accept);
        assert!(d.is_some_and(|d| d.message.contains("Mo")));
    }

    #[test]
    fn shared_interests_can_seed_the_opener() {
        let mut rng = SmallRng::seed_from_u64(5);
        let cfg = ConversationConfig::default();
        let mut edge = memory(0.6, 0.2, 1);
        edge.mutual_interests = vec!["jazz".to_owned()];
        let saw_topic = (0..200).any(|_| {
            decide_initiate(Relationship::Known(&edge), "Mo", &cfg, &mut rng)
                .message
                .contains("jazz")
        });
        assert!(saw_topic);
    }

    #[test]
    fn skipped_initiation_gives_reason() {
        let mut rng = SmallRng::seed_from_u64(6);
        let cfg = ConversationConfig {
            initiate_probability: 0.0,
            ..ConversationConfig::default()
        };
        let edge = memory(0.1, 0.1, 1);
        let d = decide_initiate(Relationship::Known(&edge), "Mo", &cfg, &mut rng);
        assert!(!d.initiate);
        assert_eq!(d.message, "Just walking around");
    }

    #[test]
    fn short_conversation_ends_only_on_rudeness() {
        let mut rng = SmallRng::seed_from_u64(7);
        let cfg = ConversationConfig::default();
        let edge = memory(0.2, 0.2, 1);
        let rel = Relationship::Known(&edge);
        assert_eq!(
            evaluate_end(rel, 2, "nice weather", "Mo", &cfg, &mut rng),
            EndVerdict::Continue
        );
        assert_eq!(
            evaluate_end(rel, 2, "you are an idiot", "Mo", &cfg, &mut rng),
            EndVerdict::End {
                farewell: "I don't appreciate that. Bye.".to_owned(),
                reason: EndReason::Hostile,
            }
        );
    }

    #[test]
    fn long_conversation_is_forced_to_end() {
        let mut rng = SmallRng::seed_from_u64(8);
        let cfg = ConversationConfig::default();
        let edge = memory(0.2, 0.2, 1);
        let verdict = evaluate_end(Relationship::Known(&edge), 10, "hm", "Mo", &cfg, &mut rng);
        assert!(matches!(
            verdict,
            EndVerdict::End {
                reason: EndReason::TooLong,
                ..
            }
        ));
    }

    #[test]
    fn middle_conversation_rolls_or_consults() {
        let mut rng = SmallRng::seed_from_u64(9);
        let cfg = ConversationConfig::default();
        let edge = memory(0.2, 0.2, 1);
        let mut consulted = 0;
        for _ in 0..200 {
            let verdict = evaluate_end(Relationship::Known(&edge), 4, "hm", "Mo", &cfg, &mut rng);
            if verdict == EndVerdict::Consult {
                consulted += 1;
            } else {
                assert!(matches!(
                    verdict,
                    EndVerdict::End {
                        reason: EndReason::Natural,
                        ..
                    }
                ));
            }
        }
        // p(end) at four messages is 0.25.
        assert!((120..=180).contains(&consulted), "consulted {consulted}/200");
    }

    #[test]
    fn end_probability_grows_and_caps() {
        let cfg = ConversationConfig::default();
        assert!((end_probability(3, &cfg) - 0.15).abs() < 1e-9);
        assert!((end_probability(5, &cfg) - 0.35).abs() < 1e-9);
        assert!((end_probability(40, &cfg) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn fallback_ends_only_very_long_conversations() {
        let cfg = ConversationConfig::default();
        assert_eq!(fallback_end(20, &cfg), EndVerdict::Continue);
        assert!(fallback_end(21, &cfg).ends());
    }

    #[test]
    fn unavailable_store_never_consults() {
        let mut rng = SmallRng::seed_from_u64(10);
        let cfg = ConversationConfig::default();
        for n in 0..30 {
            let verdict = evaluate_end(Relationship::Unavailable, n, "hm", "Mo", &cfg, &mut rng);
            assert_ne!(verdict, EndVerdict::Consult);
            if n < 3 {
                assert_eq!(verdict, EndVerdict::Continue);
            }
        }
    }
}
