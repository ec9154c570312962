//! Parsing advisor replies into typed answers.
//!
//! Models are asked for bare JSON but often wrap it in prose or a markdown
//! fence, or leave a trailing comma behind. [`parse_end_advice`] and
//! [`parse_tone`] try the raw text first and then progressively cleaned
//! versions of it. A reply that survives none of them is an error; the
//! conversation service already has a local answer for that case.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use townsfolk_agents::MessageTone;
use townsfolk_core::EndAdvice;

use crate::error::RunnerError;

/// The end-decision reply as the model writes it.
#[derive(Debug, Deserialize)]
struct RawEndAdvice {
    #[serde(default)]
    should_end: bool,
    #[serde(default, alias = "farewell")]
    farewell_message: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse an end-decision reply.
pub fn parse_end_advice(raw: &str) -> Result<EndAdvice, RunnerError> {
    let parsed: RawEndAdvice = parse_json(raw)?;
    Ok(EndAdvice {
        should_end: parsed.should_end,
        farewell: parsed
            .farewell_message
            .map(|f| f.trim().to_owned())
            .filter(|f| !f.is_empty()),
        reason: parsed.reason,
    })
}

/// Parse a tone reply, clamping every number into its documented range.
pub fn parse_tone(raw: &str) -> Result<MessageTone, RunnerError> {
    let tone: MessageTone = parse_json(raw)?;
    Ok(MessageTone {
        sentiment: finite_clamp(tone.sentiment, -1.0, 1.0),
        receiver_mood_change: finite_clamp(tone.receiver_mood_change, -0.15, 0.10),
        sender_mood_change: finite_clamp(tone.sender_mood_change, -0.05, 0.05),
        ..tone
    })
}

const fn finite_clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() { value.clamp(min, max) } else { 0.0 }
}

/// Deserialize `raw`, recovering from fences, surrounding prose, and
/// trailing commas.
fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, RunnerError> {
    let trimmed = raw.trim();
    let candidates = [
        Some(trimmed),
        strip_fence(trimmed),
        outermost_object(trimmed),
    ];

    let mut last_error = None;
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
        if let Ok(value) = serde_json::from_str(&strip_trailing_commas(candidate)) {
            return Ok(value);
        }
    }

    Err(RunnerError::Parse(match last_error {
        Some(e) => format!("{e} in reply: {trimmed}"),
        None => "empty reply".to_owned(),
    }))
}

/// The body of the first markdown code fence, with any language tag removed.
fn strip_fence(text: &str) -> Option<&str> {
    let (_, after_open) = text.split_once("```")?;
    let (_tag, body) = after_open.split_once('\n')?;
    let (inner, _) = body.split_once("```")?;
    Some(inner.trim())
}

/// The span from the first `{` to the last `}`.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| text.get(start..=end)).flatten()
}

/// Drop commas that sit directly before a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ',' {
            let rest = chars.clone().find(|n| !n.is_whitespace());
            if matches!(rest, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
