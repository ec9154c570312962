//! Configuration loading and typed config structures for the decision core.
//!
//! The configuration lives in `townsfolk.yaml`. A `profile:` key picks one of
//! the tuning presets ([`Profile::General`] or [`Profile::SocialOnly`]); any
//! other key overrides the matching field of that preset. Everything has a
//! default, so an empty file is a valid configuration.
//!
//! ```yaml
//! profile: social_only
//! decision:
//!   temperature: 0.5
//! needs:
//!   hunger: { mode: drift, rate: 0.01 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yml::Value;
use townsfolk_agents::{ConversationConfig, NeedsConfig};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A named preset of decision tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Needs drift, locations are visited, standing around is mildly
    /// discouraged.
    #[default]
    General,
    /// Agents never tire or eat, never use locations, and avoid standing
    /// still at almost any cost. They wander and talk.
    SocialOnly,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Top-level configuration, mirroring `townsfolk.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TownsfolkConfig {
    /// The preset the other sections start from.
    #[serde(default)]
    pub profile: Profile,

    /// Scoring, selection, and execution tuning.
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Need decay tuning.
    #[serde(default)]
    pub needs: NeedsConfig,

    /// Conversation gate tuning.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Tick orchestration: lock retry, context radius, decision log.
    #[serde(default)]
    pub tick: TickConfig,

    /// Conversation advisor settings.
    #[serde(default)]
    pub advisor: AdvisorConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TownsfolkConfig {
    fn default() -> Self {
        Self::preset(Profile::General)
    }
}

impl TownsfolkConfig {
    /// The full configuration for a profile, before overrides.
    pub fn preset(profile: Profile) -> Self {
        let (decision, needs) = match profile {
            Profile::General => (DecisionConfig::default(), NeedsConfig::default()),
            Profile::SocialOnly => (DecisionConfig::social_only(), NeedsConfig::social_only()),
        };
        Self {
            profile,
            decision,
            needs,
            conversation: ConversationConfig::default(),
            tick: TickConfig::default(),
            advisor: AdvisorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, layering it over the preset
    /// named by its `profile:` key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or a
    /// value has the wrong type.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_yml::from_str(yaml)?;
        let profile = match overrides.get("profile") {
            Some(value) => serde_yml::from_value(value.clone())?,
            None => Profile::default(),
        };
        let mut merged = serde_yml::to_value(Self::preset(profile))?;
        merge_yaml(&mut merged, overrides);
        Ok(serde_yml::from_value(merged)?)
    }
}

/// Recursively overlay `overlay` onto `base`. Mappings merge key by key;
/// anything else replaces. A null overlay changes nothing.
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Every constant the candidate generator, scorer, selector, and executor
/// read. Passed explicitly; there are no module-level weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Weight of the need-satisfaction term (default: 1.0).
    #[serde(default = "default_need_weight")]
    pub need_weight: f64,

    /// Weight of the personality-alignment term (default: 0.5).
    #[serde(default = "default_personality_weight")]
    pub personality_weight: f64,

    /// Weight of the social-memory term (default: 2.0).
    #[serde(default = "default_social_weight")]
    pub social_weight: f64,

    /// Weight of the world-affinity term (default: 1.0, social-only: 0.0).
    #[serde(default = "default_affinity_weight")]
    pub affinity_weight: f64,

    /// Weight of the subtracted recency penalty (default: 0.1).
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Weight of the Gaussian jitter term (default: 0.3).
    #[serde(default = "default_jitter_weight")]
    pub jitter_weight: f64,

    /// Standard deviation of the jitter draw (default: 0.1).
    #[serde(default = "default_jitter_std_dev")]
    pub jitter_std_dev: f64,

    /// Flat need bonus for conversation actions (default: 8.0).
    #[serde(default = "default_base_bonus")]
    pub conversation_base_bonus: f64,

    /// Flat need bonus for movement actions (default: 8.0).
    #[serde(default = "default_base_bonus")]
    pub movement_base_bonus: f64,

    /// Flat need term for location actions (default: 0.0, social-only: -100.0).
    #[serde(default)]
    pub activity_base_bonus: f64,

    /// Scale applied to how much a location's effects would help
    /// (default: 10.0).
    #[serde(default = "default_location_need_scale")]
    pub location_need_scale: f64,

    /// Flat need term for idling (default: -1.0, social-only: -50.0).
    #[serde(default = "default_idle_penalty")]
    pub idle_penalty: f64,

    /// Weight of tiredness in the idle need term (default: 4.0,
    /// social-only: 0.0).
    #[serde(default = "default_idle_rest_weight")]
    pub idle_rest_weight: f64,

    /// Softmax temperature (default: 0.3).
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Synthetic score for a player's request (default: 20.0).
    #[serde(default = "default_player_interrupt_score")]
    pub player_interrupt_score: f64,

    /// Synthetic score for any other accepted request (default: 10.0).
    #[serde(default = "default_robot_interrupt_score")]
    pub robot_interrupt_score: f64,

    /// Chance of accepting a non-player request (default: 0.7).
    #[serde(default = "default_robot_accept_probability")]
    pub robot_accept_probability: f64,

    /// Distance within which a conversation can start (default: 15).
    #[serde(default = "default_conversation_radius")]
    pub conversation_radius: f64,

    /// Distance within which agents walk toward others (default: 30).
    #[serde(default = "default_approach_radius")]
    pub approach_radius: f64,

    /// Extra distance beyond the conversation radius within which disliked
    /// avatars are avoided (default: 4).
    #[serde(default = "default_avoid_margin")]
    pub avoid_margin: f64,

    /// Sentiment below which an avatar is avoided (default: -0.3).
    #[serde(default = "default_dislike_threshold")]
    pub dislike_threshold: f64,

    /// How far a flee point lies from the agent (default: 5).
    #[serde(default = "default_flee_distance")]
    pub flee_distance: f64,

    /// Window in hours in which re-contacting a partner is penalized
    /// (default: 0.05).
    #[serde(default = "default_recent_interaction_hours")]
    pub recent_interaction_hours: f64,

    /// Flat penalty for a location on cooldown (default: 1.0).
    #[serde(default = "default_cooldown_penalty")]
    pub cooldown_penalty: f64,

    /// Minimum random wander distance (default: 5).
    #[serde(default = "default_wander_min_distance")]
    pub wander_min_distance: f64,

    /// Maximum random wander distance (default: 15).
    #[serde(default = "default_wander_max_distance")]
    pub wander_max_distance: f64,

    /// Share of the wander target drawn from social pull (default: 0.5).
    #[serde(default = "default_wander_share")]
    pub social_wander_influence: f64,

    /// Share of the wander target drawn at random (default: 0.5).
    #[serde(default = "default_wander_share")]
    pub wander_randomness: f64,

    /// Map width in tiles (default: 60).
    #[serde(default = "default_map_width")]
    pub map_width: i32,

    /// Map height in tiles (default: 40).
    #[serde(default = "default_map_height")]
    pub map_height: i32,

    /// Whether walk-to-location candidates are generated (default: true,
    /// social-only: false).
    #[serde(default = "default_true")]
    pub generate_location_actions: bool,

    /// Longest step per tick when walking or moving (default: 3).
    #[serde(default = "default_walk_step")]
    pub walk_step: f64,

    /// Longest step per tick when avoiding (default: 4).
    #[serde(default = "default_avoid_step")]
    pub avoid_step: f64,

    /// Distance at which a walker has arrived (default: 1).
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius: f64,

    /// Nominal activity length before jitter, in seconds (default: 6).
    #[serde(default = "default_activity_base_secs")]
    pub activity_base_secs: f64,

    /// Shortest activity, in seconds (default: 5).
    #[serde(default = "default_activity_min_secs")]
    pub activity_min_secs: i64,

    /// Longest activity, in seconds (default: 8).
    #[serde(default = "default_activity_max_secs")]
    pub activity_max_secs: i64,

    /// Reported score of a resumed walk (default: 5).
    #[serde(default = "default_walking_score")]
    pub walking_score: f64,

    /// Reported score of a running activity (default: 10).
    #[serde(default = "default_activity_score")]
    pub activity_score: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            need_weight: default_need_weight(),
            personality_weight: default_personality_weight(),
            social_weight: default_social_weight(),
            affinity_weight: default_affinity_weight(),
            recency_weight: default_recency_weight(),
            jitter_weight: default_jitter_weight(),
            jitter_std_dev: default_jitter_std_dev(),
            conversation_base_bonus: default_base_bonus(),
            movement_base_bonus: default_base_bonus(),
            activity_base_bonus: 0.0,
            location_need_scale: default_location_need_scale(),
            idle_penalty: default_idle_penalty(),
            idle_rest_weight: default_idle_rest_weight(),
            temperature: default_temperature(),
            player_interrupt_score: default_player_interrupt_score(),
            robot_interrupt_score: default_robot_interrupt_score(),
            robot_accept_probability: default_robot_accept_probability(),
            conversation_radius: default_conversation_radius(),
            approach_radius: default_approach_radius(),
            avoid_margin: default_avoid_margin(),
            dislike_threshold: default_dislike_threshold(),
            flee_distance: default_flee_distance(),
            recent_interaction_hours: default_recent_interaction_hours(),
            cooldown_penalty: default_cooldown_penalty(),
            wander_min_distance: default_wander_min_distance(),
            wander_max_distance: default_wander_max_distance(),
            social_wander_influence: default_wander_share(),
            wander_randomness: default_wander_share(),
            map_width: default_map_width(),
            map_height: default_map_height(),
            generate_location_actions: true,
            walk_step: default_walk_step(),
            avoid_step: default_avoid_step(),
            arrival_radius: default_arrival_radius(),
            activity_base_secs: default_activity_base_secs(),
            activity_min_secs: default_activity_min_secs(),
            activity_max_secs: default_activity_max_secs(),
            walking_score: default_walking_score(),
            activity_score: default_activity_score(),
        }
    }
}

impl DecisionConfig {
    /// Tuning for a population that only wanders and talks.
    pub fn social_only() -> Self {
        Self {
            affinity_weight: 0.0,
            activity_base_bonus: -100.0,
            idle_penalty: -50.0,
            idle_rest_weight: 0.0,
            generate_location_actions: false,
            ..Self::default()
        }
    }

    /// Radius within which disliked avatars trigger avoidance.
    pub fn avoid_radius(&self) -> f64 {
        self.conversation_radius + self.avoid_margin
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Tick orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Lock acquisition attempts per poll (default: 3).
    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,

    /// Wait between attempts in milliseconds (default: 50).
    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,

    /// Lease requested from the lock, in seconds (default: 60).
    #[serde(default = "default_lock_lease_secs")]
    pub lock_lease_secs: u64,

    /// Radius within which other avatars count as nearby (default: 30).
    #[serde(default = "default_nearby_radius")]
    pub nearby_radius: f64,

    /// Whether each tick appends to the decision log (default: true).
    #[serde(default = "default_true")]
    pub decision_log: bool,

    /// Decision log entries kept per agent before the oldest are dropped
    /// (default: 100).
    #[serde(default = "default_decision_log_capacity")]
    pub decision_log_capacity: usize,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            lock_attempts: default_lock_attempts(),
            lock_backoff_ms: default_lock_backoff_ms(),
            lock_lease_secs: default_lock_lease_secs(),
            nearby_radius: default_nearby_radius(),
            decision_log: true,
            decision_log_capacity: default_decision_log_capacity(),
        }
    }
}

/// Conversation advisor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// How long to wait for the advisor before falling back, in
    /// milliseconds (default: 3000).
    #[serde(default = "default_advisor_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_advisor_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn,
    /// error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_need_weight() -> f64 {
    1.0
}

const fn default_personality_weight() -> f64 {
    0.5
}

const fn default_social_weight() -> f64 {
    2.0
}

const fn default_affinity_weight() -> f64 {
    1.0
}

const fn default_recency_weight() -> f64 {
    0.1
}

const fn default_jitter_weight() -> f64 {
    0.3
}

const fn default_jitter_std_dev() -> f64 {
    0.1
}

const fn default_base_bonus() -> f64 {
    8.0
}

const fn default_location_need_scale() -> f64 {
    10.0
}

const fn default_idle_penalty() -> f64 {
    -1.0
}

const fn default_idle_rest_weight() -> f64 {
    4.0
}

const fn default_temperature() -> f64 {
    0.3
}

const fn default_player_interrupt_score() -> f64 {
    20.0
}

const fn default_robot_interrupt_score() -> f64 {
    10.0
}

const fn default_robot_accept_probability() -> f64 {
    0.7
}

const fn default_conversation_radius() -> f64 {
    15.0
}

const fn default_approach_radius() -> f64 {
    30.0
}

const fn default_avoid_margin() -> f64 {
    4.0
}

const fn default_dislike_threshold() -> f64 {
    -0.3
}

const fn default_flee_distance() -> f64 {
    5.0
}

const fn default_recent_interaction_hours() -> f64 {
    0.05
}

const fn default_cooldown_penalty() -> f64 {
    1.0
}

const fn default_wander_min_distance() -> f64 {
    5.0
}

const fn default_wander_max_distance() -> f64 {
    15.0
}

const fn default_wander_share() -> f64 {
    0.5
}

const fn default_map_width() -> i32 {
    60
}

const fn default_map_height() -> i32 {
    40
}

const fn default_walk_step() -> f64 {
    3.0
}

const fn default_avoid_step() -> f64 {
    4.0
}

const fn default_arrival_radius() -> f64 {
    1.0
}

const fn default_activity_base_secs() -> f64 {
    6.0
}

const fn default_activity_min_secs() -> i64 {
    5
}

const fn default_activity_max_secs() -> i64 {
    8
}

const fn default_walking_score() -> f64 {
    5.0
}

const fn default_activity_score() -> f64 {
    10.0
}

const fn default_lock_attempts() -> u32 {
    3
}

const fn default_lock_backoff_ms() -> u64 {
    50
}

const fn default_lock_lease_secs() -> u64 {
    60
}

const fn default_nearby_radius() -> f64 {
    30.0
}

const fn default_advisor_timeout_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_decision_log_capacity() -> usize {
    100
}

const fn default_true() -> bool {
    true
}
