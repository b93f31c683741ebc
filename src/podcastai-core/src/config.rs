//! Configuration module for loading TOML config files.
//!
//! Every section falls back to its defaults, so a config file only needs to
//! name the values it changes.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PodcastError;
use crate::speaker::Speaker;
use crate::topic::ScoringWeights;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub scoring: ScoringWeights,
    pub engagement: EngagementConfig,
    pub voices: VoicesConfig,
    pub models: ModelsConfig,
    pub fanout: FanoutConfig,
    pub audio: AudioConfig,
}

/// Timing of the turn scheduler. All durations are in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Exchanges produced for each topic before moving on.
    pub exchanges_per_topic: u32,
    /// Wait before retrying when there is no topic to discuss.
    pub empty_backoff_secs: f64,
    /// Added to each line's audio duration before the next event.
    pub speaker_buffer_secs: f64,
    /// Pause between two exchanges of the same topic.
    pub exchange_pause_secs: f64,
    /// Pause after a topic completes.
    pub topic_pause_secs: f64,
    /// Wait after a failed exchange before selecting a topic again.
    pub error_backoff_secs: f64,
    /// Audio artifacts older than this are purged after each topic.
    pub artifact_max_age_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exchanges_per_topic: 3,
            empty_backoff_secs: 5.0,
            speaker_buffer_secs: 0.5,
            exchange_pause_secs: 2.0,
            topic_pause_secs: 5.0,
            error_backoff_secs: 5.0,
            artifact_max_age_secs: 3600,
        }
    }
}

impl EngineConfig {
    pub fn empty_backoff(&self) -> Duration {
        seconds(self.empty_backoff_secs)
    }

    pub fn speaker_buffer(&self) -> Duration {
        seconds(self.speaker_buffer_secs)
    }

    pub fn exchange_pause(&self) -> Duration {
        seconds(self.exchange_pause_secs)
    }

    pub fn topic_pause(&self) -> Duration {
        seconds(self.topic_pause_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        seconds(self.error_backoff_secs)
    }

    pub fn artifact_max_age(&self) -> Duration {
        Duration::from_secs(self.artifact_max_age_secs)
    }
}

/// Synthetic community chat settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub enabled: bool,
    /// Delay before the first cycle so comments trail the first turn.
    pub startup_delay_secs: f64,
    /// Wait while the show is stopped or has not produced a turn yet.
    pub idle_secs: f64,
    /// Base wait between comment batches.
    pub interval_secs: f64,
    /// Upper bound of the random skew added to `interval_secs`.
    pub jitter_secs: f64,
    /// Delay between two comments of the same batch.
    pub comment_delay_secs: f64,
    pub personas: Vec<ChatPersona>,
    /// Used whenever the comment generator fails.
    pub filler_comments: Vec<String>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            startup_delay_secs: 5.0,
            idle_secs: 10.0,
            interval_secs: 15.0,
            jitter_secs: 5.0,
            comment_delay_secs: 2.0,
            personas: default_personas(),
            filler_comments: vec![
                "Interesting discussion! 👀".to_string(),
                "Great points from both sides".to_string(),
                "This is a complex topic for sure 🤔".to_string(),
                "Love where this conversation is going!".to_string(),
            ],
        }
    }
}

impl EngagementConfig {
    pub fn startup_delay(&self) -> Duration {
        seconds(self.startup_delay_secs)
    }

    pub fn idle(&self) -> Duration {
        seconds(self.idle_secs)
    }

    pub fn comment_delay(&self) -> Duration {
        seconds(self.comment_delay_secs)
    }

    /// Base interval plus `skew`, where `skew` is clamped to `[0, jitter_secs]`.
    pub fn interval_with_skew(&self, skew: f64) -> Duration {
        seconds(self.interval_secs + skew.clamp(0.0, self.jitter_secs.max(0.0)))
    }
}

/// A synthetic chat participant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatPersona {
    pub name: String,
    pub personality: String,
    pub system_prompt: String,
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    pub alex_voice: String,
    pub mira_voice: String,
    /// Playback rate applied after synthesis (1.0 = unchanged).
    pub speed: f32,
}

impl VoicesConfig {
    pub fn voice_for(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::Alex => &self.alex_voice,
            Speaker::Mira => &self.mira_voice,
        }
    }
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            alex_voice: "am_michael".to_string(),
            mira_voice: "af_bella".to_string(),
            speed: 1.0,
        }
    }
}

/// LLM models used by the OpenAI-compatible generators.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub content_model: String,
    pub chat_model: String,
    pub dialogue_max_tokens: u32,
    pub comment_max_tokens: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            content_model: "gpt-4o-mini".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            dialogue_max_tokens: 400,
            comment_max_tokens: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Pending events a subscriber may hold before it is disconnected.
    pub channel_capacity: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Where synthesized audio lands and how it is referenced.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub directory: PathBuf,
    pub url_prefix: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("static/audio"),
            url_prefix: "/static/audio".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PodcastError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PodcastError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, PodcastError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| PodcastError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PodcastError> {
        if self.engine.exchanges_per_topic == 0 {
            return Err(PodcastError::ConfigError(
                "engine.exchanges_per_topic must be at least 1".to_string(),
            ));
        }
        if self.fanout.channel_capacity == 0 {
            return Err(PodcastError::ConfigError(
                "fanout.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.engagement.enabled && self.engagement.personas.is_empty() {
            return Err(PodcastError::ConfigError(
                "engagement.personas cannot be empty while engagement is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

/// Negative, NaN and overflowing values collapse to zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn default_personas() -> Vec<ChatPersona> {
    vec![
        ChatPersona {
            name: "AI_Enthusiast".to_string(),
            personality: "Positive, excited, supportive".to_string(),
            system_prompt: ENTHUSIAST_PROMPT.to_string(),
        },
        ChatPersona {
            name: "AI_Skeptic".to_string(),
            personality: "Critical, questioning, pragmatic".to_string(),
            system_prompt: SKEPTIC_PROMPT.to_string(),
        },
        ChatPersona {
            name: "AI_Curious".to_string(),
            personality: "Neutral, inquisitive, seeks understanding".to_string(),
            system_prompt: CURIOUS_PROMPT.to_string(),
        },
    ]
}

const ENTHUSIAST_PROMPT: &str = r#"You are an enthusiastic member of a live podcast audience.
You are positive, excited about new ideas, and supportive of the hosts.

Write SHORT chat comments (10-20 words) that:
- Show genuine enthusiasm
- Reference specific points from the dialogue
- Ask curious questions now and then
- Use an emoji occasionally, never more than one
"#;

const SKEPTIC_PROMPT: &str = r#"You are a skeptical member of a live podcast audience.
You ask tough questions, point out challenges, and keep the discussion grounded.

Write SHORT chat comments (10-20 words) that:
- Question assumptions
- Point out practical concerns
- Stay respectful while being critical
"#;

const CURIOUS_PROMPT: &str = r#"You are a curious member of a live podcast audience.
You ask clarifying questions, look for deeper understanding, and connect ideas.

Write SHORT chat comments (10-20 words) that:
- Ask for clarification or concrete examples
- Connect the discussion to related topics
- Stay neutral and open-minded
"#;
