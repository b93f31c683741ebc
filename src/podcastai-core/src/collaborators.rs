//! Capabilities the engine consumes but does not implement itself.
//!
//! The schedulers hold these as `Arc<dyn _>` so tests can substitute
//! scripted versions for the OpenAI and kokoro-backed implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ChatPersona;
use crate::error::PodcastError;
use crate::speaker::Speaker;

/// Input for one exchange of dialogue.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueRequest {
    pub topic: String,
    /// Where this exchange sits in the topic, empty for the first one.
    pub continuity_note: String,
    /// 1-based exchange index.
    pub exchange: u32,
    pub last_alex: String,
    pub last_mira: String,
}

/// Both hosts' lines for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    pub alex: String,
    pub mira: String,
    #[serde(default)]
    pub summary: String,
}

impl Dialogue {
    /// Placeholder exchange used when the generator is unavailable.
    pub fn fallback(topic: &str) -> Self {
        Self {
            alex: format!(
                "Let's explore {}. This is a fascinating area with lots of potential!",
                topic
            ),
            mira: "That's interesting, Alex. But we should also consider the practical challenges involved."
                .to_string(),
            summary: format!("Discussed {} from optimistic and pragmatic angles.", topic),
        }
    }
}

/// A playable audio artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedSpeech {
    pub audio_ref: String,
    pub duration_secs: f64,
}

#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn generate(&self, request: &DialogueRequest) -> Result<Dialogue, PodcastError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, speaker: Speaker)
    -> Result<SynthesizedSpeech, PodcastError>;
}

#[async_trait]
pub trait CommentGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        recent_dialogue: &str,
        persona: &ChatPersona,
    ) -> Result<String, PodcastError>;
}

/// Storage of synthesized audio that needs periodic cleanup.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Delete artifacts older than `max_age`, returning how many were removed.
    async fn purge_older_than(&self, max_age: Duration) -> Result<usize, PodcastError>;
}

/// The full set of external capabilities the schedulers need.
#[derive(Clone)]
pub struct Collaborators {
    pub dialogue: Arc<dyn DialogueGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub comments: Arc<dyn CommentGenerator>,
    pub artifacts: Arc<dyn ArtifactStore>,
}
