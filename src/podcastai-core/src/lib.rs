//! PodcastAI Core Library
//!
//! Provides the live podcast engine: topic voting and queueing, the turn and
//! engagement schedulers, event fanout, and the AI/TTS collaborators.

pub mod collaborators;
pub mod config;
pub mod engagement;
pub mod error;
pub mod events;
pub mod generator;
pub mod history;
pub mod queue;
pub mod scheduler;
pub mod show;
pub mod speaker;
pub mod state;
pub mod topic;
pub mod tts;

pub use collaborators::{
    ArtifactStore, Collaborators, CommentGenerator, Dialogue, DialogueGenerator, DialogueRequest,
    SpeechSynthesizer, SynthesizedSpeech,
};
pub use config::{Config, default_config};
pub use error::PodcastError;
pub use events::{PodcastEvent, RankedTopic, SubscriberId, Subscription};
pub use generator::{ApiConfig, OpenAiCommentGenerator, OpenAiDialogueGenerator};
pub use history::{ChatMessage, PodcastTurn, TranscriptEntry};
pub use queue::EnqueueOutcome;
pub use show::Show;
pub use speaker::Speaker;
pub use state::{EnginePhase, NowPlaying, PodcastStatus, QueueInfo};
pub use topic::{Reaction, Topic, TopicId};
pub use tts::{AudioDirectory, KokoroSynthesizer};
