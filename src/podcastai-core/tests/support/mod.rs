#![allow(dead_code)]

use async_trait::async_trait;
use podcastai_core::config::ChatPersona;
use podcastai_core::{
    ArtifactStore, Collaborators, CommentGenerator, Config, Dialogue, DialogueGenerator,
    DialogueRequest, PodcastError, PodcastEvent, Show, Speaker, SpeechSynthesizer,
    SynthesizedSpeech, Subscription, default_config,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Writes predictable lines and records every request it saw.
#[derive(Default)]
pub struct ScriptedDialogue {
    pub fail: bool,
    pub requests: Mutex<Vec<DialogueRequest>>,
}

impl ScriptedDialogue {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<DialogueRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialogueGenerator for ScriptedDialogue {
    async fn generate(&self, request: &DialogueRequest) -> Result<Dialogue, PodcastError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(PodcastError::Generation("model unavailable".to_string()));
        }
        Ok(Dialogue {
            alex: format!("Alex {} on {}", request.exchange, request.topic),
            mira: format!("Mira {} on {}", request.exchange, request.topic),
            summary: format!("Exchange {}", request.exchange),
        })
    }
}

/// Returns fixed durations per speaker, optionally failing for one of them.
pub struct ScriptedSpeech {
    pub alex_secs: f64,
    pub mira_secs: f64,
    pub fail_for: Option<Speaker>,
    pub calls: AtomicUsize,
}

impl ScriptedSpeech {
    pub fn new(alex_secs: f64, mira_secs: f64) -> Self {
        Self {
            alex_secs,
            mira_secs,
            fail_for: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(speaker: Speaker) -> Self {
        Self {
            fail_for: Some(speaker),
            ..Self::new(1.0, 1.0)
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        speaker: Speaker,
    ) -> Result<SynthesizedSpeech, PodcastError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for == Some(speaker) {
            return Err(PodcastError::Synthesis("voice unavailable".to_string()));
        }
        let duration_secs = match speaker {
            Speaker::Alex => self.alex_secs,
            Speaker::Mira => self.mira_secs,
        };
        Ok(SynthesizedSpeech {
            audio_ref: format!("/static/audio/{}_{}.wav", speaker.id(), n),
            duration_secs,
        })
    }
}

pub struct ScriptedComments {
    pub reply: Option<String>,
}

#[async_trait]
impl CommentGenerator for ScriptedComments {
    async fn generate(
        &self,
        _topic: &str,
        _recent_dialogue: &str,
        persona: &ChatPersona,
    ) -> Result<String, PodcastError> {
        match &self.reply {
            Some(reply) => Ok(format!("\"{} says {}\"", persona.name, reply)),
            None => Err(PodcastError::Generation("rate limited".to_string())),
        }
    }
}

#[derive(Default)]
pub struct CountingArtifacts {
    pub purges: AtomicUsize,
}

#[async_trait]
impl ArtifactStore for CountingArtifacts {
    async fn purge_older_than(&self, _max_age: Duration) -> Result<usize, PodcastError> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

/// Defaults with engagement switched off and two exchanges per topic.
pub fn test_config() -> Config {
    let mut config = default_config();
    config.engine.exchanges_per_topic = 2;
    config.engagement.enabled = false;
    config
}

pub struct Harness {
    pub show: Show,
    pub dialogue: Arc<ScriptedDialogue>,
    pub speech: Arc<ScriptedSpeech>,
    pub artifacts: Arc<CountingArtifacts>,
}

pub fn harness(config: Config, dialogue: ScriptedDialogue, speech: ScriptedSpeech) -> Harness {
    let comments = ScriptedComments {
        reply: Some("hi".to_string()),
    };
    harness_with_comments(config, dialogue, speech, comments)
}

pub fn harness_with_comments(
    config: Config,
    dialogue: ScriptedDialogue,
    speech: ScriptedSpeech,
    comments: ScriptedComments,
) -> Harness {
    let dialogue = Arc::new(dialogue);
    let speech = Arc::new(speech);
    let artifacts = Arc::new(CountingArtifacts::default());
    let collaborators = Collaborators {
        dialogue: dialogue.clone(),
        speech: speech.clone(),
        comments: Arc::new(comments),
        artifacts: artifacts.clone(),
    };
    Harness {
        show: Show::new(config, collaborators),
        dialogue,
        speech,
        artifacts,
    }
}

/// Next event, failing the test if nothing arrives within an hour of
/// (paused) time.
pub async fn next_event(sub: &mut Subscription) -> PodcastEvent {
    tokio::time::timeout(Duration::from_secs(3600), sub.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("subscription closed")
}

/// Skip events until one of the given kind arrives.
pub async fn next_of_kind(sub: &mut Subscription, kind: &str) -> PodcastEvent {
    loop {
        let event = next_event(sub).await;
        if event.kind() == kind {
            return event;
        }
    }
}
