//! Turn scheduling.
//!
//! Picks a topic, runs a fixed number of exchanges on it, and plays each
//! exchange back in real time through the event fanout. The loop runs until
//! its cancellation token fires and survives every collaborator failure.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collaborators::{
    ArtifactStore, Dialogue, DialogueGenerator, DialogueRequest, SpeechSynthesizer,
};
use crate::config::EngineConfig;
use crate::error::PodcastError;
use crate::events::PodcastEvent;
use crate::history::{DialogueSegment, PodcastTurn};
use crate::speaker::Speaker;
use crate::state::{EnginePhase, NowPlaying, ShowState};
use crate::topic::Topic;

/// How a topic run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicOutcome {
    Completed,
    /// Stopped before the last exchange finished playing.
    Interrupted,
}

/// A turn ready to be committed, with the playback length of each line.
struct ProducedTurn {
    turn: PodcastTurn,
    alex_secs: f64,
    mira_secs: f64,
}

impl ProducedTurn {
    fn duration(&self, speaker: Speaker) -> f64 {
        match speaker {
            Speaker::Alex => self.alex_secs,
            Speaker::Mira => self.mira_secs,
        }
    }
}

/// The main show loop.
pub struct TurnScheduler {
    state: Arc<ShowState>,
    dialogue: Arc<dyn DialogueGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    artifacts: Arc<dyn ArtifactStore>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl TurnScheduler {
    pub fn new(
        state: Arc<ShowState>,
        dialogue: Arc<dyn DialogueGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        artifacts: Arc<dyn ArtifactStore>,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            dialogue,
            speech,
            artifacts,
            config,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// Cancellation cuts waits and abandons a turn that is still being
    /// produced. A committed turn is always published in full, and an
    /// interrupted topic is never marked as used.
    pub async fn run(self) {
        info!(
            exchanges_per_topic = self.config.exchanges_per_topic,
            "turn scheduler started"
        );

        while !self.cancel.is_cancelled() {
            self.cycle().await;
        }
        info!("turn scheduler stopped");
    }

    /// Sleep for `duration`. Returns `false` when cancelled first.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// One pass through the state machine: select a topic, discuss it, rest.
    async fn cycle(&self) {
        self.state.set_phase(EnginePhase::AwaitingTopic);

        let Some((topic, queue_info)) = self.state.begin_next_topic() else {
            warn!("no topics available, waiting for submissions");
            self.pause(self.config.empty_backoff()).await;
            return;
        };

        info!(topic_id = %topic.id, topic = %topic.text, "new topic");
        self.state.publish(PodcastEvent::TopicChanged {
            topic_id: topic.id,
            topic_text: topic.text.clone(),
        });
        self.state.publish(PodcastEvent::QueueUpdated(queue_info));

        match self.run_topic(&topic).await {
            Ok(TopicOutcome::Completed) => {
                self.state.set_phase(EnginePhase::BetweenTopics);
                self.state.mark_used(topic.id);
                info!(
                    topic_id = %topic.id,
                    exchanges = self.config.exchanges_per_topic,
                    "topic complete"
                );
                self.spawn_artifact_cleanup();
                self.pause(self.config.topic_pause()).await;
            }
            Ok(TopicOutcome::Interrupted) => {
                info!(topic_id = %topic.id, "topic interrupted by stop");
            }
            Err(e) => {
                error!(topic_id = %topic.id, error = %e, "exchange failed, abandoning topic");
                self.pause(self.config.error_backoff()).await;
            }
        }
    }

    async fn run_topic(&self, topic: &Topic) -> Result<TopicOutcome, PodcastError> {
        let total = self.config.exchanges_per_topic;
        let mut last: Option<Dialogue> = None;

        for exchange in 1..=total {
            self.state.set_phase(EnginePhase::RunningExchange(exchange));
            info!(exchange, total, topic = %topic.text, "starting exchange");

            let produced = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(TopicOutcome::Interrupted),
                produced = self.produce_turn(topic, exchange, last.as_ref()) => produced?,
            };
            last = Some(Dialogue {
                alex: produced.turn.alex.text.clone(),
                mira: produced.turn.mira.text.clone(),
                summary: produced.turn.summary.clone(),
            });

            self.state.commit_turn(produced.turn.clone());
            if !self.play(&produced).await {
                return Ok(TopicOutcome::Interrupted);
            }

            if exchange < total {
                debug!(next = exchange + 1, "pausing between exchanges");
                if !self.pause(self.config.exchange_pause()).await {
                    return Ok(TopicOutcome::Interrupted);
                }
            }
        }

        Ok(TopicOutcome::Completed)
    }

    /// Generate and voice one exchange. Nothing is written to the shared
    /// state here, so an error leaves no trace of the exchange.
    async fn produce_turn(
        &self,
        topic: &Topic,
        exchange: u32,
        last: Option<&Dialogue>,
    ) -> Result<ProducedTurn, PodcastError> {
        let total = self.config.exchanges_per_topic;
        let request = DialogueRequest {
            topic: topic.text.clone(),
            continuity_note: if exchange > 1 {
                format!("This is exchange {} of {} on this topic.", exchange, total)
            } else {
                String::new()
            },
            exchange,
            last_alex: last.map(|d| d.alex.clone()).unwrap_or_default(),
            last_mira: last.map(|d| d.mira.clone()).unwrap_or_default(),
        };

        let dialogue = match self.dialogue.generate(&request).await {
            Ok(dialogue) => clean_dialogue(dialogue, &topic.text),
            Err(e) => {
                warn!(error = %e, exchange, "dialogue generation failed, using fallback lines");
                Dialogue::fallback(&topic.text)
            }
        };
        debug!(
            alex_chars = dialogue.alex.len(),
            mira_chars = dialogue.mira.len(),
            "dialogue ready"
        );

        let (alex_audio, mira_audio) = tokio::try_join!(
            self.speech.synthesize(&dialogue.alex, Speaker::Alex),
            self.speech.synthesize(&dialogue.mira, Speaker::Mira)
        )?;
        info!(
            alex_secs = alex_audio.duration_secs,
            mira_secs = mira_audio.duration_secs,
            "audio synthesized"
        );

        let turn = PodcastTurn {
            topic_id: topic.id,
            topic_text: topic.text.clone(),
            alex: DialogueSegment {
                speaker: Speaker::Alex,
                text: dialogue.alex,
                audio_ref: Some(alex_audio.audio_ref),
            },
            mira: DialogueSegment {
                speaker: Speaker::Mira,
                text: dialogue.mira,
                audio_ref: Some(mira_audio.audio_ref),
            },
            summary: dialogue.summary,
            exchange,
            created_at: Utc::now(),
        };

        Ok(ProducedTurn {
            turn,
            alex_secs: alex_audio.duration_secs,
            mira_secs: mira_audio.duration_secs,
        })
    }

    /// Publish each line in speaker order, holding each one on air for its
    /// audio duration plus the configured buffer.
    ///
    /// Once cancelled, the remaining lines go out immediately so subscribers
    /// always see the whole turn. Returns `false` in that case.
    async fn play(&self, produced: &ProducedTurn) -> bool {
        let turn = &produced.turn;
        let mut on_air = true;

        for speaker in Speaker::ORDER {
            let segment = turn.segment(speaker);
            let duration_secs = produced.duration(speaker);
            let audio_ref = segment.audio_ref.clone().unwrap_or_default();
            let hold = playback_duration(duration_secs);

            let started_at = Utc::now();
            self.state.record_now_playing(NowPlaying {
                speaker,
                text: segment.text.clone(),
                audio_ref: audio_ref.clone(),
                topic_id: turn.topic_id,
                topic_text: turn.topic_text.clone(),
                exchange: turn.exchange,
                started_at,
                ends_at: started_at
                    + chrono::Duration::from_std(hold).unwrap_or_else(|_| chrono::Duration::zero()),
            });
            self.state.publish(PodcastEvent::NowPlaying {
                speaker,
                text: segment.text.clone(),
                audio_ref,
                topic_id: turn.topic_id,
                topic: turn.topic_text.clone(),
                exchange: turn.exchange,
                duration_secs,
            });
            self.state.publish(PodcastEvent::TranscriptUpdate {
                speaker,
                text: segment.text.clone(),
                exchange: turn.exchange,
            });

            if on_air {
                debug!(%speaker, duration_secs, "playing");
                on_air = self.pause(hold + self.config.speaker_buffer()).await;
            }
        }

        on_air
    }

    fn spawn_artifact_cleanup(&self) {
        let artifacts = Arc::clone(&self.artifacts);
        let max_age = self.config.artifact_max_age();
        tokio::spawn(async move {
            match artifacts.purge_older_than(max_age).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged old audio artifacts"),
                Err(e) => error!(error = %e, "audio artifact cleanup failed"),
            }
        });
    }
}

/// Convert a reported audio length into a sleep, treating nonsense values as
/// zero.
fn playback_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Sanitize both lines of a generated exchange. A line that ends up empty
/// replaces the whole exchange with the fallback.
fn clean_dialogue(dialogue: Dialogue, topic: &str) -> Dialogue {
    let alex = sanitize_response(&dialogue.alex);
    let mira = sanitize_response(&dialogue.mira);

    if alex.is_empty() || mira.is_empty() {
        warn!("generated dialogue was empty after sanitizing, using fallback lines");
        return Dialogue::fallback(topic);
    }

    Dialogue {
        alex,
        mira,
        summary: sanitize_response(&dialogue.summary),
    }
}

/// Sanitize AI response by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <thinking>...</thinking>, <reflection>...</reflection>, etc.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratchpad",
        "plan",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    // Orphaned opening/closing tags
    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    // Markdown emphasis would be read aloud by the synthesizer
    result = result.replace('*', "");

    if let Ok(ws_re) = regex::Regex::new(r"\s+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_response_thinking_tags() {
        let input = "<thinking>Let me think about this...</thinking>The answer is 42.";
        assert_eq!(sanitize_response(input), "The answer is 42.");
    }

    #[test]
    fn test_sanitize_response_multiline_tags() {
        let input = "<think>\nMultiple\nlines\n</think>Tides are fascinating.";
        assert_eq!(sanitize_response(input), "Tides are fascinating.");
    }

    #[test]
    fn test_sanitize_response_strips_emphasis() {
        let input = "This is *really* exciting,   Mira!";
        assert_eq!(sanitize_response(input), "This is really exciting, Mira!");
    }

    #[test]
    fn test_sanitize_response_orphan_tags() {
        let output = sanitize_response("Start <inner>tags</inner> end");
        assert!(!output.contains('<'));
        assert_eq!(output, "Start tags end");
    }

    #[test]
    fn test_clean_dialogue_falls_back_on_empty_line() {
        let dialogue = Dialogue {
            alex: "<think>only thoughts</think>".to_string(),
            mira: "A real line.".to_string(),
            summary: String::new(),
        };
        assert_eq!(clean_dialogue(dialogue, "Tides"), Dialogue::fallback("Tides"));
    }

    #[test]
    fn test_playback_duration_rejects_nonsense() {
        assert_eq!(playback_duration(1.5), Duration::from_millis(1500));
        assert_eq!(playback_duration(-2.0), Duration::ZERO);
        assert_eq!(playback_duration(f64::NAN), Duration::ZERO);
        assert_eq!(playback_duration(f64::INFINITY), Duration::ZERO);
    }
}
