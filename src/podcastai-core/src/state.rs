//! The shared in-memory store.
//!
//! [`ShowState`] is constructed once and handed to every component as an
//! `Arc`. All mutable data sits behind one mutex which is never held across
//! an `.await`; readers get owned snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::Config;
use crate::events::{EventFanout, PodcastEvent, RankedTopic};
use crate::history::{
    CHAT_CAPACITY, ChatMessage, PodcastTurn, RingBuffer, TRANSCRIPT_CAPACITY, TURN_CAPACITY,
    TranscriptEntry,
};
use crate::queue::SelectionQueue;
use crate::speaker::Speaker;
use crate::topic::{Topic, TopicId, TopicRegistry};

/// Where the turn scheduler currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "exchange", rename_all = "snake_case")]
pub enum EnginePhase {
    Stopped,
    AwaitingTopic,
    RunningExchange(u32),
    BetweenTopics,
}

/// What is on air right now, stamped when the `NOW_PLAYING` event went out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub speaker: Speaker,
    pub text: String,
    pub audio_ref: String,
    pub topic_id: TopicId,
    pub topic_text: String,
    pub exchange: u32,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EngineState {
    pub running: bool,
    pub phase: EnginePhase,
    pub started_at: Option<DateTime<Utc>>,
    pub current_topic: Option<(TopicId, String)>,
    /// Turns completed since the last start.
    pub turn_count: u64,
    pub current_speaker: Speaker,
    pub last_summary: String,
    pub now_playing: Option<NowPlaying>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            running: false,
            phase: EnginePhase::Stopped,
            started_at: None,
            current_topic: None,
            turn_count: 0,
            current_speaker: Speaker::Alex,
            last_summary: String::new(),
            now_playing: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedTopic {
    pub id: TopicId,
    pub text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueInfo {
    pub current_topic: Option<String>,
    pub queue: Vec<QueuedTopic>,
    pub queue_length: usize,
    pub used_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodcastStatus {
    pub running: bool,
    pub phase: EnginePhase,
    pub current_topic: Option<String>,
    pub turn_count: u64,
    pub uptime_secs: f64,
}

/// Everything guarded by the state lock.
#[derive(Debug)]
pub struct ShowData {
    pub topics: TopicRegistry,
    pub queue: SelectionQueue,
    pub turns: RingBuffer<PodcastTurn>,
    pub transcript: RingBuffer<TranscriptEntry>,
    pub chat: RingBuffer<ChatMessage>,
    pub engine: EngineState,
}

impl ShowData {
    pub fn queue_info(&self) -> QueueInfo {
        let queue = self
            .queue
            .pending()
            .filter_map(|id| self.topics.get(id))
            .map(|t| QueuedTopic {
                id: t.id,
                text: t.text.clone(),
                votes: t.votes,
            })
            .collect();

        QueueInfo {
            current_topic: self.engine.current_topic.as_ref().map(|(_, text)| text.clone()),
            queue,
            queue_length: self.queue.pending_count(),
            used_count: self.queue.used_count(),
        }
    }

    pub fn ranked_topics(&self, now: DateTime<Utc>) -> Vec<RankedTopic> {
        let weights = *self.topics.weights();
        self.topics
            .list_sorted(now)
            .into_iter()
            .map(|topic| RankedTopic {
                score: topic.score_at(&weights, now),
                positive_ratio: topic.positive_ratio(),
                topic,
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct ShowState {
    data: Mutex<ShowData>,
    events: EventFanout,
}

impl ShowState {
    pub fn new(config: &Config) -> Self {
        Self {
            data: Mutex::new(ShowData {
                topics: TopicRegistry::new(config.scoring),
                queue: SelectionQueue::new(),
                turns: RingBuffer::new(TURN_CAPACITY),
                transcript: RingBuffer::new(TRANSCRIPT_CAPACITY),
                chat: RingBuffer::new(CHAT_CAPACITY),
                engine: EngineState::default(),
            }),
            events: EventFanout::new(config.fanout.channel_capacity),
        }
    }

    /// Lock the store. A panic in another holder does not make the data
    /// unusable, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, ShowData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> &EventFanout {
        &self.events
    }

    pub fn publish(&self, event: PodcastEvent) {
        self.events.publish(event);
    }

    pub fn is_running(&self) -> bool {
        self.lock().engine.running
    }

    pub fn set_phase(&self, phase: EnginePhase) {
        let mut data = self.lock();
        if data.engine.running {
            data.engine.phase = phase;
        }
    }

    /// Flip to running. Returns `false` when already running.
    pub fn mark_started(&self) -> bool {
        let mut data = self.lock();
        if data.engine.running {
            return false;
        }
        data.engine.running = true;
        data.engine.phase = EnginePhase::AwaitingTopic;
        data.engine.started_at = Some(Utc::now());
        data.engine.turn_count = 0;
        true
    }

    /// Flip to stopped. Returns `false` when already stopped.
    pub fn mark_stopped(&self) -> bool {
        let mut data = self.lock();
        if !data.engine.running {
            return false;
        }
        data.engine.running = false;
        data.engine.phase = EnginePhase::Stopped;
        data.engine.current_topic = None;
        data.engine.current_speaker = Speaker::Alex;
        data.engine.now_playing = None;
        true
    }

    /// Pick the next topic and make it current. The transcript is reset so
    /// it only ever shows the current topic.
    pub fn begin_next_topic(&self) -> Option<(Topic, QueueInfo)> {
        let mut data = self.lock();
        let data = &mut *data;
        let topic = data.queue.select_next(&data.topics, Utc::now())?;

        data.transcript.clear();
        data.engine.current_topic = Some((topic.id, topic.text.clone()));
        let info = data.queue_info();
        Some((topic, info))
    }

    /// Store a completed turn and its transcript lines in one step.
    pub fn commit_turn(&self, turn: PodcastTurn) {
        let mut data = self.lock();
        for entry in turn.transcript_entries() {
            data.transcript.push(entry);
        }
        data.engine.turn_count += 1;
        data.engine.last_summary = turn.summary.clone();
        data.turns.push(turn);
    }

    pub fn mark_used(&self, id: TopicId) {
        self.lock().queue.mark_used(id);
    }

    pub fn record_now_playing(&self, now_playing: NowPlaying) {
        let mut data = self.lock();
        data.engine.current_speaker = now_playing.speaker;
        data.engine.now_playing = Some(now_playing);
    }

    pub fn latest_turn(&self) -> Option<PodcastTurn> {
        self.lock().turns.latest().cloned()
    }

    pub fn turn_count(&self) -> u64 {
        self.lock().engine.turn_count
    }

    pub fn add_chat_message(&self, message: ChatMessage) {
        self.lock().chat.push(message);
    }

    pub fn status(&self) -> PodcastStatus {
        let data = self.lock();
        let engine = &data.engine;
        let uptime_secs = match engine.started_at {
            Some(started) if engine.running => {
                (Utc::now() - started).num_milliseconds().max(0) as f64 / 1000.0
            }
            _ => 0.0,
        };

        PodcastStatus {
            running: engine.running,
            phase: engine.phase,
            current_topic: engine.current_topic.as_ref().map(|(_, text)| text.clone()),
            turn_count: engine.turn_count,
            uptime_secs,
        }
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.lock().engine.now_playing.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::history::DialogueSegment;

    fn turn_for(topic: &Topic, exchange: u32) -> PodcastTurn {
        PodcastTurn {
            topic_id: topic.id,
            topic_text: topic.text.clone(),
            alex: DialogueSegment {
                speaker: Speaker::Alex,
                text: format!("alex {}", exchange),
                audio_ref: Some("/a.wav".to_string()),
            },
            mira: DialogueSegment {
                speaker: Speaker::Mira,
                text: format!("mira {}", exchange),
                audio_ref: Some("/m.wav".to_string()),
            },
            summary: format!("summary {}", exchange),
            exchange,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_begin_next_topic_clears_transcript() {
        let state = ShowState::new(&default_config());
        let first = state.lock().topics.create("first", None);
        state.lock().topics.create("second", None);

        state.commit_turn(turn_for(&first, 1));
        assert_eq!(state.lock().transcript.len(), 2);

        let (topic, info) = state.begin_next_topic().unwrap();
        assert_eq!(info.current_topic.as_deref(), Some(topic.text.as_str()));
        assert!(state.lock().transcript.is_empty());
        assert_eq!(state.lock().turns.len(), 1);
    }

    #[test]
    fn test_commit_turn_counts_and_summarizes() {
        let state = ShowState::new(&default_config());
        let topic = state.lock().topics.create("t", None);

        state.commit_turn(turn_for(&topic, 1));
        state.commit_turn(turn_for(&topic, 2));

        let data = state.lock();
        assert_eq!(data.engine.turn_count, 2);
        assert_eq!(data.engine.last_summary, "summary 2");
        let texts: Vec<String> = data.transcript.recent(10).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["alex 1", "mira 1", "alex 2", "mira 2"]);
    }

    #[test]
    fn test_start_stop_flags() {
        let state = ShowState::new(&default_config());
        assert!(state.mark_started());
        assert!(!state.mark_started());
        assert_eq!(state.status().phase, EnginePhase::AwaitingTopic);

        state.set_phase(EnginePhase::RunningExchange(2));
        assert_eq!(state.status().phase, EnginePhase::RunningExchange(2));

        assert!(state.mark_stopped());
        assert!(!state.mark_stopped());
        let status = state.status();
        assert!(!status.running);
        assert_eq!(status.phase, EnginePhase::Stopped);
        assert_eq!(status.uptime_secs, 0.0);
    }

    #[test]
    fn test_set_phase_ignored_while_stopped() {
        let state = ShowState::new(&default_config());
        state.set_phase(EnginePhase::BetweenTopics);
        assert_eq!(state.status().phase, EnginePhase::Stopped);
    }

    #[test]
    fn test_queue_info_lists_pending_topics() {
        let state = ShowState::new(&default_config());
        let mut data = state.lock();
        let topic = data.topics.create("queued", None);
        data.topics.vote(&topic.id, 4).unwrap();
        data.queue.enqueue(topic.id);

        let info = data.queue_info();
        assert_eq!(info.queue_length, 1);
        assert_eq!(info.queue[0].votes, 4);
        assert_eq!(info.used_count, 0);
        assert!(info.current_topic.is_none());
    }
}
