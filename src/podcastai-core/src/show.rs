//! The show facade.
//!
//! [`Show`] is what a surrounding layer (CLI, HTTP API) talks to. It owns the
//! shared state, validates requests, publishes the matching events, and
//! starts and stops the two scheduler tasks together.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::engagement::EngagementScheduler;
use crate::error::PodcastError;
use crate::events::{PodcastEvent, RankedTopic, SubscriberId, Subscription};
use crate::history::{ChatMessage, PodcastTurn, TranscriptEntry};
use crate::queue::EnqueueOutcome;
use crate::scheduler::TurnScheduler;
use crate::state::{NowPlaying, PodcastStatus, QueueInfo, ShowState};
use crate::topic::{Reaction, Topic, TopicId};

const MAX_TOPIC_CHARS: usize = 200;
const MAX_SUBMITTER_CHARS: usize = 50;

struct RunningTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct Show {
    state: Arc<ShowState>,
    collaborators: Collaborators,
    config: Config,
    tasks: Mutex<Option<RunningTasks>>,
}

impl Show {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            state: Arc::new(ShowState::new(&config)),
            collaborators,
            config,
            tasks: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<ShowState> {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ===== Topics =====

    pub fn create_topic(&self, text: &str, submitter: Option<&str>) -> Result<Topic, PodcastError> {
        let text = text.trim();
        if text.is_empty() || text.chars().count() > MAX_TOPIC_CHARS {
            return Err(PodcastError::InvalidInput(format!(
                "Topic text must be 1-{} characters",
                MAX_TOPIC_CHARS
            )));
        }

        let submitter = submitter.map(str::trim).filter(|s| !s.is_empty());
        if submitter.is_some_and(|s| s.chars().count() > MAX_SUBMITTER_CHARS) {
            return Err(PodcastError::InvalidInput(format!(
                "Nickname must be at most {} characters",
                MAX_SUBMITTER_CHARS
            )));
        }

        let topic = self
            .state
            .lock()
            .topics
            .create(text, submitter.map(str::to_string));
        info!(topic_id = %topic.id, text = %topic.text, "topic created");
        self.publish_topics();
        Ok(topic)
    }

    pub fn vote(&self, id: &TopicId, delta: i64) -> Result<Topic, PodcastError> {
        if delta == 0 {
            return Err(PodcastError::InvalidInput("Vote delta cannot be zero".to_string()));
        }
        let topic = self.state.lock().topics.vote(id, delta)?;
        self.publish_topics();
        Ok(topic)
    }

    pub fn react(&self, id: &TopicId, reaction: Reaction) -> Result<Topic, PodcastError> {
        let topic = self.state.lock().topics.react(id, reaction)?;
        self.publish_topics();
        Ok(topic)
    }

    /// All topics, highest score first.
    pub fn list_topics(&self) -> Vec<RankedTopic> {
        self.state.lock().ranked_topics(Utc::now())
    }

    fn publish_topics(&self) {
        let topics = self.list_topics();
        self.state.publish(PodcastEvent::TopicsUpdated { topics });
    }

    // ===== Queue =====

    pub fn enqueue(&self, id: &TopicId) -> Result<EnqueueOutcome, PodcastError> {
        let (outcome, info) = {
            let mut data = self.state.lock();
            if !data.topics.contains(id) {
                return Err(PodcastError::NotFound(id.to_string()));
            }
            let outcome = data.queue.enqueue(*id);
            (outcome, data.queue_info())
        };

        if outcome.position().is_some() {
            self.state.publish(PodcastEvent::QueueUpdated(info));
        }
        Ok(outcome)
    }

    pub fn clear_queue(&self) {
        let info = {
            let mut data = self.state.lock();
            data.queue.clear();
            data.queue_info()
        };
        self.state.publish(PodcastEvent::QueueUpdated(info));
    }

    pub fn queue_info(&self) -> QueueInfo {
        self.state.lock().queue_info()
    }

    // ===== Chat =====

    /// Post a message typed by a listener.
    pub fn post_chat(&self, nickname: &str, message: &str) -> Result<ChatMessage, PodcastError> {
        let message = ChatMessage::human(nickname, message)?;
        self.state.add_chat_message(message.clone());
        self.state.publish(PodcastEvent::ChatMessage(message.clone()));
        Ok(message)
    }

    pub fn recent_chat(&self, count: usize) -> Vec<ChatMessage> {
        self.state.lock().chat.recent(count)
    }

    // ===== Engine control =====

    /// Spawn the schedulers. Returns `false` when the show is already running.
    pub fn start(&self) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.is_some() || !self.state.mark_started() {
            return false;
        }

        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(2);

        let turns = TurnScheduler::new(
            Arc::clone(&self.state),
            Arc::clone(&self.collaborators.dialogue),
            Arc::clone(&self.collaborators.speech),
            Arc::clone(&self.collaborators.artifacts),
            self.config.engine.clone(),
            cancel.child_token(),
        );
        handles.push(tokio::spawn(turns.run()));

        if self.config.engagement.enabled {
            let engagement = EngagementScheduler::new(
                Arc::clone(&self.state),
                Arc::clone(&self.collaborators.comments),
                self.config.engagement.clone(),
                cancel.child_token(),
            );
            handles.push(tokio::spawn(engagement.run()));
        }

        *tasks = Some(RunningTasks { cancel, handles });
        info!("podcast started");
        true
    }

    /// Cancel both schedulers and wait for them to exit. Returns `false`
    /// when the show was not running.
    pub async fn stop(&self) -> bool {
        let Some(running) = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };

        running.cancel.cancel();
        for handle in running.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "scheduler task ended abnormally");
            }
        }

        self.state.mark_stopped();
        info!("podcast stopped");
        true
    }

    pub fn status(&self) -> PodcastStatus {
        self.state.status()
    }

    // ===== Snapshots =====

    pub fn recent_transcript(&self, count: usize) -> Vec<TranscriptEntry> {
        self.state.lock().transcript.recent(count)
    }

    pub fn recent_turns(&self, count: usize) -> Vec<PodcastTurn> {
        self.state.lock().turns.recent(count)
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.state.now_playing()
    }

    // ===== Subscriptions =====

    pub fn subscribe(&self) -> Subscription {
        self.state.events().subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.state.events().unsubscribe(id);
    }
}
