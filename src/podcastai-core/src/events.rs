//! Typed events and their fanout to live subscribers.
//!
//! Each subscriber owns a bounded channel. Delivery never blocks the
//! publisher: a subscriber whose channel is closed or full is disconnected
//! on the spot and the remaining subscribers still get the event.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::history::ChatMessage;
use crate::speaker::Speaker;
use crate::state::QueueInfo;
use crate::topic::{Topic, TopicId};

/// A topic together with its score at the time it was listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTopic {
    #[serde(flatten)]
    pub topic: Topic,
    pub score: f64,
    pub positive_ratio: f64,
}

/// Events pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodcastEvent {
    TopicsUpdated {
        topics: Vec<RankedTopic>,
    },
    QueueUpdated(QueueInfo),
    TopicChanged {
        topic_id: TopicId,
        topic_text: String,
    },
    NowPlaying {
        speaker: Speaker,
        text: String,
        audio_ref: String,
        topic_id: TopicId,
        topic: String,
        exchange: u32,
        duration_secs: f64,
    },
    TranscriptUpdate {
        speaker: Speaker,
        text: String,
        exchange: u32,
    },
    ChatMessage(ChatMessage),
}

impl PodcastEvent {
    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            PodcastEvent::TopicsUpdated { .. } => "TOPICS_UPDATED",
            PodcastEvent::QueueUpdated(_) => "QUEUE_UPDATED",
            PodcastEvent::TopicChanged { .. } => "TOPIC_CHANGED",
            PodcastEvent::NowPlaying { .. } => "NOW_PLAYING",
            PodcastEvent::TranscriptUpdate { .. } => "TRANSCRIPT_UPDATE",
            PodcastEvent::ChatMessage(_) => "CHAT_MESSAGE",
        }
    }
}

pub type SubscriberId = u64;

/// A live event feed. Dropping it disconnects the subscriber on the next
/// publish.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<PodcastEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event in publish order, or `None` once unsubscribed or
    /// disconnected and drained.
    pub async fn recv(&mut self) -> Option<PodcastEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PodcastEvent> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
pub struct EventFanout {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<PodcastEvent>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl EventFanout {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        tracing::debug!(subscriber = id, "subscriber registered");
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let removed = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            tracing::debug!(subscriber = id, "subscriber removed");
        }
    }

    /// Deliver `event` to every registered subscriber.
    pub fn publish(&self, event: PodcastEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut dropped = Vec::new();
        for (&id, tx) in subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber = id,
                        kind = event.kind(),
                        "subscriber lagging, disconnecting"
                    );
                    dropped.push(id);
                }
                Err(TrySendError::Closed(_)) => dropped.push(id),
            }
        }

        for id in dropped {
            subscribers.remove(&id);
        }

        tracing::trace!(kind = event.kind(), subscribers = subscribers.len(), "event published");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
