//! Bounded history of turns, transcript lines and chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::error::PodcastError;
use crate::speaker::Speaker;
use crate::topic::TopicId;

pub const TURN_CAPACITY: usize = 20;
pub const TRANSCRIPT_CAPACITY: usize = 50;
pub const CHAT_CAPACITY: usize = 100;

const MAX_NICKNAME_CHARS: usize = 50;
const MAX_MESSAGE_CHARS: usize = 500;

/// Append-only log that evicts its oldest entry once full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Up to `count` most recent entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One host's line within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueSegment {
    pub speaker: Speaker,
    pub text: String,
    pub audio_ref: Option<String>,
}

/// A completed exchange. Only ever built with both lines and both audio
/// references present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastTurn {
    pub topic_id: TopicId,
    /// Topic text as it was when the turn started.
    pub topic_text: String,
    pub alex: DialogueSegment,
    pub mira: DialogueSegment,
    pub summary: String,
    /// 1-based exchange index within the topic.
    pub exchange: u32,
    pub created_at: DateTime<Utc>,
}

impl PodcastTurn {
    pub fn segment(&self, speaker: Speaker) -> &DialogueSegment {
        match speaker {
            Speaker::Alex => &self.alex,
            Speaker::Mira => &self.mira,
        }
    }

    /// "Alex: ...\nMira: ..." rendering used as context for chat reactions.
    pub fn dialogue_text(&self) -> String {
        Speaker::ORDER
            .iter()
            .map(|&s| format!("{}: {}", s, self.segment(s).text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn transcript_entries(&self) -> [TranscriptEntry; 2] {
        Speaker::ORDER.map(|speaker| TranscriptEntry {
            speaker,
            text: self.segment(speaker).text.clone(),
            exchange: self.exchange,
            timestamp: self.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub exchange: u32,
    pub timestamp: DateTime<Utc>,
}

/// A chat line from a human or a synthetic persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub nickname: String,
    pub message: String,
    pub is_synthetic: bool,
    /// Only set for synthetic messages.
    pub persona: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Validate and build a message typed by a listener.
    pub fn human(nickname: &str, message: &str) -> Result<Self, PodcastError> {
        let nickname = nickname.trim();
        let message = message.trim();

        if nickname.is_empty() || nickname.chars().count() > MAX_NICKNAME_CHARS {
            return Err(PodcastError::InvalidInput(format!(
                "Nickname must be 1-{} characters",
                MAX_NICKNAME_CHARS
            )));
        }
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(PodcastError::InvalidInput(format!(
                "Message must be 1-{} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            nickname: nickname.to_string(),
            message: message.to_string(),
            is_synthetic: false,
            persona: None,
            timestamp: Utc::now(),
        })
    }

    pub fn synthetic(
        nickname: impl Into<String>,
        persona: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname: nickname.into(),
            message: message.into(),
            is_synthetic: true,
            persona: Some(persona.into()),
            timestamp: Utc::now(),
        }
    }
}
