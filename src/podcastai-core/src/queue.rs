//! Topic selection: an explicit FIFO with a score-based fallback.
//!
//! Operators steer the show through the FIFO. When it is empty the best
//! scoring topic that has not been discussed yet is picked, and once every
//! topic has been discussed the "used" set is reset so the show can replay.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

use crate::topic::{Topic, TopicId, TopicRegistry};

/// Result of an enqueue request. Rejections are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// Appended at this 1-based position.
    Queued { position: usize },
    AlreadyQueued,
    AlreadyUsed,
}

impl EnqueueOutcome {
    pub fn position(&self) -> Option<usize> {
        match self {
            EnqueueOutcome::Queued { position } => Some(*position),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SelectionQueue {
    pending: VecDeque<TopicId>,
    used: HashSet<TopicId>,
}

impl SelectionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, id: TopicId) -> EnqueueOutcome {
        if self.used.contains(&id) {
            return EnqueueOutcome::AlreadyUsed;
        }
        if self.pending.contains(&id) {
            return EnqueueOutcome::AlreadyQueued;
        }
        self.pending.push_back(id);
        EnqueueOutcome::Queued {
            position: self.pending.len(),
        }
    }

    /// Pick the next topic to discuss.
    ///
    /// Queued ids that no longer resolve are dropped silently.
    pub fn select_next(&mut self, registry: &TopicRegistry, now: DateTime<Utc>) -> Option<Topic> {
        while let Some(id) = self.pending.pop_front() {
            if let Some(topic) = registry.get(&id) {
                return Some(topic.clone());
            }
            tracing::debug!(topic_id = %id, "skipping stale queue entry");
        }

        if registry.iter().all(|t| self.used.contains(&t.id)) && !self.used.is_empty() {
            tracing::info!(used = self.used.len(), "every topic discussed, replaying");
            self.used.clear();
        }

        registry
            .top_where(now, |t| !self.used.contains(&t.id))
            .cloned()
    }

    pub fn mark_used(&mut self, id: TopicId) {
        self.pending.retain(|queued| *queued != id);
        self.used.insert(id);
    }

    pub fn is_used(&self, id: &TopicId) -> bool {
        self.used.contains(id)
    }

    /// Drop every pending entry. Used topics stay used.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self) -> impl Iterator<Item = &TopicId> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn used_count(&self) -> usize {
        self.used.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_scores(scores: &[i64]) -> (TopicRegistry, Vec<TopicId>) {
        let mut registry = TopicRegistry::default();
        let ids = scores
            .iter()
            .enumerate()
            .map(|(i, &votes)| {
                let topic = registry.create(format!("topic {}", i), None);
                registry.vote(&topic.id, votes).unwrap();
                topic.id
            })
            .collect();
        (registry, ids)
    }

    #[test]
    fn test_fallback_walks_scores_then_replays() {
        let (registry, ids) = registry_with_scores(&[10, 5]);
        let (a, b) = (ids[0], ids[1]);
        let mut queue = SelectionQueue::new();
        let now = Utc::now();

        assert_eq!(queue.select_next(&registry, now).unwrap().id, a);
        queue.mark_used(a);
        assert_eq!(queue.select_next(&registry, now).unwrap().id, b);
        queue.mark_used(b);

        let replay = queue.select_next(&registry, now).unwrap();
        assert!(replay.id == a || replay.id == b);
        assert_eq!(queue.used_count(), 0);
    }

    #[test]
    fn test_fifo_overrides_score() {
        let (registry, ids) = registry_with_scores(&[10, 5]);
        let (a, b) = (ids[0], ids[1]);
        let mut queue = SelectionQueue::new();

        assert_eq!(queue.enqueue(b), EnqueueOutcome::Queued { position: 1 });
        assert_eq!(queue.enqueue(a), EnqueueOutcome::Queued { position: 2 });

        let now = Utc::now();
        assert_eq!(queue.select_next(&registry, now).unwrap().id, b);
        assert_eq!(queue.select_next(&registry, now).unwrap().id, a);
    }

    #[test]
    fn test_enqueue_rejections() {
        let (_, ids) = registry_with_scores(&[1, 1]);
        let mut queue = SelectionQueue::new();

        queue.enqueue(ids[0]);
        assert_eq!(queue.enqueue(ids[0]), EnqueueOutcome::AlreadyQueued);

        queue.mark_used(ids[1]);
        let outcome = queue.enqueue(ids[1]);
        assert_eq!(outcome, EnqueueOutcome::AlreadyUsed);
        assert_eq!(outcome.position(), None);
    }

    #[test]
    fn test_mark_used_removes_pending_entry() {
        let (_, ids) = registry_with_scores(&[1]);
        let mut queue = SelectionQueue::new();
        queue.enqueue(ids[0]);
        queue.mark_used(ids[0]);

        assert!(queue.is_used(&ids[0]));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_stale_ids_fall_through_to_score() {
        let (registry, ids) = registry_with_scores(&[3]);
        let mut queue = SelectionQueue::new();
        queue.enqueue(TopicId::new());

        assert_eq!(queue.select_next(&registry, Utc::now()).unwrap().id, ids[0]);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        let registry = TopicRegistry::default();
        let mut queue = SelectionQueue::new();
        assert!(queue.select_next(&registry, Utc::now()).is_none());
    }

    #[test]
    fn test_never_selects_used_unless_all_used() {
        let (registry, ids) = registry_with_scores(&[9, 8, 7]);
        let mut queue = SelectionQueue::new();
        let now = Utc::now();
        queue.mark_used(ids[0]);

        for _ in 0..2 {
            let next = queue.select_next(&registry, now).unwrap();
            assert!(!queue.is_used(&next.id));
            queue.mark_used(next.id);
        }
        assert_eq!(queue.used_count(), 3);
    }
}
