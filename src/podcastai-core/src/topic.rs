//! Topic registry and scoring.
//!
//! Topics are never removed. Their score is evaluated at read time from the
//! current counters and the wall clock, so rankings are always fresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PodcastError;

/// Seconds over which the recency multiplier decays to its floor.
const RECENCY_WINDOW_SECS: f64 = 3600.0;
/// Lowest value the recency multiplier can reach.
const RECENCY_FLOOR: f64 = 0.5;

/// Opaque topic identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(Uuid);

impl TopicId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TopicId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TopicId {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(TopicId)
            .map_err(|_| PodcastError::InvalidInput(format!("'{}' is not a topic id", s)))
    }
}

/// Weights applied to a topic's counters when scoring.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub vote_weight: f64,
    pub thumbs_up_weight: f64,
    /// Applied by absolute value, so the sign in config does not matter.
    pub thumbs_down_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            vote_weight: 1.0,
            thumbs_up_weight: 5.0,
            thumbs_down_weight: -3.0,
        }
    }
}

/// One of the two accepted reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reaction {
    ThumbsUp,
    ThumbsDown,
}

impl Reaction {
    pub fn emoji(&self) -> &'static str {
        match self {
            Reaction::ThumbsUp => "👍",
            Reaction::ThumbsDown => "👎",
        }
    }
}

impl FromStr for Reaction {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "👍" | "up" | "+" => Ok(Reaction::ThumbsUp),
            "👎" | "down" | "-" => Ok(Reaction::ThumbsDown),
            other => Err(PodcastError::InvalidInput(format!(
                "Invalid reaction '{}'. Use 👍 or 👎",
                other
            ))),
        }
    }
}

/// A submitted discussion topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub text: String,
    pub submitter: Option<String>,
    pub votes: i64,
    pub thumbs_up: u64,
    pub thumbs_down: u64,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(text: impl Into<String>, submitter: Option<String>) -> Self {
        Self {
            id: TopicId::new(),
            text: text.into(),
            submitter,
            votes: 0,
            thumbs_up: 0,
            thumbs_down: 0,
            created_at: Utc::now(),
        }
    }

    /// Priority score as of `now`.
    pub fn score_at(&self, weights: &ScoringWeights, now: DateTime<Utc>) -> f64 {
        let base = self.votes as f64 * weights.vote_weight;
        let boost = self.thumbs_up as f64 * weights.thumbs_up_weight;
        let penalty = self.thumbs_down as f64 * weights.thumbs_down_weight.abs();

        let age_seconds = ((now - self.created_at).num_milliseconds() as f64 / 1000.0).max(0.0);
        let recency = (1.0 - age_seconds / RECENCY_WINDOW_SECS).max(RECENCY_FLOOR);

        (base + boost - penalty) * recency
    }

    /// Priority score against the current wall clock.
    pub fn score(&self, weights: &ScoringWeights) -> f64 {
        self.score_at(weights, Utc::now())
    }

    /// Share of thumbs-up among all reactions, 0 when there are none.
    pub fn positive_ratio(&self) -> f64 {
        let total = self.thumbs_up + self.thumbs_down;
        if total == 0 {
            return 0.0;
        }
        self.thumbs_up as f64 / total as f64
    }
}

/// All topics ever submitted, in submission order.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: Vec<Topic>,
    index: HashMap<TopicId, usize>,
    weights: ScoringWeights,
}

impl TopicRegistry {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            topics: Vec::new(),
            index: HashMap::new(),
            weights,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Register a new topic and return a copy of it.
    pub fn create(&mut self, text: impl Into<String>, submitter: Option<String>) -> Topic {
        self.insert(Topic::new(text, submitter))
    }

    /// Register an already constructed topic.
    pub fn insert(&mut self, topic: Topic) -> Topic {
        self.index.insert(topic.id, self.topics.len());
        self.topics.push(topic.clone());
        topic
    }

    pub fn get(&self, id: &TopicId) -> Option<&Topic> {
        self.index.get(id).map(|&i| &self.topics[i])
    }

    pub fn contains(&self, id: &TopicId) -> bool {
        self.index.contains_key(id)
    }

    fn get_mut(&mut self, id: &TopicId) -> Result<&mut Topic, PodcastError> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.topics[i]),
            None => Err(PodcastError::NotFound(id.to_string())),
        }
    }

    /// Add `delta` to the topic's vote count.
    pub fn vote(&mut self, id: &TopicId, delta: i64) -> Result<Topic, PodcastError> {
        let topic = self.get_mut(id)?;
        topic.votes = topic.votes.saturating_add(delta);
        Ok(topic.clone())
    }

    pub fn react(&mut self, id: &TopicId, reaction: Reaction) -> Result<Topic, PodcastError> {
        let topic = self.get_mut(id)?;
        match reaction {
            Reaction::ThumbsUp => topic.thumbs_up += 1,
            Reaction::ThumbsDown => topic.thumbs_down += 1,
        }
        Ok(topic.clone())
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    /// Copies of all topics, highest score first. Ties keep submission order.
    pub fn list_sorted(&self, now: DateTime<Utc>) -> Vec<Topic> {
        let mut scored: Vec<(f64, &Topic)> = self
            .topics
            .iter()
            .map(|t| (t.score_at(&self.weights, now), t))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(_, t)| t.clone()).collect()
    }

    /// Highest scoring topic accepted by `eligible`. On equal scores the
    /// earliest submitted topic wins.
    pub fn top_where<F>(&self, now: DateTime<Utc>, eligible: F) -> Option<&Topic>
    where
        F: Fn(&Topic) -> bool,
    {
        let mut best: Option<(f64, &Topic)> = None;
        for topic in self.topics.iter().filter(|t| eligible(t)) {
            let score = topic.score_at(&self.weights, now);
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, topic)),
            }
        }
        best.map(|(_, t)| t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn topic_with(votes: i64, up: u64, down: u64) -> Topic {
        let mut topic = Topic::new("test", None);
        topic.votes = votes;
        topic.thumbs_up = up;
        topic.thumbs_down = down;
        topic
    }

    #[test]
    fn test_score_fresh_topic() {
        let topic = topic_with(3, 2, 1);
        let weights = ScoringWeights::default();
        // 3*1 + 2*5 - 1*3 = 10, no decay at age zero
        let score = topic.score_at(&weights, topic.created_at);
        assert!((score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_deterministic() {
        let topic = topic_with(7, 1, 4);
        let weights = ScoringWeights::default();
        let now = topic.created_at + Duration::seconds(600);
        assert_eq!(topic.score_at(&weights, now), topic.score_at(&weights, now));
    }

    #[test]
    fn test_recency_decays_linearly() {
        let topic = topic_with(10, 0, 0);
        let weights = ScoringWeights::default();
        let half_window = topic.created_at + Duration::seconds(900);
        assert!((topic.score_at(&weights, half_window) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_recency_floor() {
        let topic = topic_with(10, 0, 0);
        let weights = ScoringWeights::default();
        let day_later = topic.created_at + Duration::hours(24);
        assert!((topic.score_at(&weights, day_later) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_thumbs_down_sign_ignored() {
        let topic = topic_with(0, 0, 2);
        let negative = ScoringWeights::default();
        let positive = ScoringWeights {
            thumbs_down_weight: 3.0,
            ..ScoringWeights::default()
        };
        let now = topic.created_at;
        assert_eq!(topic.score_at(&negative, now), -6.0);
        assert_eq!(topic.score_at(&positive, now), -6.0);
    }

    #[test]
    fn test_positive_ratio() {
        assert_eq!(topic_with(0, 0, 0).positive_ratio(), 0.0);
        assert!((topic_with(0, 3, 1).positive_ratio() - 0.75).abs() < 1e-9);
        assert_eq!(topic_with(0, 0, 5).positive_ratio(), 0.0);
    }

    #[test]
    fn test_vote_and_react() {
        let mut registry = TopicRegistry::default();
        let topic = registry.create("Rust in space", Some("ferris".to_string()));

        registry.vote(&topic.id, 1).unwrap();
        registry.vote(&topic.id, -3).unwrap();
        let updated = registry.react(&topic.id, Reaction::ThumbsUp).unwrap();

        assert_eq!(updated.votes, -2);
        assert_eq!(updated.thumbs_up, 1);
        assert_eq!(registry.get(&topic.id).unwrap().votes, -2);
    }

    #[test]
    fn test_unknown_topic_is_not_found() {
        let mut registry = TopicRegistry::default();
        let err = registry.vote(&TopicId::new(), 1).unwrap_err();
        assert!(matches!(err, PodcastError::NotFound(_)));
    }

    #[test]
    fn test_list_sorted_descending_with_stable_ties() {
        let mut registry = TopicRegistry::default();
        let a = registry.create("a", None);
        let b = registry.create("b", None);
        let c = registry.create("c", None);
        registry.vote(&c.id, 5).unwrap();

        let now = Utc::now();
        let ids: Vec<TopicId> = registry.list_sorted(now).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);
    }

    #[test]
    fn test_top_where_prefers_first_on_tie() {
        let mut registry = TopicRegistry::default();
        let a = registry.create("a", None);
        let _b = registry.create("b", None);
        let top = registry.top_where(Utc::now(), |_| true).unwrap();
        assert_eq!(top.id, a.id);
    }

    #[test]
    fn test_reaction_parsing() {
        assert_eq!("👍".parse::<Reaction>().unwrap(), Reaction::ThumbsUp);
        assert_eq!("down".parse::<Reaction>().unwrap(), Reaction::ThumbsDown);
        assert!("🔥".parse::<Reaction>().is_err());
    }

    #[test]
    fn test_topic_id_parsing() {
        let id = TopicId::new();
        assert_eq!(id.to_string().parse::<TopicId>().unwrap(), id);
        assert!("not-an-id".parse::<TopicId>().is_err());
    }
}
