//! Synthetic audience chat.
//!
//! Runs beside the turn scheduler and reacts to the most recent turn with a
//! short batch of persona comments.

use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::CommentGenerator;
use crate::config::{ChatPersona, EngagementConfig};
use crate::events::PodcastEvent;
use crate::history::ChatMessage;
use crate::state::ShowState;

pub struct EngagementScheduler {
    state: Arc<ShowState>,
    comments: Arc<dyn CommentGenerator>,
    config: EngagementConfig,
    cancel: CancellationToken,
}

impl EngagementScheduler {
    pub fn new(
        state: Arc<ShowState>,
        comments: Arc<dyn CommentGenerator>,
        config: EngagementConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            comments,
            config,
            cancel,
        }
    }

    pub async fn run(self) {
        info!(personas = self.config.personas.len(), "engagement scheduler started");

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("engagement scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(self.config.startup_delay()) => {}
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("engagement scheduler stopped");
                    break;
                }
                _ = self.cycle() => {}
            }
        }
    }

    async fn cycle(&self) {
        let latest = if self.state.is_running() {
            self.state.latest_turn()
        } else {
            None
        };
        let Some(turn) = latest else {
            tokio::time::sleep(self.config.idle()).await;
            return;
        };

        let count = comment_count(self.state.turn_count());
        let (personas, skew) = {
            let mut rng = rand::thread_rng();
            let personas: Vec<ChatPersona> = self
                .config
                .personas
                .choose_multiple(&mut rng, count)
                .cloned()
                .collect();
            let skew = if self.config.jitter_secs > 0.0 {
                rng.gen_range(0.0..self.config.jitter_secs)
            } else {
                0.0
            };
            (personas, skew)
        };

        let dialogue = turn.dialogue_text();
        for persona in &personas {
            let text = match self
                .comments
                .generate(&turn.topic_text, &dialogue, persona)
                .await
            {
                Ok(text) => clean_comment(&text).unwrap_or_else(|| self.filler()),
                Err(e) => {
                    warn!(
                        persona = %persona.name,
                        error = %e,
                        "comment generation failed, using filler"
                    );
                    self.filler()
                }
            };

            let message = ChatMessage::synthetic(&persona.name, &persona.personality, text);
            debug!(persona = %persona.name, message = %message.message, "synthetic comment");
            self.state.add_chat_message(message.clone());
            self.state.publish(PodcastEvent::ChatMessage(message));

            tokio::time::sleep(self.config.comment_delay()).await;
        }

        tokio::time::sleep(self.config.interval_with_skew(skew)).await;
    }

    fn filler(&self) -> String {
        self.config
            .filler_comments
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Interesting discussion!".to_string())
    }
}

/// One comment after an even number of turns, two after an odd number.
pub fn comment_count(turn_count: u64) -> usize {
    if turn_count % 2 == 0 { 1 } else { 2 }
}

/// Trim whitespace and wrapping quotes. `None` when nothing is left.
fn clean_comment(text: &str) -> Option<String> {
    let cleaned = text.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
