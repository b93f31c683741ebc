//! OpenAI-compatible dialogue and comment generators.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::collaborators::{CommentGenerator, Dialogue, DialogueGenerator, DialogueRequest};
use crate::config::{ChatPersona, ModelsConfig};
use crate::error::PodcastError;
use crate::speaker::Speaker;

const DIALOGUE_SYSTEM_PROMPT: &str = "You are a skilled podcast dialogue writer. \
Create natural, engaging conversations between two hosts with different perspectives. \
Always respond with valid JSON.";

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
}

impl ApiConfig {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }
}

/// Thin chat-completion client shared by both generators.
#[derive(Clone)]
struct ChatClient {
    client: Client<OpenAIConfig>,
}

impl ChatClient {
    fn new(api: &ApiConfig) -> Result<Self, PodcastError> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PodcastError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let config = OpenAIConfig::new()
            .with_api_key(&api.api_key)
            .with_api_base(&api.api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
        })
    }

    /// One system + user completion, retried with exponential backoff.
    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, PodcastError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system.to_string().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: user.into(),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .max_completion_tokens(max_tokens)
            .temperature(temperature)
            .messages(messages)
            .build()?;

        let max_retries = 3;
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                // 2s, 4s
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    return Ok(response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default());
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "chat completion failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map(PodcastError::from).unwrap_or_else(|| {
            PodcastError::Generation("Unknown API error after retries".to_string())
        }))
    }
}

/// Writes both hosts' lines in one completion, screenplay style.
pub struct OpenAiDialogueGenerator {
    chat: ChatClient,
    model: String,
    max_tokens: u32,
}

impl OpenAiDialogueGenerator {
    pub fn new(api: &ApiConfig, models: &ModelsConfig) -> Result<Self, PodcastError> {
        Ok(Self {
            chat: ChatClient::new(api)?,
            model: models.content_model.clone(),
            max_tokens: models.dialogue_max_tokens,
        })
    }
}

#[async_trait]
impl DialogueGenerator for OpenAiDialogueGenerator {
    async fn generate(&self, request: &DialogueRequest) -> Result<Dialogue, PodcastError> {
        let prompt = build_dialogue_prompt(request);
        let raw = self
            .chat
            .complete(&self.model, DIALOGUE_SYSTEM_PROMPT, prompt, self.max_tokens, 0.8)
            .await?;
        debug!(raw = %raw, "dialogue completion");
        parse_dialogue(&raw)
    }
}

/// Short reactive comments in the voice of a chat persona.
pub struct OpenAiCommentGenerator {
    chat: ChatClient,
    model: String,
    max_tokens: u32,
}

impl OpenAiCommentGenerator {
    pub fn new(api: &ApiConfig, models: &ModelsConfig) -> Result<Self, PodcastError> {
        Ok(Self {
            chat: ChatClient::new(api)?,
            model: models.chat_model.clone(),
            max_tokens: models.comment_max_tokens,
        })
    }
}

#[async_trait]
impl CommentGenerator for OpenAiCommentGenerator {
    async fn generate(
        &self,
        topic: &str,
        recent_dialogue: &str,
        persona: &ChatPersona,
    ) -> Result<String, PodcastError> {
        let prompt = format!(
            r#"Current podcast topic: "{}"

Recent dialogue:
{}

Write a SHORT chat comment (10-20 words) reacting to what was just said.
Be authentic and conversational, and reference specific points.

Respond with ONLY the comment text, nothing else."#,
            topic, recent_dialogue
        );

        self.chat
            .complete(&self.model, &persona.system_prompt, prompt, self.max_tokens, 0.9)
            .await
    }
}

fn build_dialogue_prompt(request: &DialogueRequest) -> String {
    let mut prompt = format!(
        "Generate a podcast dialogue segment.\n\n\
         TOPIC: {}\n\n\
         CONTEXT: {}\n\n\
         EXCHANGE NUMBER: {}\n\n",
        request.topic, request.continuity_note, request.exchange
    );

    if request.exchange > 1 && (!request.last_alex.is_empty() || !request.last_mira.is_empty()) {
        prompt.push_str(&format!(
            "PREVIOUS EXCHANGE (for continuity):\n- Alex said: \"{}\"\n- Mira said: \"{}\"\n\n",
            request.last_alex, request.last_mira
        ));
    }

    prompt.push_str("SPEAKERS:\n");
    for (i, speaker) in Speaker::ORDER.iter().enumerate() {
        let persona = speaker.persona();
        prompt.push_str(&format!(
            "{}. {} ({})\n   - Personality: {}\n   - Style: {}\n",
            i + 1,
            speaker,
            persona.role,
            persona.traits,
            persona.style
        ));
    }

    prompt.push_str(
        r#"
REQUIREMENTS:
- Alex speaks first (2-3 sentences, max 100 words)
- Mira responds (2-3 sentences, max 100 words)
- Natural back-and-forth, clearly different but respectful perspectives
- Output ONLY spoken words, no stage directions or markdown

OUTPUT FORMAT (JSON only):
{"alex": "Alex's line", "mira": "Mira's response", "summary": "One sentence summary of this exchange"}
"#,
    );

    prompt
}

/// Parse the generator's JSON, tolerating a surrounding code fence.
fn parse_dialogue(raw: &str) -> Result<Dialogue, PodcastError> {
    let body = extract_json(raw);
    serde_json::from_str::<Dialogue>(body)
        .map_err(|e| PodcastError::Generation(format!("Malformed dialogue JSON: {}", e)))
}

fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[start + 3..];
    let body = after_fence.strip_prefix("json").unwrap_or(after_fence);
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(exchange: u32) -> DialogueRequest {
        DialogueRequest {
            topic: "Tidal power".to_string(),
            continuity_note: String::new(),
            exchange,
            last_alex: "Waves!".to_string(),
            last_mira: "Costs?".to_string(),
        }
    }

    #[test]
    fn test_parse_dialogue_plain_json() {
        let dialogue =
            parse_dialogue(r#"{"alex": "Hi", "mira": "Hello", "summary": "Greetings"}"#).unwrap();
        assert_eq!(dialogue.alex, "Hi");
        assert_eq!(dialogue.summary, "Greetings");
    }

    #[test]
    fn test_parse_dialogue_fenced_json() {
        let raw = "Sure!\n```json\n{\"alex\": \"A\", \"mira\": \"B\"}\n```";
        let dialogue = parse_dialogue(raw).unwrap();
        assert_eq!(dialogue.mira, "B");
        assert_eq!(dialogue.summary, "");
    }

    #[test]
    fn test_parse_dialogue_bare_fence() {
        let raw = "```\n{\"alex\": \"A\", \"mira\": \"B\", \"summary\": \"S\"}\n```";
        assert_eq!(parse_dialogue(raw).unwrap().alex, "A");
    }

    #[test]
    fn test_parse_dialogue_rejects_garbage() {
        let err = parse_dialogue("I'd rather not.").unwrap_err();
        assert!(matches!(err, PodcastError::Generation(_)));
    }

    #[test]
    fn test_prompt_includes_previous_lines_after_first_exchange() {
        assert!(!build_dialogue_prompt(&request(1)).contains("PREVIOUS EXCHANGE"));

        let prompt = build_dialogue_prompt(&request(2));
        assert!(prompt.contains("Alex said: \"Waves!\""));
        assert!(prompt.contains("Skeptical Pragmatist"));
    }
}
