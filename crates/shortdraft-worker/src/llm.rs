//! Chat-completion client for the hook and script phases.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shortdraft_storage::parse_retry_after;
use tracing::debug;

use crate::config::OpenAiSettings;
use crate::error::{WorkerError, WorkerResult};
use crate::prompts::SYSTEM_PROMPT;

const SERVICE: &str = "openai";

/// A text-in, text-out language model.
///
/// Implementations make exactly one remote call per `complete`; callers
/// retry through [`crate::retry::invoke`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> WorkerResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI chat completions client.
pub struct OpenAiChatClient {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiChatClient {
    pub fn new(settings: OpenAiSettings) -> WorkerResult<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> WorkerResult<String> {
        let url = format!("{}/chat/completions", self.settings.base_url);
        let request = ChatRequest {
            model: &self.settings.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        debug!(model = %self.settings.chat_model, prompt_chars = prompt.len(), "Requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers()).map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::from_status(SERVICE, status.as_u16(), body, retry_after));
        }

        let chat: ChatResponse = response.json().await?;

        // No message reads as an empty payload
        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
