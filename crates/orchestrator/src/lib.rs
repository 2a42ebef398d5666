use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use helpmate_config::{AppConfig, LlmConfig};

mod openai;
pub mod test_support;

pub use openai::OpenAiProvider;

const TITLE_PROMPT: &str = "Generate a short, concise title (5 words max) for a conversation that \
                           starts with this message. Return only the title with no quotes or \
                           additional text.";
const TITLE_MAX_TOKENS: u32 = 15;
const TITLE_TEMPERATURE: f32 = 0.3;
const FALLBACK_TITLE_CHARS: usize = 40;
pub const DEFAULT_CHAT_TITLE: &str = "New Conversation";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("missing LLM API key")]
    ApiKeyMissing,
    #[error("no completion provider configured")]
    ProviderMissing,
    #[error("provider http request failed: {0}")]
    ProviderHttp(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    ProviderStatus { status: u16, body: String },
    #[error("provider returned no completion choices")]
    EmptyCompletion,
    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// A chat-completions backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, OrchestratorError>;

    fn name(&self) -> &'static str;
}

pub struct Orchestrator {
    config: LlmConfig,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.llm.clone(),
            provider: None,
        }
    }

    /// Build the OpenAI-compatible provider from config, falling back to `OPENAI_API_KEY`.
    pub fn bootstrap(mut self) -> Result<Self, OrchestratorError> {
        let api_key_source = if self.config.api_key.is_some() {
            "config"
        } else {
            "env"
        };

        let api_key = self
            .config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or(OrchestratorError::ApiKeyMissing)?;

        debug!(source = api_key_source, "initialising OpenAI provider");
        let provider = OpenAiProvider::new(
            api_key,
            &self.config.base_url,
            std::time::Duration::from_secs(self.config.request_timeout_seconds),
        )?;

        info!(
            base_url = %self.config.base_url,
            chat_model = %self.config.chat_model,
            "completion provider initialised"
        );
        self.provider = Some(Arc::new(provider));
        Ok(self)
    }

    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Result<Arc<dyn LlmProvider>, OrchestratorError> {
        self.provider.clone().ok_or(OrchestratorError::ProviderMissing)
    }

    pub fn chat_model(&self) -> &str {
        &self.config.chat_model
    }

    pub fn title_model(&self) -> &str {
        &self.config.title_model
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Chat completion with the configured chat model and temperature.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> Result<String, OrchestratorError> {
        let provider = self.provider()?;
        let request = CompletionRequest {
            model: self.config.chat_model.clone(),
            messages,
            max_tokens,
            temperature: self.config.temperature,
        };

        let response = provider.complete(request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                provider = provider.name(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion finished"
            );
        }
        Ok(response.content)
    }

    /// Short title for a conversation. Never fails: falls back to the opening message.
    pub async fn generate_title(&self, first_message: &str) -> String {
        let fallback = fallback_title(first_message);
        let Ok(provider) = self.provider() else {
            return fallback;
        };

        let request = CompletionRequest {
            model: self.config.title_model.clone(),
            messages: vec![ChatMessage::system(TITLE_PROMPT), ChatMessage::user(first_message)],
            max_tokens: TITLE_MAX_TOKENS,
            temperature: TITLE_TEMPERATURE,
        };

        match provider.complete(request).await {
            Ok(response) => {
                let title = clean_title(&response.content);
                if title.is_empty() {
                    fallback
                } else {
                    title
                }
            }
            Err(error) => {
                warn!(%error, "title generation failed; using message prefix");
                fallback
            }
        }
    }

    /// Condense `material` into notes relevant to `question`, bounded by `max_tokens`.
    pub async fn summarize(
        &self,
        material: &str,
        question: &str,
        max_tokens: u32,
    ) -> Result<String, OrchestratorError> {
        let provider = self.provider()?;
        let instructions = "Summarize the following reference material for a customer support \
            assistant. Keep facts, prices, policies and contact details that could help answer \
            the customer's question. Reply with plain sentences only.";

        let request = CompletionRequest {
            model: self.config.title_model.clone(),
            messages: vec![
                ChatMessage::system(instructions),
                ChatMessage::user(format!(
                    "Customer question: {question}\n\nReference material:\n{material}"
                )),
            ],
            max_tokens,
            temperature: 0.2,
        };

        let response = provider.complete(request).await?;
        Ok(response.content.trim().to_string())
    }
}

fn clean_title(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect::<String>()
        .trim()
        .to_string()
}

fn fallback_title(message: &str) -> String {
    let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if message.is_empty() {
        return DEFAULT_CHAT_TITLE.to_string();
    }
    if message.chars().count() <= FALLBACK_TITLE_CHARS {
        return message;
    }

    let mut title = String::new();
    for word in message.split(' ') {
        if title.chars().count() + word.chars().count() + 1 > FALLBACK_TITLE_CHARS {
            break;
        }
        if !title.is_empty() {
            title.push(' ');
        }
        title.push_str(word);
    }
    if title.is_empty() {
        title = message.chars().take(FALLBACK_TITLE_CHARS).collect();
    }
    title.push_str("...");
    title
}
