//! Reply generation through an OpenAI-compatible completion endpoint
//!
//! Any failure collapses into a fixed apology so the user always gets an
//! answer, even when the backend is unreachable.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::outcome::Degradable;
use crate::{Error, Result};

/// Default completion endpoint base
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "anthropic/claude-3-haiku";

/// Default system persona
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly health assistant. Respond in simple English with bullet points and emojis. Keep replies short and helpful.";

/// Reply sent when the backend fails
pub const APOLOGY: &str = "❌ I'm sorry, I couldn't process your message.";

/// A backend that answers a single user turn
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Produce a reply to `prompt`
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
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
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenRouter chat completions client
#[derive(Clone)]
pub struct OpenRouterBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: String,
}

impl OpenRouterBackend {
    /// Create a backend with default endpoint, model and persona
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Share an existing HTTP client
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Override the endpoint base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model identifier
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the system persona
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Reply(format!("completion endpoint error {status}: {body}")));
        }

        parse_completion(&body)
    }
}

/// Extract the first choice's content from a completion response body
///
/// # Errors
///
/// Returns error if the body is not JSON, has no choices, or the content is empty
pub fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::Reply("response has no message content".to_string()))
}

/// Generates pivot-language replies
#[derive(Clone)]
pub struct ReplyGenerator {
    backend: Arc<dyn CompletionBackend>,
}

impl ReplyGenerator {
    /// Create a generator over a backend
    #[must_use]
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Ask the backend for a reply, falling back to [`APOLOGY`]
    pub async fn generate_reply(&self, pivot_text: &str) -> Degradable<String> {
        match self.backend.complete(pivot_text).await {
            Ok(reply) => Degradable::succeeded(reply),
            Err(e) => {
                tracing::error!(error = %e, "completion backend failed");
                Degradable::degraded(APOLOGY.to_string(), e)
            }
        }
    }
}
