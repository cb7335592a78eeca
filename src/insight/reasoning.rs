//! External reasoning service abstraction.

use crate::config::ExtractionSettings;
use crate::error::{HarvestError, Result};
use crate::openai::create_client_with_timeout;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// A service that answers a prompt with text (expected to contain JSON).
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Send one system + user prompt pair and return the raw reply.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Chat-completions backed reasoning service.
pub struct OpenAIReasoningService {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIReasoningService {
    pub fn new(settings: &ExtractionSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_secs))?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl ReasoningService for OpenAIReasoningService {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, system, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| HarvestError::Reasoning(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| HarvestError::Reasoning(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| HarvestError::Reasoning(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| HarvestError::Reasoning(format!("Completion failed: {}", e)))?;

        let reply = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| HarvestError::Extraction("Empty response from model".to_string()))?;

        debug!(reply_chars = reply.len(), "Received completion");
        Ok(reply)
    }
}
