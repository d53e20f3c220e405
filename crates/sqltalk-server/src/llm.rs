//! OpenAI-compatible chat completion backend for the language-model gateway

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use sqltalk_core::{GatewayError, LanguageModel};
use std::time::Duration;

use crate::config::LlmConfig;

/// Chat completions over the OpenAI API or any server that speaks it
///
/// A failed call (including 429 and 5xx) is returned at once; nothing is
/// retried while the request holds its database session.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiModel {
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = &config.api_base {
            openai_config = openai_config.with_api_base(base);
        }

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry()),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    fn build_request(&self, system: &str, user: &str) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()?,
            ),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
    }
}

fn no_retry() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..Default::default()
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GatewayError> {
        let request = self
            .build_request(system, user)
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .filter(|content| !content.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)?;

        tracing::debug!(model = %self.model, "LLM response: {}", content);
        Ok(content.clone())
    }
}
