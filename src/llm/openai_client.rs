//! OpenAI-compatible chat client behind the `openai` feature

use super::{LlmError, LlmReply, TextLlm};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Text LLM backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiTextLlm {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTextLlm {
    /// Create a client for the given model, reading credentials from the
    /// environment (`OPENAI_API_KEY`).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    /// Create a client with explicit API configuration.
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextLlm for OpenAiTextLlm {
    async fn generate(&self, prompt: &str) -> Result<LlmReply, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessage::from(SYSTEM_PROMPT).into(),
                ChatCompletionRequestUserMessage::from(prompt).into(),
            ])
            .build()
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        let tokens = response
            .usage
            .as_ref()
            .map(|u| u.total_tokens)
            .unwrap_or_default();

        let text = response
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .next()
            .ok_or(LlmError::EmptyReply)?;

        Ok(LlmReply { text, tokens })
    }
}
