//! Text LLM client seam
//!
//! Defines the client trait and reply type for the external text LLM. Two
//! implementations:
//! - `OpenAiTextLlm`: OpenAI-compatible chat completions (behind `openai`)
//! - `MockLlm`: returns scripted replies (testing)
//!
//! The engine never interprets token counts; it only passes reply text
//! through code-fence stripping and JSON parse/repair.

mod repair;

#[cfg(feature = "openai")]
mod openai_client;

pub use repair::{parse_json_with_repair, strip_code_fences};

#[cfg(feature = "openai")]
pub use openai_client::OpenAiTextLlm;

use async_trait::async_trait;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Errors from text LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm unavailable: {0}")]
    Unavailable(String),

    #[error("llm returned empty content")]
    EmptyReply,

    #[error("response parse error: {0}")]
    Parse(String),
}

/// A text reply plus the provider's token count.
#[derive(Debug, Clone)]
pub struct LlmReply {
    /// Raw reply text
    pub text: String,
    /// Tokens consumed by the call, when the provider reports them
    pub tokens: u32,
}

impl LlmReply {
    /// Build a reply with no token accounting.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens: 0,
        }
    }
}

/// Client trait for the external text LLM.
///
/// Abstracts over transport (HTTP, mock) so the synthesizer does not depend
/// on how the model is reached.
#[async_trait]
pub trait TextLlm: Send + Sync {
    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<LlmReply, LlmError>;
}

/// Generate with the standard one-shot retry: try, on failure retry once.
pub async fn generate_with_retry(llm: &dyn TextLlm, prompt: &str) -> Result<LlmReply, LlmError> {
    match llm.generate(prompt).await {
        Ok(reply) => Ok(reply),
        Err(err) => {
            warn!(%err, "llm call failed, retrying once");
            llm.generate(prompt).await
        }
    }
}

/// Mock client for testing — pops scripted replies in order.
pub struct MockLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
}

impl MockLlm {
    /// Create a mock with no scripted replies (every call fails).
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.replies
            .try_lock()
            .expect("mock configured before use")
            .push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.replies
            .try_lock()
            .expect("mock configured before use")
            .push_back(Err(LlmError::Unavailable(message.into())));
        self
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextLlm for MockLlm {
    async fn generate(&self, _prompt: &str) -> Result<LlmReply, LlmError> {
        match self.replies.lock().await.pop_front() {
            Some(Ok(text)) => Ok(LlmReply::text_only(text)),
            Some(Err(err)) => Err(err),
            None => Err(LlmError::Unavailable(
                "no scripted reply left in mock".to_string(),
            )),
        }
    }
}
