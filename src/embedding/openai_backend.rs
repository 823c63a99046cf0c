//! OpenAI-compatible embedding backend behind the `openai` feature
//!
//! Talks to any endpoint speaking the OpenAI embeddings API. The `Embedder`
//! trait is synchronous, so the async client is driven on the ambient tokio
//! runtime via `block_in_place`.

use super::service::{Embedder, EmbeddingError};
use async_openai::{
    config::OpenAIConfig, types::embeddings::CreateEmbeddingRequestArgs, Client,
};

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    /// Create a backend for the given model, reading credentials from the
    /// environment (`OPENAI_API_KEY`).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    /// Create a backend with explicit API configuration.
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.clone())
            .build()
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        // Sort by index so ordering matches input
        let mut data = response.data;
        data.sort_by_key(|e| e.index);

        if data.len() != texts.len() {
            return Err(EmbeddingError::Unavailable(format!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                data.len()
            )));
        }

        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        tokio::task::block_in_place(|| handle.block_on(self.request(owned)))
    }
}
