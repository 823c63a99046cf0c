//! FastEmbed backend — local ONNX embeddings behind the `embeddings` feature

use super::service::{Embedder, EmbeddingError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// Production embedder backed by fastembed (ONNX Runtime).
///
/// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
/// method requires `&mut self`, while the `Embedder` trait uses `&self`.
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedEmbedder {
    /// Create a new FastEmbedEmbedder with a specific model.
    pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
        let options = InitOptions::new(model).with_show_download_progress(false);
        let embedding = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        Ok(Self {
            model: Mutex::new(embedding),
        })
    }

    /// Create a new FastEmbedEmbedder with the default model (nomic-embed-text-v1.5).
    pub fn default_model() -> Result<Self, EmbeddingError> {
        Self::new(EmbeddingModel::NomicEmbedTextV15)
    }
}

impl Embedder for FastEmbedEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::Unavailable("embedding model poisoned".to_string()))?;
        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        if embeddings.is_empty() {
            return Err(EmbeddingError::EmptyResult);
        }
        Ok(embeddings)
    }
}
