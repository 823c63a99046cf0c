//! The `Embedder` backend trait and the caching `EmbeddingService`

use crate::graph::strip_brackets;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedding model returned no results
    #[error("embedding backend returned no results")]
    EmptyResult,

    /// Backend unavailable or inference failed
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
}

/// Trait for embedding text into vectors.
///
/// Implementations handle model loading and inference, and must be
/// deterministic for identical inputs within a process. One vector per
/// input, in input order, all with the same dimension.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Caching front-end over an embedding backend.
///
/// The cache is process-wide and keyed by exact text, so repeated scoring of
/// the same string is a map lookup rather than a remote call. Vectors are
/// shared via `Arc`; `DashMap` gives per-bucket mutual exclusion for the
/// read-mostly workload.
pub struct EmbeddingService {
    backend: Box<dyn Embedder>,
    cache: DashMap<String, Arc<Vec<f32>>>,
}

impl EmbeddingService {
    /// Wrap a backend with an empty cache.
    pub fn new(backend: Box<dyn Embedder>) -> Self {
        Self {
            backend,
            cache: DashMap::new(),
        }
    }

    /// Embed a single text, consulting the cache first.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached.as_ref().clone());
        }
        let mut vectors = self.backend.embed_batch(&[text])?;
        let vector = vectors.pop().ok_or(EmbeddingError::EmptyResult)?;
        self.cache
            .insert(text.to_string(), Arc::new(vector.clone()));
        Ok(vector)
    }

    /// Embed many texts with one backend call for the cache misses.
    ///
    /// Returns one vector per input, in input order.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<usize> = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(*text) {
                Some(cached) => results.push(Some(cached.as_ref().clone())),
                None => {
                    results.push(None);
                    misses.push(i);
                }
            }
        }

        if !misses.is_empty() {
            debug!(total = texts.len(), misses = misses.len(), "embedding batch");
            let miss_texts: Vec<&str> = misses.iter().map(|&i| texts[i]).collect();
            let vectors = self.backend.embed_batch(&miss_texts)?;
            if vectors.len() != miss_texts.len() {
                return Err(EmbeddingError::Unavailable(format!(
                    "embedding count mismatch: expected {}, got {}",
                    miss_texts.len(),
                    vectors.len()
                )));
            }
            for (&i, vector) in misses.iter().zip(vectors) {
                self.cache
                    .insert(texts[i].to_string(), Arc::new(vector.clone()));
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Embed a text, degrading to `None` with a warning on failure.
    ///
    /// This is the recoverable path: a missing vector later falls back to
    /// exact string matching in the scorers.
    pub fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        match self.embed(text) {
            Ok(vector) => Some(vector),
            Err(err) => {
                warn!(%err, text, "embedding unavailable, storing null");
                None
            }
        }
    }

    /// Embed a character name with the bracket wrapper stripped.
    pub fn try_embed_character(&self, name: &str) -> Option<Vec<f32>> {
        self.try_embed(strip_brackets(name))
    }

    /// Number of cached texts.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("cached", &self.cache.len())
            .finish()
    }
}
