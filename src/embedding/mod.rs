//! Embedding service: text → fixed-length vectors, with a process-wide cache
//!
//! Uses a trait-based embedding backend (`Embedder`) so production code can
//! use fastembed or an OpenAI-compatible endpoint while tests use
//! deterministic mocks. The service caches vectors by exact text so repeated
//! scoring of the same string never leaves the process.
//!
//! Failure policy: callers that can degrade treat a failed call as a missing
//! embedding (`None`); downstream scoring falls back to exact string match.

mod service;

#[cfg(feature = "embeddings")]
mod fastembed_backend;
#[cfg(feature = "openai")]
mod openai_backend;

pub use service::{Embedder, EmbeddingError, EmbeddingService};

#[cfg(test)]
pub(crate) use service::testutil;

#[cfg(feature = "embeddings")]
pub use fastembed_backend::FastEmbedEmbedder;
#[cfg(feature = "openai")]
pub use openai_backend::OpenAiEmbedder;

use tracing::warn;

/// Cosine similarity between two vectors.
///
/// Accumulates in f64. A zero-norm vector short-circuits to 0.0; a length
/// mismatch is logged and scored 0.0 rather than failing the search.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.len() != b.len() {
        warn!(
            left = a.len(),
            right = b.len(),
            "embedding dimension mismatch, scoring 0"
        );
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = x as f64;
        let y = y as f64;
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    dot / denom
}
