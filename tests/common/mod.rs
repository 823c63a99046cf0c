//! Shared fixtures for integration tests
//!
//! Each integration binary compiles its own copy, so not every helper is
//! used everywhere.
#![allow(dead_code)]

use kinograph::{Embedder, EmbeddingError, EmbeddingService};
use std::collections::HashMap;

/// Deterministic embedder for tests.
///
/// Registered texts return their fixed vectors; everything else hashes to a
/// stable pseudo-vector so any string is embeddable.
pub struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl StubEmbedder {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        let vectors: HashMap<String, Vec<f32>> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let dimension = vectors.values().next().map_or(4, Vec::len);
        Self { vectors, dimension }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    fn fallback(&self, text: &str) -> Vec<f32> {
        let mut hash = 0xcbf29ce484222325_u64;
        for byte in text.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (0..self.dimension)
            .map(|i| {
                let h = hash.rotate_left((i * 13) as u32);
                (h % 1000) as f32 / 1000.0 - 0.5
            })
            .collect()
    }
}

impl Embedder for StubEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(*t).cloned().unwrap_or_else(|| self.fallback(t)))
            .collect())
    }
}

/// An embedding service over a [`StubEmbedder`] with preregistered vectors.
pub fn embedding_service(entries: &[(&str, Vec<f32>)]) -> EmbeddingService {
    EmbeddingService::new(Box::new(StubEmbedder::new(entries)))
}

/// An embedding service where every text hashes to a stable vector.
pub fn plain_embedding_service() -> EmbeddingService {
    EmbeddingService::new(Box::new(StubEmbedder::empty()))
}

/// Quiet tracing for test output; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
