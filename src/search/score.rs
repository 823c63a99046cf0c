//! Scoring primitives: weighted, bidirectional triple-vs-edge similarity

use super::WeightedTriple;
use crate::embedding::{cosine_similarity, EmbeddingService};
use crate::graph::{is_character_token, strip_brackets, Edge, EdgeId, VideoGraph};

/// A query triple with its token embeddings resolved once per search.
pub(crate) struct PreparedTriple {
    pub triple: WeightedTriple,
    source_embedding: Option<Vec<f32>>,
    content_embedding: Option<Vec<f32>>,
    target_embedding: Option<Vec<f32>>,
}

/// Embed every non-wildcard token of every triple, once.
///
/// Character tokens embed their bracket-stripped form. Failed embeddings
/// stay `None`; scoring falls back to exact matching for those components.
pub(crate) fn prepare_triples(
    triples: &[WeightedTriple],
    embeddings: &EmbeddingService,
) -> Vec<PreparedTriple> {
    triples
        .iter()
        .map(|triple| PreparedTriple {
            source_embedding: triple
                .source
                .as_deref()
                .and_then(|t| embeddings.try_embed(strip_brackets(t))),
            content_embedding: triple
                .content
                .as_deref()
                .and_then(|t| embeddings.try_embed(t)),
            target_embedding: triple
                .target
                .as_deref()
                .and_then(|t| embeddings.try_embed(strip_brackets(t))),
            triple: triple.clone(),
        })
        .collect()
}

/// The stored embedding of an edge endpoint, from the node tables.
fn endpoint_embedding<'a>(graph: &'a VideoGraph, name: &str) -> Option<&'a [f32]> {
    if is_character_token(name) {
        graph.get_character(name)?.embedding.as_deref()
    } else {
        graph.get_object(name)?.embedding.as_deref()
    }
}

/// Similarity between a query token and an edge endpoint.
///
/// Characters match by exact name (1 or 0). Any pairing that involves an
/// object compares stored embeddings, scoring 0 when either side has none.
/// Wildcards and null endpoints score 0.
fn node_similarity(
    graph: &VideoGraph,
    query_token: Option<&str>,
    query_embedding: Option<&[f32]>,
    endpoint: Option<&str>,
) -> f64 {
    let (Some(token), Some(endpoint)) = (query_token, endpoint) else {
        return 0.0;
    };
    if token.is_empty() {
        return 0.0;
    }

    if is_character_token(token) && is_character_token(endpoint) {
        return if token == endpoint { 1.0 } else { 0.0 };
    }

    match (query_embedding, endpoint_embedding(graph, endpoint)) {
        (Some(q), Some(e)) => cosine_similarity(q, e),
        _ => 0.0,
    }
}

impl PreparedTriple {
    /// Score one edge against this triple.
    ///
    /// Content similarity is cosine over embeddings when both exist,
    /// weighted exact match otherwise. Endpoints are scored in both
    /// orientations and the better one wins.
    pub(crate) fn score_edge(&self, graph: &VideoGraph, edge: &Edge) -> f64 {
        let t = &self.triple;

        let content_sim = match t.content.as_deref() {
            None => 0.0,
            Some(content) => match (self.content_embedding.as_deref(), edge.embedding.as_deref()) {
                (Some(q), Some(e)) => cosine_similarity(q, e) * t.w_content,
                _ => {
                    if content == edge.content {
                        t.w_content
                    } else {
                        0.0
                    }
                }
            },
        };

        let source = t.source.as_deref();
        let target = t.target.as_deref();
        let source_embedding = self.source_embedding.as_deref();
        let target_embedding = self.target_embedding.as_deref();
        let edge_source = Some(edge.source.as_str());
        let edge_target = edge.target.as_deref();

        let forward = node_similarity(graph, source, source_embedding, edge_source) * t.w_source
            + node_similarity(graph, target, target_embedding, edge_target) * t.w_target;
        let reversed = node_similarity(graph, source, source_embedding, edge_target) * t.w_source
            + node_similarity(graph, target, target_embedding, edge_source) * t.w_target;

        content_sim + forward.max(reversed)
    }
}

/// Score an edge against the whole query: the strongest triple wins.
pub(crate) fn query_score(graph: &VideoGraph, prepared: &[PreparedTriple], edge: &Edge) -> f64 {
    prepared
        .iter()
        .map(|triple| triple.score_edge(graph, edge))
        .fold(0.0, f64::max)
}

/// Order candidates by score descending, ties broken by edge id ascending.
pub(crate) fn rank(mut scored: Vec<(f64, EdgeId)>, k: usize) -> Vec<EdgeId> {
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    scored.truncate(k);
    scored.into_iter().map(|(_, id)| id).collect()
}
