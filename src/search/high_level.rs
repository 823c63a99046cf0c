//! High-level search: abstract attributes and relationships

use super::score::{prepare_triples, query_score, rank};
use super::WeightedTriple;
use crate::embedding::EmbeddingService;
use crate::graph::{EdgeId, VideoGraph};

/// Weight of the confidence bonus relative to a full similarity point.
const CONFIDENCE_BONUS: f64 = 0.3;

/// Rank high-level edges (`clip_id == 0`) against the query triples.
///
/// Each edge scores as the best match over all triples, plus a bonus of
/// `confidence/100 * 0.3` when a confidence is present. Returns the top `k`
/// ids ordered by score descending, ties broken by edge id.
pub fn search_high_level_edges(
    graph: &VideoGraph,
    embeddings: &EmbeddingService,
    triples: &[WeightedTriple],
    k: usize,
) -> Vec<EdgeId> {
    if k == 0 || triples.is_empty() {
        return Vec::new();
    }

    let prepared = prepare_triples(triples, embeddings);
    let scored: Vec<(f64, EdgeId)> = graph
        .edges()
        .filter(|edge| edge.is_high_level())
        .map(|edge| {
            let mut score = query_score(graph, &prepared, edge);
            if let Some(confidence) = edge.confidence {
                score += confidence as f64 / 100.0 * CONFIDENCE_BONUS;
            }
            (score, edge.id)
        })
        .collect();

    rank(scored, k)
}
