//! Low-level search: concrete actions and states with scene modulation

use super::score::{prepare_triples, query_score, rank};
use super::{SpatialConstraint, WeightedTriple};
use crate::embedding::{cosine_similarity, EmbeddingService};
use crate::graph::{EdgeId, VideoGraph};
use tracing::warn;

/// Rank low-level edges (`clip_id > 0`, scene set) against the query.
///
/// The base score follows the shared triple scoring; a spatial constraint
/// multiplies it by the cosine similarity between the constraint text and
/// the edge's scene. Candidates without a stored `scene_embedding` have
/// their scene embedded on the fly (the content cache makes repeats cheap).
pub fn search_low_level_edges(
    graph: &VideoGraph,
    embeddings: &EmbeddingService,
    triples: &[WeightedTriple],
    k: usize,
    spatial_constraint: Option<&SpatialConstraint>,
) -> Vec<EdgeId> {
    if k == 0 || triples.is_empty() {
        return Vec::new();
    }

    let constraint_embedding = match spatial_constraint {
        Some(constraint) => {
            let vector = embeddings.try_embed(&constraint.text);
            if vector.is_none() {
                warn!(constraint = %constraint.text, "constraint embedding unavailable, ignoring it");
            }
            vector
        }
        None => None,
    };

    let prepared = prepare_triples(triples, embeddings);
    let scored: Vec<(f64, EdgeId)> = graph
        .edges()
        .filter(|edge| edge.clip_id > 0 && edge.scene.is_some())
        .map(|edge| {
            let base = query_score(graph, &prepared, edge);
            let scene_sim = match &constraint_embedding {
                None => 1.0,
                Some(constraint) => {
                    let stored = edge.scene_embedding.clone().or_else(|| {
                        edge.scene.as_deref().and_then(|s| embeddings.try_embed(s))
                    });
                    match stored {
                        Some(scene) => cosine_similarity(constraint, &scene),
                        None => 0.0,
                    }
                }
            };
            (base * scene_sim, edge.id)
        })
        .collect();

    rank(scored, k)
}
