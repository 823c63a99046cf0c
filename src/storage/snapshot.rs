//! Byte-stream snapshots of a graph
//!
//! The snapshot is serde-based and lossless: every node, edge, and
//! conversation round-trips with all scalar fields and embeddings,
//! including embeddings recorded as `null`. Adjacency indices are derived
//! state and are rebuilt on load rather than stored.

use super::traits::StorageResult;
use crate::graph::VideoGraph;

/// Serialize a graph to a self-contained byte stream.
pub fn to_bytes(graph: &VideoGraph) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(graph)?)
}

/// Restore a graph from a snapshot produced by [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> StorageResult<VideoGraph> {
    let mut graph: VideoGraph = serde_json::from_slice(bytes)?;
    graph.rebuild_indexes();
    Ok(graph)
}
