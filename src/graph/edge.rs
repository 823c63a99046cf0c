//! Edge representation for the video knowledge graph

use serde::{Deserialize, Serialize};

/// Unique identifier for an edge
///
/// Monotonically increasing per graph, assigned on insertion, never recycled.
/// Serializes as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl EdgeId {
    /// Get the inner integer value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge in the video knowledge graph
///
/// Two populations share this shape: low-level edges (`clip_id > 0`, scene
/// set) record concrete actions and states observed in a clip; high-level
/// edges (`clip_id == 0`, no scene) record abstract character attributes
/// (`target == None`) and relationships. Endpoints are node *names*, not
/// pointers, so renames rewrite them explicitly and the edge survives
/// snapshots unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier, 0 until the graph assigns one
    pub id: EdgeId,
    /// Clip the edge was observed in; 0 marks a high-level edge
    pub clip_id: u32,
    /// Source node name
    pub source: String,
    /// Target node name; `None` for intransitive actions and attributes
    pub target: Option<String>,
    /// Verb or relation text
    pub content: String,
    /// Scene descriptor of the clip; `None` for high-level edges
    pub scene: Option<String>,
    /// Confidence in [0, 100]; set on high-level edges
    pub confidence: Option<u8>,
    /// Embedding of `content`, assigned lazily
    pub embedding: Option<Vec<f32>>,
    /// Embedding of `scene`, assigned at ingestion
    pub scene_embedding: Option<Vec<f32>>,
}

impl Edge {
    /// Create a low-level edge for a clip.
    pub fn low_level(
        clip_id: u32,
        source: impl Into<String>,
        target: Option<String>,
        content: impl Into<String>,
        scene: impl Into<String>,
    ) -> Self {
        Self {
            id: EdgeId(0),
            clip_id,
            source: source.into(),
            target,
            content: content.into(),
            scene: Some(scene.into()),
            confidence: None,
            embedding: None,
            scene_embedding: None,
        }
    }

    /// Create a high-level (abstract) edge.
    pub fn high_level(
        source: impl Into<String>,
        target: Option<String>,
        content: impl Into<String>,
        confidence: u8,
    ) -> Self {
        Self {
            id: EdgeId(0),
            clip_id: 0,
            source: source.into(),
            target,
            content: content.into(),
            scene: None,
            confidence: Some(confidence.min(100)),
            embedding: None,
            scene_embedding: None,
        }
    }

    /// Attach a scene embedding (builder pattern)
    pub fn with_scene_embedding(mut self, embedding: Option<Vec<f32>>) -> Self {
        self.scene_embedding = embedding;
        self
    }

    /// True for high-level (abstract) edges.
    pub fn is_high_level(&self) -> bool {
        self.clip_id == 0
    }

    /// The `(source, content, target)` identity used for high-level dedup.
    pub fn triple_key(&self) -> (&str, &str, Option<&str>) {
        (&self.source, &self.content, self.target.as_deref())
    }
}
