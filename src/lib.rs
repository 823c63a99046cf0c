//! Kinograph: Heterogeneous Video Knowledge Graph
//!
//! An engine that builds, maintains, and queries a knowledge graph of video
//! content, constructed incrementally from per-clip multimodal annotations.
//!
//! # Core Concepts
//!
//! - **Characters**: agents keyed by bracketed names (`<Alice>`)
//! - **Objects**: things keyed by plain names (`coffee`)
//! - **Low-level edges**: concrete actions/states bound to a clip and scene
//! - **High-level edges**: abstract attributes and relationships (clip 0)
//! - **Conversations**: timestamped dialogue spanning one or more clips
//!
//! # Example
//!
//! ```
//! use kinograph::VideoGraph;
//!
//! let graph = VideoGraph::new();
//! assert!(graph.get_character("<robot>").is_some());
//! ```

pub mod embedding;
mod graph;
pub mod llm;
pub mod search;
pub mod storage;
pub mod synthesis;

pub use embedding::{cosine_similarity, Embedder, EmbeddingError, EmbeddingService};
pub use graph::{
    format_node_natural, is_character_token, is_generic_character, normalize_character_name,
    strip_brackets, AppearanceMap, CharacterNode, Conversation, ConversationId, Edge, EdgeId,
    GraphError, GraphResult, Message, NodeToken, ObjectNode, VideoGraph,
    APPEARANCE_MERGE_THRESHOLD,
};
pub use llm::{LlmError, LlmReply, MockLlm, TextLlm};
pub use search::{
    search_with_strategy, Allocation, ConversationHit, SearchError, SearchStrategy,
    SpatialConstraint, WeightedTriple,
};
pub use storage::{GraphStore, OpenStore, SqliteStore, StorageError, StorageResult};
pub use synthesis::{AttributeClaim, ConversationDigest, RelationshipClaim, Synthesizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
