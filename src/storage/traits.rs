//! Storage trait definitions

use crate::graph::VideoGraph;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync) to support
/// concurrent access from multiple threads.
pub trait GraphStore: Send + Sync {
    /// Create or replace a named graph
    fn save_graph(&self, name: &str, graph: &VideoGraph) -> StorageResult<()>;

    /// Load a graph by name
    fn load_graph(&self, name: &str) -> StorageResult<Option<VideoGraph>>;

    /// Delete a graph and all its rows. Returns whether it existed.
    fn delete_graph(&self, name: &str) -> StorageResult<bool>;

    /// List all stored graph names
    fn list_graphs(&self) -> StorageResult<Vec<String>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
