//! Persistence: byte-stream snapshots and the SQLite-backed store

pub mod snapshot;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{GraphStore, OpenStore, StorageError, StorageResult};
