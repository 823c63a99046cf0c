//! SQLite storage backend
//!
//! One database holds any number of named graphs. Scalar fields live in
//! columns; vectors, clip lists, and messages are JSON blobs. Saving a
//! graph replaces its rows wholesale inside one transaction.

use super::traits::{GraphStore, OpenStore, StorageError, StorageResult};
use crate::graph::{
    CharacterNode, Conversation, ConversationId, Edge, EdgeId, Message, ObjectNode, VideoGraph,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed graph store
///
/// Thread-safe via an internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS graphs (
                name TEXT PRIMARY KEY,
                current_conversation INTEGER,
                next_node_id INTEGER NOT NULL,
                next_edge_id INTEGER NOT NULL,
                next_conversation_id INTEGER NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS characters (
                graph_name TEXT NOT NULL,
                name TEXT NOT NULL,
                node_id INTEGER NOT NULL,
                embedding_json TEXT,
                PRIMARY KEY (graph_name, name),
                FOREIGN KEY (graph_name) REFERENCES graphs(name) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS objects (
                graph_name TEXT NOT NULL,
                name TEXT NOT NULL,
                node_id INTEGER NOT NULL,
                embedding_json TEXT,
                PRIMARY KEY (graph_name, name),
                FOREIGN KEY (graph_name) REFERENCES graphs(name) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS edges (
                graph_name TEXT NOT NULL,
                id INTEGER NOT NULL,
                clip_id INTEGER NOT NULL,
                source TEXT NOT NULL,
                target TEXT,
                content TEXT NOT NULL,
                scene TEXT,
                confidence INTEGER,
                embedding_json TEXT,
                scene_embedding_json TEXT,
                PRIMARY KEY (graph_name, id),
                FOREIGN KEY (graph_name) REFERENCES graphs(name) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_edges_source
                ON edges(graph_name, source);
            CREATE INDEX IF NOT EXISTS idx_edges_target
                ON edges(graph_name, target);
            CREATE INDEX IF NOT EXISTS idx_edges_clip
                ON edges(graph_name, clip_id);

            CREATE TABLE IF NOT EXISTS conversations (
                graph_name TEXT NOT NULL,
                id INTEGER NOT NULL,
                clips_json TEXT NOT NULL,
                messages_json TEXT NOT NULL,
                summary TEXT,
                PRIMARY KEY (graph_name, id),
                FOREIGN KEY (graph_name) REFERENCES graphs(name) ON DELETE CASCADE
            );

            PRAGMA foreign_keys = ON;

            -- WAL allows concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

}

/// Serialize an optional vector as a JSON column value.
fn vector_to_json(vector: &Option<Vec<f32>>) -> StorageResult<Option<String>> {
    vector
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(StorageError::from))
        .transpose()
}

/// Parse an optional vector from its JSON column value.
fn vector_from_json(raw: Option<String>) -> StorageResult<Option<Vec<f32>>> {
    raw.map(|s| serde_json::from_str(&s).map_err(StorageError::from))
        .transpose()
}

impl GraphStore for SqliteStore {
    fn save_graph(&self, name: &str, graph: &VideoGraph) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Full rewrite: drop the old rows, then insert the current state.
        tx.execute("DELETE FROM graphs WHERE name = ?1", params![name])?;
        for table in ["characters", "objects", "edges", "conversations"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE graph_name = ?1"),
                params![name],
            )?;
        }

        let (next_node, next_edge, next_conversation) = graph.id_counters();
        tx.execute(
            "INSERT INTO graphs (name, current_conversation, next_node_id, next_edge_id,
                                 next_conversation_id, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                graph.current_conversation().map(|id| id.value() as i64),
                next_node as i64,
                next_edge as i64,
                next_conversation as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        for character in graph.characters() {
            tx.execute(
                "INSERT INTO characters (graph_name, name, node_id, embedding_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    name,
                    character.name,
                    character.id as i64,
                    vector_to_json(&character.embedding)?,
                ],
            )?;
        }

        for object in graph.objects() {
            tx.execute(
                "INSERT INTO objects (graph_name, name, node_id, embedding_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    name,
                    object.name,
                    object.id as i64,
                    vector_to_json(&object.embedding)?,
                ],
            )?;
        }

        for edge in graph.edges() {
            tx.execute(
                "INSERT INTO edges (graph_name, id, clip_id, source, target, content, scene,
                                    confidence, embedding_json, scene_embedding_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    name,
                    edge.id.value() as i64,
                    edge.clip_id,
                    edge.source,
                    edge.target,
                    edge.content,
                    edge.scene,
                    edge.confidence.map(|c| c as i64),
                    vector_to_json(&edge.embedding)?,
                    vector_to_json(&edge.scene_embedding)?,
                ],
            )?;
        }

        for conversation in graph.conversations() {
            tx.execute(
                "INSERT INTO conversations (graph_name, id, clips_json, messages_json, summary)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    conversation.id.value() as i64,
                    serde_json::to_string(&conversation.clips)?,
                    serde_json::to_string(&conversation.messages)?,
                    conversation.summary,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_graph(&self, name: &str) -> StorageResult<Option<VideoGraph>> {
        let conn = self.conn.lock().unwrap();

        let header: Option<(Option<i64>, i64, i64, i64)> = conn
            .query_row(
                "SELECT current_conversation, next_node_id, next_edge_id, next_conversation_id
                 FROM graphs WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((current, next_node, next_edge, next_conversation)) = header else {
            return Ok(None);
        };

        let mut characters: HashMap<String, CharacterNode> = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT name, node_id, embedding_json FROM characters WHERE graph_name = ?1",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        for row in rows {
            let (node_name, node_id, embedding) = row?;
            let mut node = CharacterNode::new(node_id as u64, &node_name);
            node.embedding = vector_from_json(embedding)?;
            characters.insert(node_name, node);
        }

        let mut objects: HashMap<String, ObjectNode> = HashMap::new();
        let mut stmt = conn
            .prepare("SELECT name, node_id, embedding_json FROM objects WHERE graph_name = ?1")?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        for row in rows {
            let (node_name, node_id, embedding) = row?;
            let mut node = ObjectNode::new(node_id as u64, node_name.clone());
            node.embedding = vector_from_json(embedding)?;
            objects.insert(node_name, node);
        }

        let mut edges: Vec<Edge> = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT id, clip_id, source, target, content, scene, confidence,
                    embedding_json, scene_embedding_json
             FROM edges WHERE graph_name = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<i64>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;
        for row in rows {
            let (id, clip_id, source, target, content, scene, confidence, embedding, scene_emb) =
                row?;
            edges.push(Edge {
                id: EdgeId(id as u64),
                clip_id,
                source,
                target,
                content,
                scene,
                confidence: confidence.map(|c| c as u8),
                embedding: vector_from_json(embedding)?,
                scene_embedding: vector_from_json(scene_emb)?,
            });
        }

        let mut conversations: Vec<Conversation> = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT id, clips_json, messages_json, summary
             FROM conversations WHERE graph_name = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        for row in rows {
            let (id, clips, messages, summary) = row?;
            let mut conversation = Conversation::new(ConversationId(id as u64), 0);
            conversation.clips = serde_json::from_str::<Vec<u32>>(&clips)?;
            conversation.messages = serde_json::from_str::<Vec<Message>>(&messages)?;
            conversation.summary = summary;
            conversations.push(conversation);
        }

        Ok(Some(VideoGraph::from_parts(
            characters,
            objects,
            edges,
            conversations,
            current.map(|id| ConversationId(id as u64)),
            (next_node as u64, next_edge as u64, next_conversation as u64),
        )))
    }

    fn delete_graph(&self, name: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        // Cascades are not guaranteed on older connections; delete explicitly.
        for table in ["characters", "objects", "edges", "conversations"] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE graph_name = ?1"),
                params![name],
            )?;
        }
        let deleted = conn.execute("DELETE FROM graphs WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    fn list_graphs(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT name FROM graphs ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
