//! VideoGraph: the heterogeneous graph of video content
//!
//! Owns three node-free stores (characters, objects, conversations) and the
//! edge table, plus the adjacency indices derived from it. Mutation is
//! single-owner (`&mut self`); searches take `&self` and may run in
//! parallel once construction is done.
//!
//! Edges reference nodes by name string, not by pointer, so renames rewrite
//! them explicitly and edges survive snapshots unchanged.

use super::conversation::{Conversation, ConversationId, Message};
use super::edge::{Edge, EdgeId};
use super::node::{
    is_character_token, is_generic_character, normalize_character_name, CharacterNode, NodeToken,
    ObjectNode,
};
use crate::embedding::{cosine_similarity, EmbeddingService};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Character appearance descriptions keyed by bracketed name.
pub type AppearanceMap = HashMap<String, String>;

/// Minimum cosine similarity between appearance descriptions for a generic
/// character to be merged into a named one.
pub const APPEARANCE_MERGE_THRESHOLD: f64 = 0.85;

/// The distinguished character present in every graph from creation.
const ROBOT: &str = "<robot>";

/// Errors that can occur in graph mutations and queries
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("unknown character: {0}")]
    UnknownCharacter(String),

    #[error("unknown conversation: {0}")]
    UnknownConversation(ConversationId),

    #[error("rename source must be a generic character: {0}")]
    RenameNotAllowed(String),

    #[error("rename target already exists: {0}")]
    RenameCollision(String),

    #[error("invalid triple: {0}")]
    InvalidTriple(String),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// High-level dedup key: `(source, content, target)`.
type TripleKey = (String, String, Option<String>);

/// The heterogeneous knowledge graph of one video.
///
/// Node and edge ids increase monotonically and are never recycled. The
/// adjacency lists and the high-level dedup index are derived state,
/// rebuilt after deserialization rather than persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoGraph {
    characters: HashMap<String, CharacterNode>,
    objects: HashMap<String, ObjectNode>,
    edges: BTreeMap<EdgeId, Edge>,
    conversations: BTreeMap<ConversationId, Conversation>,
    current_conversation: Option<ConversationId>,
    next_node_id: u64,
    next_edge_id: u64,
    next_conversation_id: u64,

    /// node name → outgoing edge ids, in insertion order
    #[serde(skip)]
    adjacency_out: HashMap<String, Vec<EdgeId>>,
    /// target name → incoming edge ids; `None` is the intransitive sentinel
    #[serde(skip)]
    adjacency_in: HashMap<Option<String>, Vec<EdgeId>>,
    /// `(source, content, target)` → id, high-level edges only
    #[serde(skip)]
    high_level_index: HashMap<TripleKey, EdgeId>,
}

impl Default for VideoGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoGraph {
    /// Create an empty graph containing only `<robot>`.
    pub fn new() -> Self {
        let mut graph = Self {
            characters: HashMap::new(),
            objects: HashMap::new(),
            edges: BTreeMap::new(),
            conversations: BTreeMap::new(),
            current_conversation: None,
            next_node_id: 1,
            next_edge_id: 1,
            next_conversation_id: 1,
            adjacency_out: HashMap::new(),
            adjacency_in: HashMap::new(),
            high_level_index: HashMap::new(),
        };
        graph.add_character(ROBOT);
        graph
    }

    fn alloc_node_id(&mut self) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn alloc_edge_id(&mut self) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        id
    }

    fn alloc_conversation_id(&mut self) -> ConversationId {
        let id = ConversationId(self.next_conversation_id);
        self.next_conversation_id += 1;
        id
    }

    // --------------------------------------------------------
    // Node API
    // --------------------------------------------------------

    /// Add a character, normalizing the name to bracketed form.
    ///
    /// Idempotent: an existing character is left untouched. Returns the
    /// stored (bracketed) name.
    pub fn add_character(&mut self, name: &str) -> String {
        let key = normalize_character_name(name);
        if !self.characters.contains_key(&key) {
            let id = self.alloc_node_id();
            self.characters
                .insert(key.clone(), CharacterNode::new(id, &key));
        }
        key
    }

    /// Get a character by name (brackets optional).
    pub fn get_character(&self, name: &str) -> Option<&CharacterNode> {
        self.characters.get(&normalize_character_name(name))
    }

    /// Get an object by its plain name.
    pub fn get_object(&self, name: &str) -> Option<&ObjectNode> {
        self.objects.get(name)
    }

    /// Get or create an object node, returning its key.
    fn get_or_create_object(&mut self, name: &str) -> String {
        if !self.objects.contains_key(name) {
            let id = self.alloc_node_id();
            self.objects
                .insert(name.to_string(), ObjectNode::new(id, name));
        }
        name.to_string()
    }

    /// True when the token resolves to an existing node of its kind.
    pub fn has_node(&self, token: &str) -> bool {
        let token = NodeToken::parse(token);
        if token.is_character() {
            self.characters.contains_key(token.key())
        } else {
            self.objects.contains_key(token.key())
        }
    }

    /// All characters, unordered.
    pub fn characters(&self) -> impl Iterator<Item = &CharacterNode> {
        self.characters.values()
    }

    /// All objects, unordered.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectNode> {
        self.objects.values()
    }

    /// Number of characters (including `<robot>`).
    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Number of objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Rename a generic character and rewrite every reference to it.
    ///
    /// Only placeholder names of the form `<character_N>` may be renamed;
    /// the operation is atomic in effect — on error, nothing changed.
    pub fn rename_character(&mut self, old: &str, new: &str) -> GraphResult<()> {
        let old_key = normalize_character_name(old);
        let new_key = normalize_character_name(new);

        if !is_generic_character(&old_key) {
            return Err(GraphError::RenameNotAllowed(old_key));
        }
        if !self.characters.contains_key(&old_key) {
            return Err(GraphError::UnknownCharacter(old_key));
        }
        if new_key != old_key && self.characters.contains_key(&new_key) {
            return Err(GraphError::RenameCollision(new_key));
        }
        if new_key == old_key {
            return Ok(());
        }

        // Move the node under the new key. The name embedding is stale now.
        if let Some(mut node) = self.characters.remove(&old_key) {
            node.name = new_key.clone();
            node.embedding = None;
            self.characters.insert(new_key.clone(), node);
        }

        // Rewrite edges reachable through the adjacency lists under the old key.
        let mut touched: BTreeSet<EdgeId> = BTreeSet::new();
        if let Some(ids) = self.adjacency_out.get(&old_key) {
            touched.extend(ids.iter().copied());
        }
        if let Some(ids) = self.adjacency_in.get(&Some(old_key.clone())) {
            touched.extend(ids.iter().copied());
        }
        for id in touched {
            if let Some(edge) = self.edges.get_mut(&id) {
                if edge.is_high_level() {
                    self.high_level_index.remove(&owned_triple_key(edge));
                }
                if edge.source == old_key {
                    edge.source = new_key.clone();
                }
                if edge.target.as_deref() == Some(old_key.as_str()) {
                    edge.target = Some(new_key.clone());
                }
                if edge.is_high_level() {
                    self.high_level_index.insert(owned_triple_key(edge), id);
                }
            }
        }

        // Move the adjacency lists themselves.
        if let Some(ids) = self.adjacency_out.remove(&old_key) {
            self.adjacency_out
                .entry(new_key.clone())
                .or_default()
                .extend(ids);
        }
        if let Some(ids) = self.adjacency_in.remove(&Some(old_key.clone())) {
            self.adjacency_in
                .entry(Some(new_key.clone()))
                .or_default()
                .extend(ids);
        }

        debug!(from = %old_key, to = %new_key, "renamed character");
        Ok(())
    }

    // --------------------------------------------------------
    // Edge API
    // --------------------------------------------------------

    /// Add an edge, validating both endpoints exist.
    ///
    /// Assigns the edge id and updates both adjacency lists. A `None`
    /// target is always valid (intransitive action or attribute).
    pub fn add_edge(&mut self, mut edge: Edge) -> GraphResult<EdgeId> {
        if !self.has_node(&edge.source) {
            return Err(GraphError::UnknownEndpoint(edge.source.clone()));
        }
        if let Some(target) = &edge.target {
            if !self.has_node(target) {
                return Err(GraphError::UnknownEndpoint(target.clone()));
            }
        }

        let id = self.alloc_edge_id();
        edge.id = id;
        self.adjacency_out
            .entry(edge.source.clone())
            .or_default()
            .push(id);
        self.adjacency_in
            .entry(edge.target.clone())
            .or_default()
            .push(id);
        if edge.is_high_level() {
            self.high_level_index.insert(owned_triple_key(&edge), id);
        }
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Add or reconcile a high-level edge.
    ///
    /// High-level edges are unique per `(source, content, target)`; the
    /// stored confidence is the maximum ever asserted. Returns the edge id
    /// when the graph changed, `None` when the call was a no-op.
    pub fn add_high_level_edge(
        &mut self,
        source: &str,
        content: &str,
        target: Option<&str>,
        confidence: u8,
    ) -> GraphResult<Option<EdgeId>> {
        let key: TripleKey = (
            source.to_string(),
            content.to_string(),
            target.map(str::to_string),
        );
        if let Some(&id) = self.high_level_index.get(&key) {
            if let Some(edge) = self.edges.get_mut(&id) {
                if confidence > edge.confidence.unwrap_or(0) {
                    edge.confidence = Some(confidence.min(100));
                    return Ok(Some(id));
                }
            }
            return Ok(None);
        }

        let edge = Edge::high_level(source, target.map(str::to_string), content, confidence);
        self.add_edge(edge).map(Some)
    }

    /// Get an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// All edges in id (insertion) order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edge ids where the node is the source.
    pub fn edges_from(&self, node: &str) -> HashSet<EdgeId> {
        self.adjacency_out
            .get(node)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Edge ids where the node is the target.
    pub fn edges_to(&self, node: &str) -> HashSet<EdgeId> {
        self.adjacency_in
            .get(&Some(node.to_string()))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Edge ids touching the node in either direction.
    pub fn edges_of(&self, node: &str) -> HashSet<EdgeId> {
        let mut ids = self.edges_from(node);
        ids.extend(self.edges_to(node));
        ids
    }

    /// Number of edges touching the node (out-degree + in-degree).
    pub fn degree(&self, node: &str) -> usize {
        let out = self.adjacency_out.get(node).map_or(0, Vec::len);
        let inn = self
            .adjacency_in
            .get(&Some(node.to_string()))
            .map_or(0, Vec::len);
        out + inn
    }

    /// Degree of every node that appears in an adjacency list.
    pub fn node_degrees(&self) -> HashMap<String, usize> {
        let mut degrees: HashMap<String, usize> = HashMap::new();
        for (node, ids) in &self.adjacency_out {
            *degrees.entry(node.clone()).or_default() += ids.len();
        }
        for (node, ids) in &self.adjacency_in {
            if let Some(node) = node {
                *degrees.entry(node.clone()).or_default() += ids.len();
            }
        }
        degrees
    }

    /// Names of all nodes adjacent to the given node.
    pub fn get_neighbors(&self, node: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        if let Some(ids) = self.adjacency_out.get(node) {
            for id in ids {
                if let Some(target) = self.edges.get(id).and_then(|e| e.target.clone()) {
                    result.insert(target);
                }
            }
        }
        if let Some(ids) = self.adjacency_in.get(&Some(node.to_string())) {
            for id in ids {
                if let Some(edge) = self.edges.get(id) {
                    result.insert(edge.source.clone());
                }
            }
        }
        result
    }

    /// Delete an edge, unlinking it from both adjacency lists.
    pub fn delete_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.remove(&id) else {
            return;
        };
        if let Some(ids) = self.adjacency_out.get_mut(&edge.source) {
            ids.retain(|&eid| eid != id);
        }
        if let Some(ids) = self.adjacency_in.get_mut(&edge.target) {
            ids.retain(|&eid| eid != id);
        }
        if edge.is_high_level() {
            self.high_level_index.remove(&owned_triple_key(&edge));
        }
    }

    // --------------------------------------------------------
    // Triple ingestion
    // --------------------------------------------------------

    /// Insert per-clip triples `[source, content, target]` as low-level edges.
    ///
    /// Characters are denoted `<X>`; everything else is an object, created
    /// on first reference. Unknown characters go through appearance-based
    /// merging when an appearance map is supplied, otherwise they are
    /// created. Duplicate triples within the batch and malformed entries are
    /// skipped; a bad triple never aborts the batch. Returns the number of
    /// edges inserted.
    pub fn insert_triples(
        &mut self,
        triples: &[serde_json::Value],
        clip_id: u32,
        scene: &str,
        embeddings: &EmbeddingService,
        mut appearance: Option<&mut AppearanceMap>,
    ) -> usize {
        if triples.is_empty() {
            return 0;
        }

        let scene_embedding = embeddings.try_embed(scene);
        let mut seen: HashSet<TripleKey> = HashSet::new();
        let mut inserted = 0;

        for value in triples {
            let parsed = match parse_triple(value) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%err, "skipping malformed triple");
                    continue;
                }
            };

            let source = self.resolve_endpoint(&parsed.source, embeddings, appearance.as_deref_mut());
            let target = parsed
                .target
                .as_deref()
                .map(|raw| self.resolve_endpoint(raw, embeddings, appearance.as_deref_mut()));

            let key: TripleKey = (source.clone(), parsed.content.clone(), target.clone());
            if !seen.insert(key) {
                continue;
            }

            let edge = Edge::low_level(clip_id, source, target, parsed.content.clone(), scene)
                .with_scene_embedding(scene_embedding.clone());
            match self.add_edge(edge) {
                Ok(_) => inserted += 1,
                Err(err) => warn!(%err, "skipping triple"),
            }
        }

        inserted
    }

    /// Resolve a raw endpoint token to a node key, creating nodes as needed.
    ///
    /// Legacy `@owner`/`#attribute` affixes are normalized away: object
    /// identity is the plain base name.
    fn resolve_endpoint(
        &mut self,
        raw: &str,
        embeddings: &EmbeddingService,
        appearance: Option<&mut AppearanceMap>,
    ) -> String {
        let token = NodeToken::parse(raw);
        if token.is_character() {
            let name = token.key().to_string();
            if self.characters.contains_key(&name) {
                return name;
            }
            if let Some(map) = appearance {
                if self.try_appearance_merge(&name, embeddings, map) {
                    return name;
                }
            }
            self.add_character(&name)
        } else {
            self.get_or_create_object(token.key())
        }
    }

    /// Try to merge a newly mentioned character into an existing generic one
    /// by appearance similarity.
    ///
    /// Compares the embedding of `appearance[name]` against the appearance
    /// descriptions of every generic `<character_N>` still in the graph. On
    /// a match at or above [`APPEARANCE_MERGE_THRESHOLD`] the generic
    /// character is renamed to `name` and its appearance entry removed.
    fn try_appearance_merge(
        &mut self,
        name: &str,
        embeddings: &EmbeddingService,
        appearance: &mut AppearanceMap,
    ) -> bool {
        let Some(description) = appearance.get(name) else {
            return false;
        };
        let Some(query) = embeddings.try_embed(description) else {
            return false;
        };

        let mut best: Option<(String, f64)> = None;
        for (candidate, candidate_description) in appearance.iter() {
            if !is_generic_character(candidate) || !self.characters.contains_key(candidate) {
                continue;
            }
            let Some(vector) = embeddings.try_embed(candidate_description) else {
                continue;
            };
            let similarity = cosine_similarity(&query, &vector);
            if best.as_ref().map_or(true, |(_, b)| similarity > *b) {
                best = Some((candidate.clone(), similarity));
            }
        }

        let Some((generic, similarity)) = best else {
            return false;
        };
        if similarity < APPEARANCE_MERGE_THRESHOLD {
            return false;
        }

        match self.rename_character(&generic, name) {
            Ok(()) => {
                appearance.remove(&generic);
                debug!(%generic, %name, similarity, "merged character by appearance");
                true
            }
            Err(err) => {
                warn!(%err, %generic, %name, "appearance merge rename failed");
                false
            }
        }
    }

    /// Turn accumulated appearance descriptions into high-level attribute
    /// edges at confidence 100.
    ///
    /// Each description is split at commas; every non-empty feature becomes
    /// one `(character, feature, null)` edge under high-level dedup.
    /// Returns the number of edges added or updated.
    pub fn insert_character_appearances(&mut self, appearance: &AppearanceMap) -> usize {
        let mut entries: Vec<(&String, &String)> = appearance.iter().collect();
        entries.sort();

        let mut changed = 0;
        for (name, description) in entries {
            let key = self.add_character(name);
            for feature in description.split(',') {
                let feature = feature.trim();
                if feature.is_empty() {
                    continue;
                }
                match self.add_high_level_edge(&key, feature, None, 100) {
                    Ok(Some(_)) => changed += 1,
                    Ok(None) => {}
                    Err(err) => warn!(%err, character = %key, "skipping appearance feature"),
                }
            }
        }
        changed
    }

    // --------------------------------------------------------
    // Conversation API
    // --------------------------------------------------------

    /// Append dialogue for a clip, continuing or opening a conversation.
    ///
    /// With `is_continuation` set and a live active conversation, messages
    /// are appended (deduplicated by `(speaker, content)`) and the clip is
    /// recorded; otherwise a new conversation becomes active. Message
    /// embeddings are computed on the displayed `"Speaker: content"` form.
    /// Empty input is a no-op.
    pub fn update_conversation(
        &mut self,
        clip_id: u32,
        messages: &[(String, String)],
        is_continuation: bool,
        embeddings: &EmbeddingService,
    ) -> Option<ConversationId> {
        if messages.is_empty() {
            return None;
        }

        let target = if is_continuation {
            self.current_conversation
                .filter(|id| self.conversations.contains_key(id))
        } else {
            None
        };

        let id = match target {
            Some(id) => id,
            None => {
                let id = self.alloc_conversation_id();
                self.conversations.insert(id, Conversation::new(id, clip_id));
                self.current_conversation = Some(id);
                id
            }
        };

        // Embed only messages that will actually be appended.
        let mut pending: Vec<Message> = Vec::new();
        if let Some(conversation) = self.conversations.get(&id) {
            let mut taken: HashSet<(&str, &str)> = conversation
                .messages
                .iter()
                .map(|m| (m.speaker.as_str(), m.content.as_str()))
                .collect();
            for (speaker, content) in messages {
                if !taken.insert((speaker.as_str(), content.as_str())) {
                    continue;
                }
                let mut message = Message {
                    speaker: speaker.clone(),
                    content: content.clone(),
                    clip_id,
                    embedding: None,
                };
                message.embedding = embeddings.try_embed(&message.displayed());
                pending.push(message);
            }
        }

        if let Some(conversation) = self.conversations.get_mut(&id) {
            for message in pending {
                conversation.push_message(message);
            }
            conversation.add_clip(clip_id);
        }

        Some(id)
    }

    /// Get a conversation by id.
    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    /// All conversations in id order.
    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    /// The conversation currently accepting continuations, if any.
    pub fn current_conversation(&self) -> Option<ConversationId> {
        self.current_conversation
    }

    /// Set a conversation's summary.
    pub fn set_conversation_summary(
        &mut self,
        id: ConversationId,
        summary: impl Into<String>,
    ) -> GraphResult<()> {
        let conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(GraphError::UnknownConversation(id))?;
        conversation.summary = Some(summary.into());
        Ok(())
    }

    // --------------------------------------------------------
    // Connectivity
    // --------------------------------------------------------

    /// Edges relating two characters: direct edges between them, plus pairs
    /// of edges meeting at a shared object within a temporal window of
    /// `|Δclip_id| < 4`.
    ///
    /// Both characters must exist. The result is deduplicated by edge id
    /// and returned in id order.
    pub fn connected_edges(&self, c1: &str, c2: &str) -> GraphResult<Vec<EdgeId>> {
        let c1 = normalize_character_name(c1);
        let c2 = normalize_character_name(c2);
        if !self.characters.contains_key(&c1) {
            return Err(GraphError::UnknownCharacter(c1));
        }
        if !self.characters.contains_key(&c2) {
            return Err(GraphError::UnknownCharacter(c2));
        }

        let mut result: BTreeSet<EdgeId> = BTreeSet::new();

        for id in self.edges_of(&c1) {
            let Some(edge) = self.edges.get(&id) else {
                continue;
            };

            // Direct: both endpoints are the two characters.
            if edge_touches(edge, &c1) && edge_touches(edge, &c2) {
                result.insert(id);
                continue;
            }

            // Indirect: c1 — object — c2, close in time.
            let Some(object) = other_object_endpoint(edge, &c1) else {
                continue;
            };
            for id2 in self.edges_of(object) {
                let Some(other) = self.edges.get(&id2) else {
                    continue;
                };
                if !edge_touches(other, &c2) {
                    continue;
                }
                let gap = (edge.clip_id as i64 - other.clip_id as i64).abs();
                if gap < 4 {
                    result.insert(id);
                    result.insert(id2);
                }
            }
        }

        Ok(result.into_iter().collect())
    }

    // --------------------------------------------------------
    // Embedding backfill
    // --------------------------------------------------------

    /// Assign embeddings to nodes still missing them, one batch per kind.
    ///
    /// Characters embed their plain name (brackets stripped), objects their
    /// name verbatim. A backend failure leaves the vectors `None`.
    pub fn populate_node_embeddings(&mut self, embeddings: &EmbeddingService) {
        let mut pending_characters: Vec<String> = self
            .characters
            .values()
            .filter(|c| c.embedding.is_none())
            .map(|c| c.name.clone())
            .collect();
        pending_characters.sort();

        if !pending_characters.is_empty() {
            let texts: Vec<&str> = pending_characters
                .iter()
                .map(|n| super::node::strip_brackets(n))
                .collect();
            match embeddings.embed_batch(&texts) {
                Ok(vectors) => {
                    for (name, vector) in pending_characters.iter().zip(vectors) {
                        if let Some(node) = self.characters.get_mut(name) {
                            node.embedding = Some(vector);
                        }
                    }
                }
                Err(err) => warn!(%err, "character embedding batch failed"),
            }
        }

        let mut pending_objects: Vec<String> = self
            .objects
            .values()
            .filter(|o| o.embedding.is_none())
            .map(|o| o.name.clone())
            .collect();
        pending_objects.sort();

        if !pending_objects.is_empty() {
            let texts: Vec<&str> = pending_objects.iter().map(String::as_str).collect();
            match embeddings.embed_batch(&texts) {
                Ok(vectors) => {
                    for (name, vector) in pending_objects.iter().zip(vectors) {
                        if let Some(node) = self.objects.get_mut(name) {
                            node.embedding = Some(vector);
                        }
                    }
                }
                Err(err) => warn!(%err, "object embedding batch failed"),
            }
        }
    }

    /// Assign content embeddings to edges still missing them, in one batch.
    pub fn populate_edge_embeddings(&mut self, embeddings: &EmbeddingService) {
        let pending: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.embedding.is_none())
            .map(|e| e.id)
            .collect();
        if pending.is_empty() {
            return;
        }

        let contents: Vec<String> = pending
            .iter()
            .filter_map(|id| self.edges.get(id).map(|e| e.content.clone()))
            .collect();
        let texts: Vec<&str> = contents.iter().map(String::as_str).collect();
        match embeddings.embed_batch(&texts) {
            Ok(vectors) => {
                for (id, vector) in pending.iter().zip(vectors) {
                    if let Some(edge) = self.edges.get_mut(id) {
                        edge.embedding = Some(vector);
                    }
                }
            }
            Err(err) => warn!(%err, "edge embedding batch failed"),
        }
    }

    // --------------------------------------------------------
    // Storage support
    // --------------------------------------------------------

    /// The monotonic id counters `(node, edge, conversation)`.
    pub(crate) fn id_counters(&self) -> (u64, u64, u64) {
        (
            self.next_node_id,
            self.next_edge_id,
            self.next_conversation_id,
        )
    }

    /// Assemble a graph from loaded rows and rebuild the derived indexes.
    pub(crate) fn from_parts(
        characters: HashMap<String, CharacterNode>,
        objects: HashMap<String, ObjectNode>,
        edges: Vec<Edge>,
        conversations: Vec<Conversation>,
        current_conversation: Option<ConversationId>,
        counters: (u64, u64, u64),
    ) -> Self {
        let mut graph = Self {
            characters,
            objects,
            edges: edges.into_iter().map(|e| (e.id, e)).collect(),
            conversations: conversations.into_iter().map(|c| (c.id, c)).collect(),
            current_conversation,
            next_node_id: counters.0,
            next_edge_id: counters.1,
            next_conversation_id: counters.2,
            adjacency_out: HashMap::new(),
            adjacency_in: HashMap::new(),
            high_level_index: HashMap::new(),
        };
        graph.rebuild_indexes();
        graph
    }

    // --------------------------------------------------------
    // Derived state
    // --------------------------------------------------------

    /// Rebuild the adjacency lists and the high-level dedup index from the
    /// edge table. Called after deserialization.
    pub fn rebuild_indexes(&mut self) {
        self.adjacency_out.clear();
        self.adjacency_in.clear();
        self.high_level_index.clear();
        for (&id, edge) in &self.edges {
            self.adjacency_out
                .entry(edge.source.clone())
                .or_default()
                .push(id);
            self.adjacency_in
                .entry(edge.target.clone())
                .or_default()
                .push(id);
            if edge.is_high_level() {
                self.high_level_index.insert(owned_triple_key(edge), id);
            }
        }
    }

    /// Check the structural invariants; panics with a description on
    /// violation. Test-only.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        for edge in self.edges.values() {
            assert!(
                self.has_node(&edge.source),
                "edge {} source {} has no node",
                edge.id,
                edge.source
            );
            if let Some(target) = &edge.target {
                assert!(
                    self.has_node(target),
                    "edge {} target {} has no node",
                    edge.id,
                    target
                );
            }
            let out = self.adjacency_out.get(&edge.source).expect("out list");
            assert_eq!(
                out.iter().filter(|&&id| id == edge.id).count(),
                1,
                "edge {} must appear exactly once in adjacency_out",
                edge.id
            );
            let inn = self.adjacency_in.get(&edge.target).expect("in list");
            assert_eq!(
                inn.iter().filter(|&&id| id == edge.id).count(),
                1,
                "edge {} must appear exactly once in adjacency_in",
                edge.id
            );
            if edge.is_high_level() {
                assert!(edge.scene.is_none(), "high-level edge {} has a scene", edge.id);
            } else {
                assert!(edge.scene.is_some(), "low-level edge {} has no scene", edge.id);
            }
        }

        let mut triples = HashSet::new();
        for edge in self.edges.values().filter(|e| e.is_high_level()) {
            assert!(
                triples.insert(owned_triple_key(edge)),
                "duplicate high-level triple {:?}",
                edge.triple_key()
            );
        }
    }
}

/// The owned form of an edge's high-level dedup key.
fn owned_triple_key(edge: &Edge) -> TripleKey {
    (
        edge.source.clone(),
        edge.content.clone(),
        edge.target.clone(),
    )
}

/// True when the edge has the character as either endpoint.
fn edge_touches(edge: &Edge, character: &str) -> bool {
    edge.source == character || edge.target.as_deref() == Some(character)
}

/// The edge's other endpoint, when the edge touches `character` and the
/// other endpoint is an object.
fn other_object_endpoint<'a>(edge: &'a Edge, character: &str) -> Option<&'a str> {
    let other = if edge.source == character {
        edge.target.as_deref()?
    } else if edge.target.as_deref() == Some(character) {
        &edge.source
    } else {
        return None;
    };
    (!is_character_token(other)).then_some(other)
}

/// A structurally valid triple after lenient parsing.
struct ParsedTriple {
    source: String,
    content: String,
    target: Option<String>,
}

/// Parse one raw triple value.
///
/// `Ok(None)` marks entries the contract says to skip silently (null source,
/// null/empty content); `Err` marks malformed structure worth a warning.
fn parse_triple(value: &serde_json::Value) -> GraphResult<Option<ParsedTriple>> {
    let items = value
        .as_array()
        .ok_or_else(|| GraphError::InvalidTriple(value.to_string()))?;
    if items.len() < 3 {
        return Err(GraphError::InvalidTriple(value.to_string()));
    }

    let source = triple_field(&items[0], value)?;
    let content = triple_field(&items[1], value)?;
    let target = triple_field(&items[2], value)?;

    let Some(source) = source else {
        return Ok(None);
    };
    let Some(content) = content else {
        return Ok(None);
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    let target = target.filter(|t| !t.eq_ignore_ascii_case("null"));

    Ok(Some(ParsedTriple {
        source,
        content,
        target,
    }))
}

fn triple_field(
    item: &serde_json::Value,
    whole: &serde_json::Value,
) -> GraphResult<Option<String>> {
    match item {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.clone())),
        _ => Err(GraphError::InvalidTriple(whole.to_string())),
    }
}
