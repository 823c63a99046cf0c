//! Abstract synthesizer: high-level edges out of low-level evidence
//!
//! Drives the external text LLM to distill character attributes, pairwise
//! relationships, and conversation summaries, and ingests the results as
//! high-level edges. Every operation is idempotent under high-level dedup,
//! and every LLM or parse failure degrades to an empty result that leaves
//! the graph unchanged — a bad call never aborts a build.

pub mod prompts;

use crate::graph::{
    normalize_character_name, ConversationId, Edge, GraphError, GraphResult, VideoGraph,
};
use crate::llm::{generate_with_retry, parse_json_with_repair, TextLlm};
use serde_json::Value;
use tracing::{debug, warn};

/// Claims below this confidence are discarded.
const MIN_CONFIDENCE: u8 = 50;

/// Minimum connected edges before a relationship pass is worth running.
const MIN_RELATIONSHIP_EVIDENCE: usize = 3;

/// Characters need more than this degree to enter the abstract pass.
const DEGREE_THRESHOLD: usize = 10;

/// An attribute claim emitted by the LLM and accepted into the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeClaim {
    pub character: String,
    pub attribute: String,
    pub confidence: u8,
}

/// A relationship claim emitted by the LLM and accepted into the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipClaim {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub confidence: u8,
}

/// Everything a conversation-summary pass produced.
#[derive(Debug, Clone, Default)]
pub struct ConversationDigest {
    pub summary: String,
    pub attributes: Vec<AttributeClaim>,
    pub relationships: Vec<RelationshipClaim>,
    /// `(old, new)` pairs actually renamed
    pub renamed_characters: Vec<(String, String)>,
}

/// Drives the LLM-guided synthesis of high-level edges.
pub struct Synthesizer<'a> {
    llm: &'a dyn TextLlm,
}

impl<'a> Synthesizer<'a> {
    pub fn new(llm: &'a dyn TextLlm) -> Self {
        Self { llm }
    }

    /// Distill a character's attributes from every edge touching them.
    ///
    /// Returns the accepted claims. Unknown characters fail; LLM and parse
    /// failures return an empty list with the graph unchanged.
    pub async fn character_attributes(
        &self,
        graph: &mut VideoGraph,
        character: &str,
    ) -> GraphResult<Vec<AttributeClaim>> {
        let name = normalize_character_name(character);
        if graph.get_character(&name).is_none() {
            return Err(GraphError::UnknownCharacter(name));
        }

        let mut edge_ids: Vec<_> = graph.edges_of(&name).into_iter().collect();
        if edge_ids.is_empty() {
            return Ok(Vec::new());
        }
        edge_ids.sort();

        let evidence: Vec<String> = edge_ids
            .iter()
            .filter_map(|id| graph.edge(*id).map(format_edge_evidence))
            .collect();
        let prompt = format!(
            "Character: {name}\n\nCharacter behaviors (from graph edges):\n{}\n{}",
            evidence.join("\n"),
            prompts::CHARACTER_ATTRIBUTES
        );

        let Some(value) = self.ask(&prompt).await else {
            return Ok(Vec::new());
        };
        let Value::Object(map) = value else {
            warn!(character = %name, "attribute reply is not a JSON object");
            return Ok(Vec::new());
        };

        let mut accepted = Vec::new();
        for (attribute, confidence) in map {
            let Some(confidence) = as_confidence(&confidence) else {
                continue;
            };
            if confidence < MIN_CONFIDENCE {
                continue;
            }
            match graph.add_high_level_edge(&name, &attribute, None, confidence) {
                Ok(_) => accepted.push(AttributeClaim {
                    character: name.clone(),
                    attribute,
                    confidence,
                }),
                Err(err) => warn!(%err, character = %name, "skipping attribute"),
            }
        }
        debug!(character = %name, count = accepted.len(), "character attributes synthesized");
        Ok(accepted)
    }

    /// Distill the relationships between two characters from their
    /// connected edges.
    ///
    /// Fewer than three connected edges is not enough evidence and yields
    /// an empty result. Claims naming a different pair than requested are
    /// dropped; a swapped order is accepted.
    pub async fn character_relationships(
        &self,
        graph: &mut VideoGraph,
        c1: &str,
        c2: &str,
    ) -> GraphResult<Vec<RelationshipClaim>> {
        let c1 = normalize_character_name(c1);
        let c2 = normalize_character_name(c2);
        let edge_ids = graph.connected_edges(&c1, &c2)?;
        if edge_ids.len() < MIN_RELATIONSHIP_EVIDENCE {
            return Ok(Vec::new());
        }

        let evidence: Vec<String> = edge_ids
            .iter()
            .filter_map(|id| graph.edge(*id).map(format_edge_evidence))
            .collect();
        let prompt = format!(
            "Characters: {c1} and {c2}\n\nInteractions (from graph edges):\n{}\n{}",
            evidence.join("\n"),
            prompts::CHARACTER_RELATIONSHIPS
        );

        let Some(value) = self.ask(&prompt).await else {
            return Ok(Vec::new());
        };
        let Value::Array(entries) = value else {
            warn!("relationship reply is not a JSON array");
            return Ok(Vec::new());
        };

        let mut accepted = Vec::new();
        for entry in entries {
            let Some((source, relation, target, confidence)) = as_relationship(&entry) else {
                warn!(%entry, "skipping malformed relationship entry");
                continue;
            };
            if confidence < MIN_CONFIDENCE {
                continue;
            }
            // The claim must be about the requested pair, either way around.
            let pair_matches = (source == c1 && target == c2) || (source == c2 && target == c1);
            if !pair_matches {
                warn!(%source, %target, "relationship names a different pair, dropping");
                continue;
            }
            match graph.add_high_level_edge(&source, &relation, Some(&target), confidence) {
                Ok(_) => accepted.push(RelationshipClaim {
                    source,
                    relation,
                    target,
                    confidence,
                }),
                Err(err) => warn!(%err, "skipping relationship"),
            }
        }
        Ok(accepted)
    }

    /// Summarize a conversation and mine it for renames, attributes, and
    /// relationships.
    ///
    /// On LLM or parse failure the digest is empty and the graph is left
    /// unchanged, summary included.
    pub async fn extract_conversation_summary(
        &self,
        graph: &mut VideoGraph,
        id: ConversationId,
    ) -> GraphResult<ConversationDigest> {
        let transcript = graph
            .conversation(id)
            .ok_or(GraphError::UnknownConversation(id))?
            .format_messages();

        let prompt = format!("{}\n{transcript}", prompts::CONVERSATION_SUMMARY);
        let Some(value) = self.ask(&prompt).await else {
            return Ok(ConversationDigest::default());
        };
        if !value.is_object() {
            warn!(conversation = %id, "summary reply is not a JSON object");
            return Ok(ConversationDigest::default());
        }

        let mut digest = ConversationDigest::default();

        // 1. Renames revealed by the dialogue.
        if let Some(Value::Array(pairs)) = value.get("name_equivalences") {
            for pair in pairs {
                let (Some(old), Some(new)) = (
                    pair.get(0).and_then(Value::as_str),
                    pair.get(1).and_then(Value::as_str),
                ) else {
                    continue;
                };
                match graph.rename_character(old, new) {
                    Ok(()) => digest.renamed_characters.push((
                        normalize_character_name(old),
                        normalize_character_name(new),
                    )),
                    Err(err) => warn!(%err, old, new, "skipping name equivalence"),
                }
            }
        }

        // 2. The summary itself.
        if let Some(summary) = value.get("summary").and_then(Value::as_str) {
            digest.summary = summary.to_string();
            graph.set_conversation_summary(id, summary)?;
        }

        // 3. Attributes, creating characters the dialogue introduced.
        if let Some(Value::Array(entries)) = value.get("character_attributes") {
            for entry in entries {
                let (Some(character), Some(attribute), Some(confidence)) = (
                    entry.get(0).and_then(Value::as_str),
                    entry.get(1).and_then(Value::as_str),
                    entry.get(2).and_then(as_confidence),
                ) else {
                    warn!(%entry, "skipping malformed attribute entry");
                    continue;
                };
                if confidence < MIN_CONFIDENCE {
                    continue;
                }
                let character = graph.add_character(character);
                match graph.add_high_level_edge(&character, attribute, None, confidence) {
                    Ok(_) => digest.attributes.push(AttributeClaim {
                        character,
                        attribute: attribute.to_string(),
                        confidence,
                    }),
                    Err(err) => warn!(%err, "skipping attribute"),
                }
            }
        }

        // 4. Relationships.
        if let Some(Value::Array(entries)) = value.get("characters_relationships") {
            for entry in entries {
                let Some((source, relation, target, confidence)) = as_relationship(entry) else {
                    warn!(%entry, "skipping malformed relationship entry");
                    continue;
                };
                if confidence < MIN_CONFIDENCE {
                    continue;
                }
                let source = graph.add_character(&source);
                let target = graph.add_character(&target);
                match graph.add_high_level_edge(&source, &relation, Some(&target), confidence) {
                    Ok(_) => digest.relationships.push(RelationshipClaim {
                        source,
                        relation,
                        target,
                        confidence,
                    }),
                    Err(err) => warn!(%err, "skipping relationship"),
                }
            }
        }

        Ok(digest)
    }

    /// Run the abstract pass over the whole graph.
    ///
    /// Selects characters with degree above 10, synthesizes attributes for
    /// each, then relationships for every unordered pair. Per-item failures
    /// are logged and skipped. Returns `(attributes, relationships)`
    /// accepted counts.
    pub async fn synthesize_abstract_layer(&self, graph: &mut VideoGraph) -> (usize, usize) {
        let degrees = graph.node_degrees();
        let mut selected: Vec<String> = graph
            .characters()
            .map(|c| c.name.clone())
            .filter(|name| degrees.get(name).copied().unwrap_or(0) > DEGREE_THRESHOLD)
            .collect();
        selected.sort();
        debug!(characters = selected.len(), "abstract synthesis pass");

        let mut attribute_count = 0;
        for character in &selected {
            match self.character_attributes(graph, character).await {
                Ok(claims) => attribute_count += claims.len(),
                Err(err) => warn!(%err, %character, "attribute synthesis failed, continuing"),
            }
        }

        let mut relationship_count = 0;
        for i in 0..selected.len() {
            for j in i + 1..selected.len() {
                match self
                    .character_relationships(graph, &selected[i], &selected[j])
                    .await
                {
                    Ok(claims) => relationship_count += claims.len(),
                    Err(err) => warn!(
                        %err,
                        c1 = %selected[i],
                        c2 = %selected[j],
                        "relationship synthesis failed, continuing"
                    ),
                }
            }
        }

        (attribute_count, relationship_count)
    }

    /// One retried LLM call plus repair-tolerant JSON parsing.
    ///
    /// `None` means the failure policy applies: empty result, graph
    /// untouched.
    async fn ask(&self, prompt: &str) -> Option<Value> {
        let reply = match generate_with_retry(self.llm, prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%err, "llm unavailable after retry");
                return None;
            }
        };
        match parse_json_with_repair(&reply.text) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%err, "llm reply unparseable after repair");
                None
            }
        }
    }
}

/// One line of edge evidence: `source -> target: content [scene: s, clip: c]`.
fn format_edge_evidence(edge: &Edge) -> String {
    let target = edge.target.as_deref().unwrap_or("null");
    match &edge.scene {
        Some(scene) => format!(
            "{} -> {target}: {} [scene: {scene}, clip: {}]",
            edge.source, edge.content, edge.clip_id
        ),
        None => format!(
            "{} -> {target}: {} [clip: {}]",
            edge.source, edge.content, edge.clip_id
        ),
    }
}

/// Read a confidence score from a JSON number, clamped to 100.
fn as_confidence(value: &Value) -> Option<u8> {
    let raw = value.as_f64()?;
    if raw.is_nan() || raw < 0.0 {
        return None;
    }
    Some(raw.min(100.0) as u8)
}

/// Read a `[c1, relation, c2, confidence]` entry.
fn as_relationship(entry: &Value) -> Option<(String, String, String, u8)> {
    let items = entry.as_array()?;
    if items.len() < 4 {
        return None;
    }
    let source = normalize_character_name(items[0].as_str()?);
    let relation = items[1].as_str()?.to_string();
    let target = normalize_character_name(items[2].as_str()?);
    let confidence = as_confidence(&items[3])?;
    Some((source, relation, target, confidence))
}
