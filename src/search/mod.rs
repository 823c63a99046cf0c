//! Hybrid search over the three graph layers
//!
//! A structured query (produced by an external query parser) carries up to
//! three weighted triples, an optional spatial constraint, an optional
//! strict speaker list, and a result-count allocation. The facade runs the
//! high-level, low-level, and conversation searchers and fuses their output
//! into one formatted result string.
//!
//! Search never fails on data quality: missing embeddings and fields
//! degrade scores to zero.

mod conversations;
mod high_level;
mod low_level;
mod render;
mod score;

pub use conversations::{
    conversation_messages_with_context, search_conversations, ConversationHit,
    CONTEXT_WINDOW,
};
pub use high_level::search_high_level_edges;
pub use low_level::search_low_level_edges;

use crate::embedding::EmbeddingService;
use crate::graph::VideoGraph;
use crate::llm::parse_json_with_repair;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Largest total result budget the facade accepts.
pub const DEFAULT_MAX_BUDGET: usize = 50;

/// Most query triples considered per search.
pub const MAX_QUERY_TRIPLES: usize = 3;

/// Errors from search strategy handling.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search strategy: {0}")]
    InvalidStrategy(String),
}

/// A weighted query triple; `None` components are wildcards.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTriple {
    pub source: Option<String>,
    pub content: Option<String>,
    pub target: Option<String>,
    pub w_source: f64,
    pub w_content: f64,
    pub w_target: f64,
}

impl WeightedTriple {
    /// Build a triple from raw tokens; `?`, `null`, and empty mean wildcard.
    pub fn new(
        source: &str,
        content: &str,
        target: &str,
        w_source: f64,
        w_content: f64,
        w_target: f64,
    ) -> Self {
        Self {
            source: normalize_token(source),
            content: normalize_token(content),
            target: normalize_token(target),
            w_source,
            w_content,
            w_target,
        }
    }

    /// Parse the array form `[source, content, target, w_s, w_c, w_t]`.
    ///
    /// Missing weights default to 1.0.
    fn from_value(value: &Value) -> Result<Self, SearchError> {
        let items = value
            .as_array()
            .ok_or_else(|| SearchError::InvalidStrategy(format!("triple is not an array: {value}")))?;
        if items.len() < 3 {
            return Err(SearchError::InvalidStrategy(format!(
                "triple needs at least 3 elements: {value}"
            )));
        }
        let token = |v: &Value| -> Option<String> { v.as_str().and_then(normalize_token) };
        let weight = |i: usize| items.get(i).and_then(Value::as_f64).unwrap_or(1.0);
        Ok(Self {
            source: token(&items[0]),
            content: token(&items[1]),
            target: token(&items[2]),
            w_source: weight(3),
            w_content: weight(4),
            w_target: weight(5),
        })
    }
}

fn normalize_token(token: &str) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() || trimmed == "?" || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Spatial constraint for low-level search: one embeddable location text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialConstraint {
    pub text: String,
}

impl SpatialConstraint {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Accept a plain string or a `{location?, scene?}` object; `location`
    /// wins when both are present.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self::new(s.trim())),
            Value::Object(map) => map
                .get("location")
                .or_else(|| map.get("scene"))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(|s| Self::new(s.trim())),
            _ => None,
        }
    }
}

/// How the result budget splits across the three searchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub k_high_level: usize,
    pub k_low_level: usize,
    pub k_conversations: usize,
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            k_high_level: 10,
            k_low_level: 10,
            k_conversations: 10,
        }
    }
}

impl Allocation {
    /// Total budget across all three searchers.
    pub fn total(&self) -> usize {
        self.k_high_level + self.k_low_level + self.k_conversations
    }

    /// Scale an over-budget allocation down proportionally.
    pub fn clamped(self, max_total: usize) -> Self {
        let total = self.total();
        if total <= max_total {
            return self;
        }
        warn!(total, max_total, "allocation over budget, scaling down");
        let scale = |k: usize| k * max_total / total;
        let mut clamped = Self {
            k_high_level: scale(self.k_high_level),
            k_low_level: scale(self.k_low_level),
            k_conversations: scale(self.k_conversations),
        };
        // Flooring may leave slack; give it back in a fixed order.
        let mut slack = max_total - clamped.total();
        for k in [
            &mut clamped.k_low_level,
            &mut clamped.k_conversations,
            &mut clamped.k_high_level,
        ] {
            if slack == 0 {
                break;
            }
            *k += 1;
            slack -= 1;
        }
        clamped
    }

    fn from_value(value: &Value) -> Self {
        let get = |key: &str, default: usize| {
            value
                .get(key)
                .and_then(Value::as_u64)
                .map(|v| v as usize)
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            k_high_level: get("k_high_level", defaults.k_high_level),
            k_low_level: get("k_low_level", defaults.k_low_level),
            k_conversations: get("k_conversations", defaults.k_conversations),
        }
    }
}

/// A parsed search strategy from the external query parser.
#[derive(Debug, Clone)]
pub struct SearchStrategy {
    pub query_triples: Vec<WeightedTriple>,
    pub spatial_constraint: Option<SpatialConstraint>,
    pub speaker_strict: Option<Vec<String>>,
    pub allocation: Allocation,
}

impl SearchStrategy {
    /// Parse the raw query-parser reply (possibly fenced, possibly dirty).
    pub fn parse(response: &str) -> Result<Self, SearchError> {
        let value = parse_json_with_repair(response)
            .map_err(|e| SearchError::InvalidStrategy(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Build a strategy from a parsed JSON object.
    ///
    /// Accepts `query_triples` (list) or the legacy singular `query_triple`.
    /// Triples beyond [`MAX_QUERY_TRIPLES`] are dropped with a warning.
    pub fn from_json(value: &Value) -> Result<Self, SearchError> {
        let raw_triples: Vec<&Value> = match value.get("query_triples") {
            Some(Value::Array(items)) if !items.is_empty() => items.iter().collect(),
            _ => match value.get("query_triple") {
                Some(triple) => vec![triple],
                None => {
                    return Err(SearchError::InvalidStrategy(
                        "query_triple(s) not found in strategy".to_string(),
                    ))
                }
            },
        };

        let mut query_triples = Vec::new();
        for raw in &raw_triples {
            query_triples.push(WeightedTriple::from_value(raw)?);
        }
        if query_triples.len() > MAX_QUERY_TRIPLES {
            warn!(
                count = query_triples.len(),
                "too many query triples, keeping the first {MAX_QUERY_TRIPLES}"
            );
            query_triples.truncate(MAX_QUERY_TRIPLES);
        }

        let spatial_constraint = value
            .get("spatial_constraint")
            .and_then(SpatialConstraint::from_value);

        let speaker_strict = match value.get("speaker_strict") {
            Some(Value::Array(items)) => {
                let speakers: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| crate::graph::normalize_character_name(s))
                    .collect();
                (!speakers.is_empty()).then_some(speakers)
            }
            _ => None,
        };

        let allocation = value
            .get("allocation")
            .map(Allocation::from_value)
            .unwrap_or_default();

        Ok(Self {
            query_triples,
            spatial_constraint,
            speaker_strict,
            allocation,
        })
    }
}

/// Run all three searchers and fuse their output into one result string.
///
/// Sections appear in fixed order (high-level, low-level, conversations);
/// empty sections are omitted; an entirely empty result yields a fixed
/// no-information message.
pub fn search_with_strategy(
    query: &str,
    graph: &VideoGraph,
    embeddings: &EmbeddingService,
    strategy: &SearchStrategy,
) -> String {
    let allocation = strategy.allocation.clamped(DEFAULT_MAX_BUDGET);

    let high = search_high_level_edges(
        graph,
        embeddings,
        &strategy.query_triples,
        allocation.k_high_level,
    );
    let low = search_low_level_edges(
        graph,
        embeddings,
        &strategy.query_triples,
        allocation.k_low_level,
        strategy.spatial_constraint.as_ref(),
    );
    let hits = search_conversations(
        graph,
        embeddings,
        query,
        allocation.k_conversations,
        strategy.speaker_strict.as_deref(),
    );

    let mut sections: Vec<String> = Vec::new();

    let high_text = render::high_level_edges_to_string(graph, &high);
    if !high_text.is_empty() {
        sections.push(format!(
            "**High-Level Information (Character Attributes and Relationships): **\n{high_text}"
        ));
    }

    let low_text = render::low_level_edges_to_string(graph, &low);
    if !low_text.is_empty() {
        sections.push(format!(
            "**Low-Level Information (Actions and Events): **\n{low_text}"
        ));
    }

    let conversation_text = conversation_messages_with_context(graph, &hits, CONTEXT_WINDOW);
    if !conversation_text.is_empty() {
        sections.push(format!("**Conversations: **\n{conversation_text}"));
    }

    if sections.is_empty() {
        return "No relevant information found for this query.".to_string();
    }
    sections.join("\n\n")
}
