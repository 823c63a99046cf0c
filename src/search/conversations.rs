//! Conversation search and context-window merging

use crate::embedding::{cosine_similarity, EmbeddingService};
use crate::graph::{ConversationId, VideoGraph};
use std::collections::BTreeMap;
use tracing::warn;

/// Messages of context included on each side of a hit.
pub const CONTEXT_WINDOW: usize = 2;

/// One matched message.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationHit {
    pub conversation_id: ConversationId,
    pub message_index: usize,
    pub score: f64,
}

/// Rank conversation messages against a free-form query.
///
/// Only conversations whose speaker set covers `speaker_strict` (when
/// given) are considered. Messages score by cosine similarity between the
/// query embedding and their stored embedding (embedded on the fly when
/// missing); only positive scores are kept.
pub fn search_conversations(
    graph: &VideoGraph,
    embeddings: &EmbeddingService,
    query: &str,
    k: usize,
    speaker_strict: Option<&[String]>,
) -> Vec<ConversationHit> {
    if k == 0 || query.trim().is_empty() {
        return Vec::new();
    }
    let Some(query_embedding) = embeddings.try_embed(query) else {
        warn!("query embedding unavailable, skipping conversation search");
        return Vec::new();
    };

    let mut hits: Vec<ConversationHit> = Vec::new();
    for conversation in graph.conversations() {
        if let Some(required) = speaker_strict {
            let speakers = conversation.speakers();
            if !required.iter().all(|s| speakers.contains(s.as_str())) {
                continue;
            }
        }

        for (index, message) in conversation.messages.iter().enumerate() {
            let stored = message
                .embedding
                .clone()
                .or_else(|| embeddings.try_embed(&message.displayed()));
            let Some(vector) = stored else {
                continue;
            };
            let score = cosine_similarity(&query_embedding, &vector);
            if score > 0.0 {
                hits.push(ConversationHit {
                    conversation_id: conversation.id,
                    message_index: index,
                    score,
                });
            }
        }
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.conversation_id.cmp(&b.conversation_id))
            .then_with(|| a.message_index.cmp(&b.message_index))
    });
    hits.truncate(k);
    hits
}

/// Render hits with surrounding context, merged per conversation.
///
/// Each hit expands to `[index - window, index + window]`; overlapping and
/// adjacent intervals merge, and the covered messages print once, in
/// temporal order, as `"[clip_id] Speaker: content"`. Every conversation
/// block starts with a `Conversation {id}:` line carrying the summary when
/// one exists. Blocks are separated by a blank line.
pub fn conversation_messages_with_context(
    graph: &VideoGraph,
    hits: &[ConversationHit],
    window: usize,
) -> String {
    let mut by_conversation: BTreeMap<ConversationId, Vec<usize>> = BTreeMap::new();
    for hit in hits {
        by_conversation
            .entry(hit.conversation_id)
            .or_default()
            .push(hit.message_index);
    }

    let mut blocks: Vec<String> = Vec::new();
    for (id, indices) in by_conversation {
        let Some(conversation) = graph.conversation(id) else {
            continue;
        };
        let len = conversation.messages.len();

        let mut intervals: Vec<(usize, usize)> = indices
            .iter()
            .map(|&i| (i.saturating_sub(window), (i + window + 1).min(len)))
            .collect();
        intervals.sort();

        let mut merged: Vec<(usize, usize)> = Vec::new();
        for (start, end) in intervals {
            match merged.last_mut() {
                Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
                _ => merged.push((start, end)),
            }
        }

        let mut lines: Vec<String> = Vec::new();
        match &conversation.summary {
            Some(summary) => lines.push(format!("Conversation {id}: {summary}")),
            None => lines.push(format!("Conversation {id}:")),
        }
        for (start, end) in merged {
            for message in &conversation.messages[start..end] {
                lines.push(format!("[{}] {}", message.clip_id, message.displayed()));
            }
        }
        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n")
}
