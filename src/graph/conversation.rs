//! Conversation storage: ordered dialogue spanning one or more clips

use super::node::strip_brackets;
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation
///
/// Monotonically increasing per graph. Serializes as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

impl ConversationId {
    /// Get the inner integer value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single dialogue message.
///
/// The embedding is computed over the displayed form `"Speaker: content"`
/// (brackets stripped from the speaker); `None` records a degraded
/// embedding call, never an absent field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Speaker name as spoken, usually bracketed (`<Alice>`)
    pub speaker: String,
    /// Message text
    pub content: String,
    /// Clip the message was heard in
    pub clip_id: u32,
    /// Embedding of the displayed form
    pub embedding: Option<Vec<f32>>,
}

impl Message {
    /// The form messages are rendered and embedded in: `"Speaker: content"`.
    pub fn displayed(&self) -> String {
        format!("{}: {}", strip_brackets(&self.speaker), self.content)
    }
}

/// An ordered list of dialogue messages spanning one or more clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier
    pub id: ConversationId,
    /// Distinct clips that contributed a message, in first-seen order
    pub clips: Vec<u32>,
    /// Messages in append order
    pub messages: Vec<Message>,
    /// Summary produced by the synthesizer once the conversation closes
    pub summary: Option<String>,
}

impl Conversation {
    /// Create an empty conversation rooted at a clip.
    pub fn new(id: ConversationId, clip_id: u32) -> Self {
        Self {
            id,
            clips: vec![clip_id],
            messages: Vec::new(),
            summary: None,
        }
    }

    /// Record that a clip contributed to this conversation.
    pub fn add_clip(&mut self, clip_id: u32) {
        if !self.clips.contains(&clip_id) {
            self.clips.push(clip_id);
        }
    }

    /// Append a message unless its `(speaker, content)` pair is already present.
    ///
    /// Returns whether the message was appended.
    pub fn push_message(&mut self, message: Message) -> bool {
        let duplicate = self
            .messages
            .iter()
            .any(|m| m.speaker == message.speaker && m.content == message.content);
        if duplicate {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// The set of speakers, derived from the messages.
    pub fn speakers(&self) -> std::collections::HashSet<&str> {
        self.messages.iter().map(|m| m.speaker.as_str()).collect()
    }

    /// Render all messages one per line as `"Speaker: content"`.
    pub fn format_messages(&self) -> String {
        self.messages
            .iter()
            .map(Message::displayed)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
