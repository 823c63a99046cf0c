//! Core graph data structures

mod conversation;
mod edge;
mod node;
mod store;

#[cfg(test)]
mod tests;

pub use conversation::{Conversation, ConversationId, Message};
pub use edge::{Edge, EdgeId};
pub use node::{
    format_node_natural, is_character_token, is_generic_character, normalize_character_name,
    strip_brackets, CharacterNode, NodeToken, ObjectNode,
};
pub use store::{
    AppearanceMap, GraphError, GraphResult, VideoGraph, APPEARANCE_MERGE_THRESHOLD,
};
