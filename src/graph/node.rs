//! Node representation in the video knowledge graph
//!
//! Nodes are a closed sum: characters (bracketed names like `<Alice>`) and
//! objects (plain names like `coffee`). The bracket convention classifies
//! raw tokens at the string boundary; stored node records are authoritative
//! after that.

use serde::{Deserialize, Serialize};

/// A character node: a person or agent.
///
/// The canonical name always carries angle brackets (`<Alice>`), which is
/// also the key in the graph's character table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterNode {
    /// Unique identifier (monotonic, assigned by the graph)
    pub id: u64,
    /// Canonical bracketed name, e.g. `<Alice>`
    pub name: String,
    /// Embedding of the plain name (brackets stripped), assigned lazily
    pub embedding: Option<Vec<f32>>,
}

impl CharacterNode {
    /// Create a character node with the given id and raw name.
    ///
    /// The name is normalized to bracketed form.
    pub fn new(id: u64, name: impl AsRef<str>) -> Self {
        Self {
            id,
            name: normalize_character_name(name.as_ref()),
            embedding: None,
        }
    }
}

/// An object node: a thing characters interact with.
///
/// Keyed by plain name. Legacy affixed tokens (`phone@<Alice>`,
/// `mug#white`) are normalized to the base name before reaching here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectNode {
    /// Unique identifier (monotonic, assigned by the graph)
    pub id: u64,
    /// Plain name, no brackets
    pub name: String,
    /// Embedding of the name, assigned lazily
    pub embedding: Option<Vec<f32>>,
}

impl ObjectNode {
    /// Create an object node with the given id and name.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            embedding: None,
        }
    }
}

/// Ensure a character name carries angle brackets.
pub fn normalize_character_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        trimmed.to_string()
    } else {
        format!("<{trimmed}>")
    }
}

/// True when the token classifies as a character (bracketed).
pub fn is_character_token(token: &str) -> bool {
    token.starts_with('<') && token.ends_with('>') && token.len() >= 2
}

/// Remove a single layer of angle brackets, if present.
pub fn strip_brackets(name: &str) -> &str {
    if is_character_token(name) {
        &name[1..name.len() - 1]
    } else {
        name
    }
}

/// True when the name matches the generic placeholder form `<character_N>`.
///
/// Only generic characters may be renamed; named characters are stable keys.
pub fn is_generic_character(name: &str) -> bool {
    let inner = strip_brackets(name);
    match inner.strip_prefix("character_") {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// A parsed node token.
///
/// Object tokens may carry legacy `@owner` and/or `#attribute` affixes in
/// either order; both are split off so the graph can key objects by base
/// name while rendering keeps the decoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeToken {
    /// A character reference, name in bracketed form
    Character { name: String },
    /// An object reference with optional legacy decorations
    Object {
        name: String,
        owner: Option<String>,
        attribute: Option<String>,
    },
}

impl NodeToken {
    /// Classify and split a raw node string.
    pub fn parse(raw: &str) -> Self {
        let token = raw.trim();
        if is_character_token(token) {
            return Self::Character {
                name: token.to_string(),
            };
        }

        let mut name = token;
        let mut owner = None;
        let mut attribute = None;

        let at = token.find('@');
        let hash = token.find('#');
        match (at, hash) {
            (Some(a), Some(h)) if a < h => {
                // object@owner#attribute
                let (base, rest) = token.split_at(a);
                name = base;
                let rest = &rest[1..];
                if let Some((o, attr)) = rest.split_once('#') {
                    owner = Some(o.to_string());
                    attribute = Some(attr.to_string());
                } else {
                    owner = Some(rest.to_string());
                }
            }
            (Some(_), Some(h)) => {
                // object#attribute@owner
                let (base, rest) = token.split_at(h);
                name = base;
                let rest = &rest[1..];
                if let Some((attr, o)) = rest.split_once('@') {
                    attribute = Some(attr.to_string());
                    owner = Some(o.to_string());
                } else {
                    attribute = Some(rest.to_string());
                }
            }
            (Some(a), None) => {
                let (base, rest) = token.split_at(a);
                name = base;
                owner = Some(rest[1..].to_string());
            }
            (None, Some(h)) => {
                let (base, rest) = token.split_at(h);
                name = base;
                attribute = Some(rest[1..].to_string());
            }
            (None, None) => {}
        }

        Self::Object {
            name: name.to_string(),
            owner,
            attribute,
        }
    }

    /// True for character tokens.
    pub fn is_character(&self) -> bool {
        matches!(self, Self::Character { .. })
    }

    /// The node-table key: bracketed name for characters, base name for objects.
    pub fn key(&self) -> &str {
        match self {
            Self::Character { name } => name,
            Self::Object { name, .. } => name,
        }
    }
}

/// Render a node string for natural-language output.
///
/// Characters lose their brackets; objects reconstruct legacy decorations
/// as `"owner's attribute name"`.
pub fn format_node_natural(raw: &str) -> String {
    match NodeToken::parse(raw) {
        NodeToken::Character { name } => strip_brackets(&name).to_string(),
        NodeToken::Object {
            name,
            owner,
            attribute,
        } => {
            let mut parts = Vec::with_capacity(3);
            if let Some(owner) = owner {
                parts.push(format!("{}'s", strip_brackets(&owner)));
            }
            if let Some(attribute) = attribute {
                parts.push(attribute);
            }
            parts.push(name);
            parts.join(" ")
        }
    }
}
