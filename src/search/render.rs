//! Rendering search results as natural language

use crate::graph::{format_node_natural, strip_brackets, EdgeId, VideoGraph};
use std::collections::BTreeMap;

/// Render high-level edges as attribute and relationship sections.
///
/// Attributes (null target) group per character into
/// `- Name is: attr1 (conf), attr2 (conf)`; relationships render one per
/// line as `- Name1 relation Name2 (conf)`.
pub(crate) fn high_level_edges_to_string(graph: &VideoGraph, ids: &[EdgeId]) -> String {
    let mut attributes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut relationships: Vec<String> = Vec::new();

    for id in ids {
        let Some(edge) = graph.edge(*id) else {
            continue;
        };
        let source = strip_brackets(&edge.source).to_string();
        match &edge.target {
            None => {
                let rendered = match edge.confidence {
                    Some(confidence) => format!("{} ({confidence})", edge.content),
                    None => edge.content.clone(),
                };
                attributes.entry(source).or_default().push(rendered);
            }
            Some(target) => {
                let target = strip_brackets(target);
                let line = match edge.confidence {
                    Some(confidence) => {
                        format!("- {source} {} {target} ({confidence})", edge.content)
                    }
                    None => format!("- {source} {} {target}", edge.content),
                };
                relationships.push(line);
            }
        }
    }

    let mut lines: Vec<String> = Vec::new();
    if !attributes.is_empty() {
        lines.push("Character Attributes:".to_string());
        for (character, attrs) in &attributes {
            lines.push(format!("- {character} is: {}", attrs.join(", ")));
        }
    }
    if !relationships.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Character Relationships:".to_string());
        lines.extend(relationships);
    }
    lines.join("\n")
}

/// Render low-level edges in temporal order (sorted by edge id), one per
/// line as `[clip_id] source content target. (scene)`.
pub(crate) fn low_level_edges_to_string(graph: &VideoGraph, ids: &[EdgeId]) -> String {
    let mut sorted: Vec<EdgeId> = ids.to_vec();
    sorted.sort();

    let mut lines: Vec<String> = Vec::new();
    for id in sorted {
        let Some(edge) = graph.edge(id) else {
            continue;
        };
        let source = format_node_natural(&edge.source);
        let action = match edge.target.as_deref() {
            Some(target) => format!("{source} {} {}", edge.content, format_node_natural(target)),
            None => format!("{source} {}", edge.content),
        };
        let line = match edge.scene.as_deref() {
            Some(scene) => format!("[{}] {action}. ({scene})", edge.clip_id),
            None => format!("[{}] {action}.", edge.clip_id),
        };
        lines.push(line);
    }
    lines.join("\n")
}
