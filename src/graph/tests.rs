//! Scenario tests for graph mutation and connectivity

use super::*;
use crate::embedding::testutil::{FailingEmbedder, MockEmbedder};
use crate::embedding::EmbeddingService;
use serde_json::json;
use std::collections::HashMap;

fn service() -> EmbeddingService {
    EmbeddingService::new(Box::new(MockEmbedder::empty()))
}

fn service_with(entries: &[(&str, Vec<f32>)]) -> EmbeddingService {
    let map: HashMap<String, Vec<f32>> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    EmbeddingService::new(Box::new(MockEmbedder::new(map)))
}

// === Node store ===

#[test]
fn new_graph_contains_only_robot() {
    let graph = VideoGraph::new();
    assert_eq!(graph.character_count(), 1);
    assert!(graph.get_character("<robot>").is_some());
    assert_eq!(graph.object_count(), 0);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn add_character_normalizes_and_is_idempotent() {
    let mut graph = VideoGraph::new();
    let first = graph.add_character("Alice");
    assert_eq!(first, "<Alice>");
    let id = graph.get_character("Alice").unwrap().id;
    let second = graph.add_character("<Alice>");
    assert_eq!(second, "<Alice>");
    assert_eq!(graph.get_character("<Alice>").unwrap().id, id);
    assert_eq!(graph.character_count(), 2);
}

// === Triple ingestion (basic ingestion and adjacency) ===

#[test]
fn ingestion_builds_nodes_edges_and_adjacency() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let triples = vec![
        json!(["<Alice>", "picks up", "coffee"]),
        json!(["coffee", "is on", "table"]),
    ];
    let inserted = graph.insert_triples(&triples, 1, "kitchen", &embeddings, None);
    assert_eq!(inserted, 2);

    assert_eq!(graph.character_count(), 2); // robot + Alice
    assert!(graph.get_object("coffee").is_some());
    assert!(graph.get_object("table").is_some());

    let edges: Vec<&Edge> = graph.edges().collect();
    assert_eq!(edges.len(), 2);
    for edge in &edges {
        assert_eq!(edge.clip_id, 1);
        assert_eq!(edge.scene.as_deref(), Some("kitchen"));
        assert!(edge.scene_embedding.is_some());
    }

    assert_eq!(graph.degree("<Alice>"), 1);
    assert_eq!(graph.degree("coffee"), 2);
    assert_eq!(graph.degree("table"), 1);

    let from_alice = graph.edges_from("<Alice>");
    assert_eq!(from_alice.len(), 1);
    let picks = graph.edge(*from_alice.iter().next().unwrap()).unwrap();
    assert_eq!(picks.content, "picks up");

    let to_table = graph.edges_to("table");
    assert_eq!(to_table.len(), 1);
    let is_on = graph.edge(*to_table.iter().next().unwrap()).unwrap();
    assert_eq!(is_on.content, "is on");

    graph.assert_invariants();
}

#[test]
fn duplicate_triples_in_batch_are_inserted_once() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let triples = vec![
        json!(["<Alice>", "waves", null]),
        json!(["<Alice>", "waves", null]),
    ];
    let inserted = graph.insert_triples(&triples, 1, "hall", &embeddings, None);
    assert_eq!(inserted, 1);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn null_source_or_empty_content_is_skipped() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let triples = vec![
        json!([null, "waves", "<Alice>"]),
        json!(["<Alice>", "", "coffee"]),
        json!(["<Alice>", null, "coffee"]),
        json!(["<Alice>", "sips", "coffee"]),
    ];
    let inserted = graph.insert_triples(&triples, 2, "cafe", &embeddings, None);
    assert_eq!(inserted, 1);
    assert_eq!(graph.edges().next().unwrap().content, "sips");
}

#[test]
fn literal_null_target_is_intransitive() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let triples = vec![json!(["<Alice>", "stands up", "Null"])];
    graph.insert_triples(&triples, 1, "gym", &embeddings, None);

    let edge = graph.edges().next().unwrap();
    assert_eq!(edge.target, None);
    // No object named "Null" was created.
    assert_eq!(graph.object_count(), 0);
    graph.assert_invariants();
}

#[test]
fn malformed_triples_do_not_abort_the_batch() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let triples = vec![
        json!("not an array"),
        json!(["<Alice>", "waves"]),
        json!([1, 2, 3]),
        json!(["<Alice>", "sits on", "chair"]),
    ];
    let inserted = graph.insert_triples(&triples, 1, "office", &embeddings, None);
    assert_eq!(inserted, 1);
    graph.assert_invariants();
}

#[test]
fn unknown_characters_in_triples_are_created() {
    let embeddings = service();
    let mut graph = VideoGraph::new();

    let triples = vec![json!(["<character_1>", "enters", null])];
    graph.insert_triples(&triples, 1, "lobby", &embeddings, None);
    assert!(graph.get_character("<character_1>").is_some());
}

#[test]
fn legacy_affixed_objects_normalize_to_plain_names() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let triples = vec![json!(["<Alice>", "grabs", "phone@<Alice>"])];
    graph.insert_triples(&triples, 1, "bedroom", &embeddings, None);

    assert!(graph.get_object("phone").is_some());
    assert!(graph.get_object("phone@<Alice>").is_none());
    let edge = graph.edges().next().unwrap();
    assert_eq!(edge.target.as_deref(), Some("phone"));
}

// === Edge store ===

#[test]
fn add_edge_rejects_unknown_endpoints() {
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let edge = Edge::low_level(1, "<Alice>", Some("ghost".to_string()), "sees", "attic");
    let err = graph.add_edge(edge).unwrap_err();
    assert!(matches!(err, GraphError::UnknownEndpoint(name) if name == "ghost"));

    let edge = Edge::low_level(1, "<Bob>", None, "waves", "attic");
    let err = graph.add_edge(edge).unwrap_err();
    assert!(matches!(err, GraphError::UnknownEndpoint(name) if name == "<Bob>"));
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn edge_ids_increase_monotonically() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let triples = vec![
        json!(["<Alice>", "enters", null]),
        json!(["<Alice>", "sits", null]),
        json!(["<Alice>", "reads", null]),
    ];
    graph.insert_triples(&triples, 1, "library", &embeddings, None);

    let ids: Vec<u64> = graph.edges().map(|e| e.id.value()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(ids.len(), 3);
}

#[test]
fn delete_edge_unlinks_adjacency() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.insert_triples(
        &[json!(["<Alice>", "holds", "cup"])],
        1,
        "kitchen",
        &embeddings,
        None,
    );

    let id = *graph.edges_from("<Alice>").iter().next().unwrap();
    graph.delete_edge(id);
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.edges_from("<Alice>").is_empty());
    assert!(graph.edges_to("cup").is_empty());
    graph.assert_invariants();
}

// === Rename ===

#[test]
fn rename_rewrites_all_references() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.insert_triples(
        &[
            json!(["<Alice>", "picks up", "coffee"]),
            json!(["coffee", "is on", "table"]),
        ],
        1,
        "kitchen",
        &embeddings,
        None,
    );
    graph.add_character("character_1");
    graph.insert_triples(
        &[json!(["<character_1>", "waves at", "<Alice>"])],
        2,
        "kitchen",
        &embeddings,
        None,
    );

    graph.rename_character("character_1", "Bob").unwrap();

    assert!(graph.get_character("<character_1>").is_none());
    assert!(graph.get_character("<Bob>").is_some());

    let waves: Vec<&Edge> = graph
        .edges()
        .filter(|e| e.content == "waves at")
        .collect();
    assert_eq!(waves.len(), 1);
    assert_eq!(waves[0].source, "<Bob>");
    assert_eq!(waves[0].target.as_deref(), Some("<Alice>"));

    assert!(graph.edges_from("<character_1>").is_empty());
    assert_eq!(graph.edges_from("<Bob>").len(), 1);

    // Unrelated edges are untouched.
    assert_eq!(graph.edges_from("<Alice>").len(), 1);
    assert_eq!(graph.edges_to("table").len(), 1);
    graph.assert_invariants();
}

#[test]
fn rename_requires_generic_source() {
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    let err = graph.rename_character("Alice", "Alicia").unwrap_err();
    assert!(matches!(err, GraphError::RenameNotAllowed(_)));
}

#[test]
fn rename_unknown_character_fails() {
    let mut graph = VideoGraph::new();
    let err = graph.rename_character("character_9", "Eve").unwrap_err();
    assert!(matches!(err, GraphError::UnknownCharacter(_)));
}

#[test]
fn rename_into_existing_name_fails() {
    let mut graph = VideoGraph::new();
    graph.add_character("character_1");
    graph.add_character("Alice");
    let err = graph.rename_character("character_1", "Alice").unwrap_err();
    assert!(matches!(err, GraphError::RenameCollision(_)));
    // Nothing changed.
    assert!(graph.get_character("<character_1>").is_some());
}

#[test]
fn rename_updates_high_level_dedup_identity() {
    let mut graph = VideoGraph::new();
    graph.add_character("character_1");
    graph
        .add_high_level_edge("<character_1>", "kind", None, 60)
        .unwrap();
    graph.rename_character("character_1", "Bob").unwrap();

    // The renamed triple is now the dedup identity.
    let unchanged = graph.add_high_level_edge("<Bob>", "kind", None, 50).unwrap();
    assert!(unchanged.is_none());
    let updated = graph.add_high_level_edge("<Bob>", "kind", None, 90).unwrap();
    assert!(updated.is_some());
    assert_eq!(graph.edge_count(), 1);
}

// === High-level dedup and confidence merge ===

#[test]
fn high_level_confidence_is_max_ever_asserted() {
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");

    let first = graph
        .add_high_level_edge("<Alice>", "kind", None, 60)
        .unwrap();
    assert!(first.is_some());
    let raised = graph
        .add_high_level_edge("<Alice>", "kind", None, 80)
        .unwrap();
    assert_eq!(raised, first);
    let lowered = graph
        .add_high_level_edge("<Alice>", "kind", None, 70)
        .unwrap();
    assert!(lowered.is_none());

    let kind: Vec<&Edge> = graph.edges().filter(|e| e.content == "kind").collect();
    assert_eq!(kind.len(), 1);
    assert_eq!(kind[0].confidence, Some(80));
    assert_eq!(kind[0].clip_id, 0);
    assert_eq!(kind[0].scene, None);
    graph.assert_invariants();
}

#[test]
fn high_level_edges_differ_by_any_triple_component() {
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.add_character("Bob");

    graph.add_high_level_edge("<Alice>", "kind", None, 60).unwrap();
    graph
        .add_high_level_edge("<Alice>", "kind", Some("<Bob>"), 60)
        .unwrap();
    graph.add_high_level_edge("<Bob>", "kind", None, 60).unwrap();
    assert_eq!(graph.edge_count(), 3);
}

// === Appearance-based merge ===

#[test]
fn matching_appearance_merges_into_generic_character() {
    let embeddings = service_with(&[
        ("tall person in a red jacket", vec![0.9, 0.1, 0.0]),
        ("tall person wearing red", vec![0.88, 0.12, 0.01]),
    ]);
    let mut graph = VideoGraph::new();
    graph.add_character("character_1");

    let mut appearance: AppearanceMap = HashMap::new();
    appearance.insert(
        "<character_1>".to_string(),
        "tall person in a red jacket".to_string(),
    );
    appearance.insert("<Anna>".to_string(), "tall person wearing red".to_string());

    graph.insert_triples(
        &[json!(["<Anna>", "enters", null])],
        3,
        "gym",
        &embeddings,
        Some(&mut appearance),
    );

    assert!(graph.get_character("<character_1>").is_none());
    assert!(graph.get_character("<Anna>").is_some());
    assert!(!appearance.contains_key("<character_1>"));
    assert!(appearance.contains_key("<Anna>"));
    // robot + Anna only: no extra character was created.
    assert_eq!(graph.character_count(), 2);
    graph.assert_invariants();
}

#[test]
fn dissimilar_appearance_creates_a_new_character() {
    let embeddings = service_with(&[
        ("short person in blue", vec![0.0, 0.2, 0.95]),
        ("tall person wearing red", vec![0.88, 0.12, 0.01]),
    ]);
    let mut graph = VideoGraph::new();
    graph.add_character("character_1");

    let mut appearance: AppearanceMap = HashMap::new();
    appearance.insert("<character_1>".to_string(), "short person in blue".to_string());
    appearance.insert("<Anna>".to_string(), "tall person wearing red".to_string());

    graph.insert_triples(
        &[json!(["<Anna>", "enters", null])],
        3,
        "gym",
        &embeddings,
        Some(&mut appearance),
    );

    assert!(graph.get_character("<character_1>").is_some());
    assert!(graph.get_character("<Anna>").is_some());
    assert!(appearance.contains_key("<character_1>"));
    assert_eq!(graph.character_count(), 3);
}

#[test]
fn appearance_features_become_attribute_edges() {
    let mut graph = VideoGraph::new();
    graph.add_character("Anna");

    let mut appearance: AppearanceMap = HashMap::new();
    appearance.insert(
        "<Anna>".to_string(),
        "tall, red jacket, , short hair".to_string(),
    );
    let added = graph.insert_character_appearances(&appearance);
    assert_eq!(added, 3);

    let contents: Vec<&str> = graph.edges().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["tall", "red jacket", "short hair"]);
    for edge in graph.edges() {
        assert!(edge.is_high_level());
        assert_eq!(edge.confidence, Some(100));
        assert_eq!(edge.target, None);
    }

    // Re-running is a no-op under high-level dedup.
    assert_eq!(graph.insert_character_appearances(&appearance), 0);
}

// === Conversations ===

#[test]
fn update_conversation_opens_and_continues() {
    let embeddings = service();
    let mut graph = VideoGraph::new();

    let first = graph
        .update_conversation(
            5,
            &[
                ("<Alice>".to_string(), "hello".to_string()),
                ("<Bob>".to_string(), "hi".to_string()),
            ],
            false,
            &embeddings,
        )
        .unwrap();
    assert_eq!(graph.current_conversation(), Some(first));

    let second = graph
        .update_conversation(
            6,
            &[("<Alice>".to_string(), "how are you".to_string())],
            true,
            &embeddings,
        )
        .unwrap();
    assert_eq!(first, second);

    let conversation = graph.conversation(first).unwrap();
    assert_eq!(conversation.clips, vec![5, 6]);
    assert_eq!(conversation.messages.len(), 3);
    assert_eq!(conversation.speakers().len(), 2);
    for message in &conversation.messages {
        assert!(message.embedding.is_some());
    }
}

#[test]
fn continuation_deduplicates_by_speaker_and_content() {
    let embeddings = service();
    let mut graph = VideoGraph::new();

    let id = graph
        .update_conversation(
            1,
            &[("<Alice>".to_string(), "hello".to_string())],
            false,
            &embeddings,
        )
        .unwrap();
    graph.update_conversation(
        2,
        &[
            ("<Alice>".to_string(), "hello".to_string()),
            ("<Bob>".to_string(), "hello".to_string()),
        ],
        true,
        &embeddings,
    );

    let conversation = graph.conversation(id).unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.clips, vec![1, 2]);
}

#[test]
fn non_continuation_opens_a_new_conversation() {
    let embeddings = service();
    let mut graph = VideoGraph::new();

    let first = graph
        .update_conversation(
            1,
            &[("<Alice>".to_string(), "hello".to_string())],
            false,
            &embeddings,
        )
        .unwrap();
    let second = graph
        .update_conversation(
            4,
            &[("<Bob>".to_string(), "good morning".to_string())],
            false,
            &embeddings,
        )
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(graph.current_conversation(), Some(second));
}

#[test]
fn empty_messages_are_a_noop() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    assert!(graph.update_conversation(1, &[], false, &embeddings).is_none());
    assert!(graph.conversations().next().is_none());
}

#[test]
fn degraded_embeddings_store_none_messages() {
    let embeddings = EmbeddingService::new(Box::new(FailingEmbedder));
    let mut graph = VideoGraph::new();
    let id = graph
        .update_conversation(
            1,
            &[("<Alice>".to_string(), "hello".to_string())],
            false,
            &embeddings,
        )
        .unwrap();
    let conversation = graph.conversation(id).unwrap();
    assert_eq!(conversation.messages[0].embedding, None);
}

// === Connectivity ===

#[test]
fn connected_edges_include_direct_relations() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.add_character("Bob");
    graph.insert_triples(
        &[json!(["<Alice>", "talks to", "<Bob>"])],
        1,
        "office",
        &embeddings,
        None,
    );

    let connected = graph.connected_edges("Alice", "Bob").unwrap();
    assert_eq!(connected.len(), 1);
}

#[test]
fn connected_edges_follow_shared_objects_within_window() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.add_character("Bob");
    graph.insert_triples(
        &[json!(["<Alice>", "puts down", "cup"])],
        2,
        "kitchen",
        &embeddings,
        None,
    );
    graph.insert_triples(
        &[json!(["<Bob>", "picks up", "cup"])],
        4,
        "kitchen",
        &embeddings,
        None,
    );
    // Too far in time: clip 2 vs clip 9.
    graph.insert_triples(
        &[json!(["<Bob>", "washes", "cup"])],
        9,
        "kitchen",
        &embeddings,
        None,
    );

    let connected = graph.connected_edges("Alice", "Bob").unwrap();
    assert_eq!(connected.len(), 2, "both halves of the close pair, not the late one");
    let contents: Vec<&str> = connected
        .iter()
        .map(|id| graph.edge(*id).unwrap().content.as_str())
        .collect();
    assert!(contents.contains(&"puts down"));
    assert!(contents.contains(&"picks up"));
}

#[test]
fn connected_edges_require_known_characters() {
    let graph = VideoGraph::new();
    let err = graph.connected_edges("<robot>", "<Eve>").unwrap_err();
    assert!(matches!(err, GraphError::UnknownCharacter(name) if name == "<Eve>"));
}

// === Embedding backfill ===

#[test]
fn populate_embeddings_fills_missing_vectors_in_batches() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.insert_triples(
        &[
            json!(["<Alice>", "picks up", "coffee"]),
            json!(["coffee", "is on", "table"]),
        ],
        1,
        "kitchen",
        &embeddings,
        None,
    );

    graph.populate_node_embeddings(&embeddings);
    graph.populate_edge_embeddings(&embeddings);

    for character in graph.characters() {
        assert!(character.embedding.is_some(), "{} missing vector", character.name);
    }
    for object in graph.objects() {
        assert!(object.embedding.is_some(), "{} missing vector", object.name);
    }
    for edge in graph.edges() {
        assert!(edge.embedding.is_some(), "edge {} missing vector", edge.id);
    }
}

#[test]
fn populate_embeddings_degrades_quietly_on_backend_failure() {
    let working = service();
    let failing = EmbeddingService::new(Box::new(FailingEmbedder));
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.insert_triples(
        &[json!(["<Alice>", "waves", null])],
        1,
        "hall",
        &working,
        None,
    );

    graph.populate_node_embeddings(&failing);
    graph.populate_edge_embeddings(&failing);

    assert!(graph.get_character("<Alice>").unwrap().embedding.is_none());
    assert!(graph.edges().next().unwrap().embedding.is_none());
}

// === Degrees ===

#[test]
fn node_degrees_count_both_directions() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.insert_triples(
        &[
            json!(["<Alice>", "picks up", "coffee"]),
            json!(["coffee", "is on", "table"]),
            json!(["<Alice>", "wipes", "table"]),
        ],
        1,
        "kitchen",
        &embeddings,
        None,
    );

    let degrees = graph.node_degrees();
    assert_eq!(degrees["<Alice>"], 2);
    assert_eq!(degrees["coffee"], 2);
    assert_eq!(degrees["table"], 2);
}

// === Derived state ===

#[test]
fn rebuild_indexes_restores_adjacency() {
    let embeddings = service();
    let mut graph = VideoGraph::new();
    graph.add_character("Alice");
    graph.insert_triples(
        &[json!(["<Alice>", "holds", "cup"])],
        1,
        "kitchen",
        &embeddings,
        None,
    );
    graph.add_high_level_edge("<Alice>", "kind", None, 70).unwrap();

    // Serde drops the derived indexes; rebuild must restore them.
    let json = serde_json::to_string(&graph).unwrap();
    let mut restored: VideoGraph = serde_json::from_str(&json).unwrap();
    assert!(restored.edges_from("<Alice>").is_empty());
    restored.rebuild_indexes();

    assert_eq!(restored.edges_from("<Alice>"), graph.edges_from("<Alice>"));
    assert_eq!(restored.edges_to("cup"), graph.edges_to("cup"));
    // The dedup index is live again.
    assert!(restored
        .add_high_level_edge("<Alice>", "kind", None, 60)
        .unwrap()
        .is_none());
    restored.assert_invariants();
}
