//! Snapshots and the SQLite store through the public API

mod common;

use common::plain_embedding_service;
use kinograph::storage::snapshot;
use kinograph::{GraphStore, OpenStore, SearchStrategy, SqliteStore, VideoGraph};
use serde_json::json;

fn build_graph(embeddings: &kinograph::EmbeddingService) -> VideoGraph {
    let mut graph = VideoGraph::new();
    graph.add_character("Anna");
    graph.insert_triples(
        &[
            json!(["<Anna>", "picks up", "coffee"]),
            json!(["<Anna>", "stretches", null]),
        ],
        1,
        "kitchen",
        embeddings,
        None,
    );
    graph.add_high_level_edge("<Anna>", "diligent", None, 75).unwrap();
    graph.update_conversation(
        1,
        &[("<Anna>".to_string(), "good morning".to_string())],
        false,
        embeddings,
    );
    graph.populate_edge_embeddings(embeddings);
    graph
}

#[test]
fn snapshot_survives_and_searches_identically() {
    common::init_tracing();
    let embeddings = plain_embedding_service();
    let graph = build_graph(&embeddings);

    let bytes = snapshot::to_bytes(&graph).unwrap();
    let restored = snapshot::from_bytes(&bytes).unwrap();

    let strategy = SearchStrategy::from_json(&json!({
        "query_triples": [["<Anna>", "?", "coffee", 0.9, 0.2, 0.9]],
        "allocation": {"k_high_level": 5, "k_low_level": 5, "k_conversations": 0}
    }))
    .unwrap();

    let before = kinograph::search_with_strategy("coffee", &graph, &embeddings, &strategy);
    let after = kinograph::search_with_strategy("coffee", &restored, &embeddings, &strategy);
    assert_eq!(before, after, "a snapshot round trip must not change results");
    assert!(after.contains("picks up coffee"));
}

#[test]
fn sqlite_store_round_trips_through_mutation() {
    let embeddings = plain_embedding_service();
    let store = SqliteStore::open_in_memory().unwrap();

    let graph = build_graph(&embeddings);
    store.save_graph("office_01", &graph).unwrap();

    // Load, mutate, save again; the second load sees the mutation.
    let mut loaded = store.load_graph("office_01").unwrap().unwrap();
    loaded
        .insert_triples(
            &[json!(["<Anna>", "waters", "plant"])],
            2,
            "office",
            &embeddings,
            None,
        );
    store.save_graph("office_01", &loaded).unwrap();

    let reloaded = store.load_graph("office_01").unwrap().unwrap();
    assert_eq!(reloaded.edge_count(), graph.edge_count() + 1);
    assert!(reloaded.get_object("plant").is_some());
    assert!(reloaded.edges().any(|e| e.content == "waters"));
}

#[test]
fn store_keeps_graphs_separate() {
    let embeddings = plain_embedding_service();
    let store = SqliteStore::open_in_memory().unwrap();

    store.save_graph("a", &build_graph(&embeddings)).unwrap();
    store.save_graph("b", &VideoGraph::new()).unwrap();

    let a = store.load_graph("a").unwrap().unwrap();
    let b = store.load_graph("b").unwrap().unwrap();
    assert!(a.edge_count() > 0);
    assert_eq!(b.edge_count(), 0);
    assert_eq!(b.character_count(), 1);
}
