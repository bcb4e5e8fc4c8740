//! Sample data generation for `sim-runtime`/`sim-report` integration tests: a
//! temp-dir-backed `Store`, seeded agent profiles, and seeded graph nodes/edges.

use std::path::PathBuf;
use std::sync::Arc;

use sim_core::Store;
use sim_providers::{EchoLlmClient, GraphEdge, GraphNode, InMemoryGraphClient};
use sim_types::domain::profile::{AgentProfile, Gender};
use tempfile::TempDir;

/// A `Store` rooted in a fresh temp directory; keep the `TempDir` alive for as long as
/// the `Store` is used, or the directory is deleted out from under it.
pub fn temp_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("failed to create temp dir for test store");
    let store = Store::new(dir.path());
    (dir, store)
}

pub fn temp_store_at(root: impl Into<PathBuf>) -> Store {
    Store::new(root.into())
}

/// An `EchoLlmClient` that always returns `response`, for tests that don't care about
/// prompt content.
pub fn echo_llm(response: impl Into<String>) -> Arc<EchoLlmClient> {
    Arc::new(EchoLlmClient::new(response))
}

/// A fresh in-memory graph client with no seeded data.
pub fn blank_graph() -> Arc<InMemoryGraphClient> {
    Arc::new(InMemoryGraphClient::new())
}

/// A graph pre-populated with `names`, each tagged `["Entity", "Person"]`.
pub fn seeded_graph(graph_id: &str, names: &[&str]) -> Arc<InMemoryGraphClient> {
    let graph = InMemoryGraphClient::new();
    let nodes = names
        .iter()
        .enumerate()
        .map(|(i, name)| GraphNode {
            uuid: format!("node-{i}"),
            name: name.to_string(),
            labels: vec!["Entity".to_string(), "Person".to_string()],
            summary: None,
            attributes: serde_json::json!({}),
        })
        .collect();
    graph.seed_nodes(graph_id, nodes);
    Arc::new(graph)
}

/// One active and one historical fact between the first two seeded nodes, for tests
/// of `panorama_search`-style temporal partitioning.
pub fn seeded_edges(graph_id: &str, graph: &InMemoryGraphClient) {
    graph.seed_edges(
        graph_id,
        vec![
            GraphEdge {
                uuid: "edge-active".to_string(),
                source_uuid: "node-0".to_string(),
                target_uuid: "node-1".to_string(),
                relation: "TRUSTS".to_string(),
                fact: Some("Alice trusts Bob".to_string()),
                valid_at: Some("2026-01-01T00:00:00Z".to_string()),
                invalid_at: None,
            },
            GraphEdge {
                uuid: "edge-historical".to_string(),
                source_uuid: "node-0".to_string(),
                target_uuid: "node-1".to_string(),
                relation: "DISTRUSTED".to_string(),
                fact: Some("Alice used to distrust Bob".to_string()),
                valid_at: Some("2025-01-01T00:00:00Z".to_string()),
                invalid_at: Some("2025-06-01T00:00:00Z".to_string()),
            },
        ],
    );
}

/// A minimal but fully populated [`AgentProfile`], for tests that need one without
/// exercising `ProfileSynthesizer`.
pub fn sample_agent_profile(user_id: usize, user_name: impl Into<String>) -> AgentProfile {
    let user_name = user_name.into();
    AgentProfile {
        user_id,
        display_name: user_name.clone(),
        user_name,
        bio: "A test persona seeded for integration tests.".to_string(),
        persona: "curious, skeptical of corporate messaging".to_string(),
        age: 34,
        gender: Gender::Other,
        mbti: "INTJ".to_string(),
        country: "US".to_string(),
        profession: "engineer".to_string(),
        interests: vec!["technology".to_string(), "politics".to_string()],
        source_entity_uuid: format!("node-{user_id}"),
        source_entity_type: "Person".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_providers::GraphClient;

    #[tokio::test]
    async fn seeded_graph_contains_requested_names() {
        let graph = seeded_graph("g1", &["Alice", "Bob"]);
        let nodes = graph.fetch_nodes("g1").await.unwrap();
        assert_eq!(nodes.len(), 2);
    }
}
