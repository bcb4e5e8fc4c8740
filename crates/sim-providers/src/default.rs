//! Rule-based/in-memory default implementations of the collaborator traits, good
//! enough to exercise the orchestration logic and tests without a real LLM/graph backend.

use async_trait::async_trait;
use sim_types::domain::ontology::{
    AttributeDescriptor, EdgeType, EntityType, Ontology, TypePair, FALLBACK_ENTITY_TYPES,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::traits::{EpisodeId, GraphClient, GraphEdge, GraphNode, LlmClient, OntologyService, TextExtractor};

/// Produces the two fallback entity types plus a generic `RelatedTo` edge, ignoring
/// `document_texts`/`requirement` entirely.
#[derive(Debug, Default)]
pub struct RuleBasedOntologyService;

#[async_trait]
impl OntologyService for RuleBasedOntologyService {
    async fn generate(
        &self,
        _document_texts: &[String],
        _requirement: &str,
        _context: Option<&str>,
    ) -> Result<Ontology> {
        let entity_types = FALLBACK_ENTITY_TYPES
            .iter()
            .map(|name| EntityType {
                name: name.to_string(),
                description: format!("A {name} mentioned in the source material."),
                attributes: vec![AttributeDescriptor {
                    name: "description".to_string(),
                    description: "Free-text description.".to_string(),
                }],
            })
            .collect();

        let edge_types = vec![EdgeType {
            name: "RelatedTo".to_string(),
            description: "A generic relation between two entities.".to_string(),
            attributes: Vec::new(),
            type_pairs: vec![TypePair {
                source: "Person".to_string(),
                target: "Organization".to_string(),
            }],
        }];

        Ok(Ontology::new(entity_types, edge_types))
    }
}

/// Returns a fixed JSON document regardless of prompt; useful as a test double for
/// `sim-profile`/`sim-report` and as a degenerate production fallback when no LLM is
/// configured.
#[derive(Debug, Clone)]
pub struct EchoLlmClient {
    pub response: String,
}

impl EchoLlmClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn complete_json(&self, _prompt: &str, _temperature: f64) -> Result<String> {
        Ok(self.response.clone())
    }
}

/// Always fails, simulating an LLM backend that is not configured so callers exercise
/// their rule-based fallback path.
#[derive(Debug, Default)]
pub struct UnavailableLlmClient;

#[async_trait]
impl LlmClient for UnavailableLlmClient {
    async fn complete_json(&self, _prompt: &str, _temperature: f64) -> Result<String> {
        Err(Error::Collaborator("no LLM backend configured".to_string()))
    }
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<String, Vec<GraphNode>>,
    edges: HashMap<String, Vec<GraphEdge>>,
    ontologies: HashMap<String, Ontology>,
    episodes: HashMap<String, Vec<EpisodeId>>,
}

/// A process-local graph backend good enough for tests and for exercising
/// `GraphBuilder`/`EntityReader` without a real database. Episodes are considered
/// processed immediately.
#[derive(Default)]
pub struct InMemoryGraphClient {
    state: Mutex<GraphState>,
}

impl InMemoryGraphClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/seed helper: directly inject nodes for a graph, bypassing ingestion.
    pub fn seed_nodes(&self, graph_id: &str, nodes: Vec<GraphNode>) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .entry(graph_id.to_string())
            .or_default()
            .extend(nodes);
    }

    pub fn seed_edges(&self, graph_id: &str, edges: Vec<GraphEdge>) {
        self.state
            .lock()
            .unwrap()
            .edges
            .entry(graph_id.to_string())
            .or_default()
            .extend(edges);
    }
}

#[async_trait]
impl GraphClient for InMemoryGraphClient {
    async fn create_graph(&self, name: &str) -> Result<String> {
        let id = format!("{name}-{}", uuid::Uuid::new_v4());
        let mut state = self.state.lock().unwrap();
        state.nodes.entry(id.clone()).or_default();
        state.edges.entry(id.clone()).or_default();
        Ok(id)
    }

    async fn set_ontology(&self, graph_id: &str, ontology: &Ontology) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .ontologies
            .insert(graph_id.to_string(), ontology.clone());
        Ok(())
    }

    async fn add_episode(&self, graph_id: &str, chunk: &str) -> Result<EpisodeId> {
        let episode = EpisodeId(uuid::Uuid::new_v4().to_string());
        let mut state = self.state.lock().unwrap();
        state
            .episodes
            .entry(graph_id.to_string())
            .or_default()
            .push(episode.clone());
        state
            .nodes
            .entry(graph_id.to_string())
            .or_default()
            .push(GraphNode {
                uuid: episode.0.clone(),
                name: format!("chunk-{}", episode.0),
                labels: vec!["Entity".to_string()],
                summary: Some(chunk.chars().take(80).collect()),
                attributes: serde_json::json!({}),
            });
        Ok(episode)
    }

    async fn episode_processed(&self, _graph_id: &str, _episode: &EpisodeId) -> Result<bool> {
        Ok(true)
    }

    async fn delete_episode(&self, graph_id: &str, episode: &EpisodeId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(nodes) = state.nodes.get_mut(graph_id) {
            nodes.retain(|n| n.uuid != episode.0);
        }
        if let Some(episodes) = state.episodes.get_mut(graph_id) {
            episodes.retain(|e| e != episode);
        }
        Ok(())
    }

    async fn fetch_nodes(&self, graph_id: &str) -> Result<Vec<GraphNode>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nodes
            .get(graph_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_edges(&self, graph_id: &str) -> Result<Vec<GraphEdge>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .edges
            .get(graph_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn search_nodes(&self, graph_id: &str, query: &str, limit: usize) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .get(graph_id)
            .into_iter()
            .flatten()
            .filter(|n| n.name.to_lowercase().contains(&query.to_lowercase()))
            .take(limit)
            .map(|n| n.uuid.clone())
            .collect())
    }

    async fn search_edges(&self, graph_id: &str, query: &str, limit: usize) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .edges
            .get(graph_id)
            .into_iter()
            .flatten()
            .filter(|e| {
                e.fact
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&query.to_lowercase())
            })
            .take(limit)
            .map(|e| e.uuid.clone())
            .collect())
    }

    async fn upsert_node(&self, graph_id: &str, name: &str, labels: &[String], attributes: Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let nodes = state.nodes.entry(graph_id.to_string()).or_default();
        if let Some(existing) = nodes.iter_mut().find(|n| n.name == name) {
            for label in labels {
                if !existing.labels.contains(label) {
                    existing.labels.push(label.clone());
                }
            }
            existing.attributes = attributes;
        } else {
            let mut node_labels = vec!["Entity".to_string()];
            node_labels.extend(labels.iter().cloned());
            nodes.push(GraphNode {
                uuid: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                labels: node_labels,
                summary: None,
                attributes,
            });
        }
        Ok(())
    }
}

/// Reads `.txt`/`.md`/`.markdown` files verbatim (lossy UTF-8). PDF extraction is a
/// genuine external collaborator with no in-repo default.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !self.supported_extensions().contains(&ext.as_str()) {
            return Err(Error::Collaborator(format!(
                "unsupported file extension: {ext}"
            )));
        }
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["txt", "md", "markdown"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rule_based_ontology_service_yields_both_fallback_types() {
        let service = RuleBasedOntologyService;
        let ontology = service.generate(&[], "", None).await.unwrap();
        assert_eq!(ontology.entity_type_names(), vec!["Person", "Organization"]);
    }

    #[tokio::test]
    async fn in_memory_graph_client_round_trips_an_episode() {
        let client = InMemoryGraphClient::new();
        let graph_id = client.create_graph("test-graph").await.unwrap();
        let episode = client.add_episode(&graph_id, "hello world").await.unwrap();
        assert!(client.episode_processed(&graph_id, &episode).await.unwrap());
        let nodes = client.fetch_nodes(&graph_id).await.unwrap();
        assert_eq!(nodes.len(), 1);

        client.delete_episode(&graph_id, &episode).await.unwrap();
        let nodes_after = client.fetch_nodes(&graph_id).await.unwrap();
        assert!(nodes_after.is_empty());
    }

    #[tokio::test]
    async fn plain_text_extractor_rejects_unsupported_extension() {
        let extractor = PlainTextExtractor;
        let result = extractor.extract(Path::new("file.pdf")).await;
        assert!(result.is_err());
    }
}
