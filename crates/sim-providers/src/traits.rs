//! Pluggable external collaborators: ontology
//! inference, LLM prompting, graph backend access, and document text extraction. Each
//! trait models the contract the core needs; production callers provide real
//! HTTP-backed implementations, and `sim-providers::default` ships enough of a
//! rule-based/in-memory stand-in to exercise the orchestration logic and tests.

use async_trait::async_trait;
use serde_json::Value;
use sim_types::domain::ontology::Ontology;
use std::collections::HashMap;

use crate::error::Result;

/// A node in the backing graph store, as returned by [`GraphClient::fetch_nodes`].
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub uuid: String,
    pub name: String,
    pub labels: Vec<String>,
    pub summary: Option<String>,
    pub attributes: Value,
}

/// An edge (fact) between two nodes, as returned by [`GraphClient::fetch_edges`].
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub uuid: String,
    pub source_uuid: String,
    pub target_uuid: String,
    pub relation: String,
    pub fact: Option<String>,
    pub valid_at: Option<String>,
    pub invalid_at: Option<String>,
}

/// Opaque handle to one ingested text chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EpisodeId(pub String);

/// OntologyService. Consumer contract only:
/// the core validates/normalizes whatever this returns.
#[async_trait]
pub trait OntologyService: Send + Sync {
    async fn generate(
        &self,
        document_texts: &[String],
        requirement: &str,
        context: Option<&str>,
    ) -> Result<Ontology>;
}

/// A single LLM completion call, shared by ontology generation, profile synthesis,
/// config synthesis, and report writing.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// `temperature` is explicit per-call since the repair ladder lowers it across
    /// retries (0.7 -> 0.5 -> 0.3).
    async fn complete_json(&self, prompt: &str, temperature: f64) -> Result<String>;
}

/// GraphClient.
#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn create_graph(&self, name: &str) -> Result<String>;

    async fn set_ontology(&self, graph_id: &str, ontology: &Ontology) -> Result<()>;

    /// Ingests one chunk as an episode, returning its id for later polling/rollback.
    async fn add_episode(&self, graph_id: &str, chunk: &str) -> Result<EpisodeId>;

    /// `true` once the backend has finished processing the episode into graph data.
    async fn episode_processed(&self, graph_id: &str, episode: &EpisodeId) -> Result<bool>;

    /// Used by `PartialFailurePolicy::AbortAndRollback`.
    async fn delete_episode(&self, graph_id: &str, episode: &EpisodeId) -> Result<()>;

    async fn fetch_nodes(&self, graph_id: &str) -> Result<Vec<GraphNode>>;

    async fn fetch_edges(&self, graph_id: &str) -> Result<Vec<GraphEdge>>;

    /// Semantic search by name, used by the enrichment step; returns matching node
    /// uuids ranked by relevance.
    async fn search_nodes(&self, graph_id: &str, query: &str, limit: usize) -> Result<Vec<String>>;

    async fn search_edges(&self, graph_id: &str, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Upserts one entity by `(graph_id, name)`: existing nodes are updated in place, new ones created with the
    /// given labels merged onto `GraphNode`.
    async fn upsert_node(&self, graph_id: &str, name: &str, labels: &[String], attributes: Value) -> Result<()>;
}

/// Extracts plain text from an uploaded document. Given a saved file path,
/// returns its extracted text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &std::path::Path) -> Result<String>;

    /// Extensions this extractor accepts, lowercase without the leading dot.
    fn supported_extensions(&self) -> &'static [&'static str];
}

pub type AttributeRemapIndex = HashMap<(String, String), String>;
