//! EntityReader: reads all nodes/edges of a graph, filters to
//! user-defined typed entities, and optionally enriches each with 1-hop context.

use std::collections::HashSet;
use std::sync::Arc;

use sim_providers::{call_with_retry, GraphClient, GraphEdge, GraphNode, RetryPolicy};

use crate::error::Result;

/// Labels considered generic graph bookkeeping rather than a real entity type.
const GENERIC_LABELS: &[&str] = &["Entity", "Node", "GraphNode"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

/// Minimal descriptor of the node at the opposite end of an enriched edge.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub uuid: String,
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EnrichedEdge {
    pub direction: EdgeDirection,
    pub relation: String,
    pub fact: Option<String>,
    pub other: EndpointDescriptor,
}

#[derive(Debug, Clone)]
pub struct FilteredEntity {
    pub uuid: String,
    pub name: String,
    pub labels: Vec<String>,
    /// First label matching `defined_types`, else the first custom (non-generic) label.
    pub entity_type: String,
    pub summary: Option<String>,
    pub attributes: serde_json::Value,
    #[allow(clippy::vec_box)]
    pub edges: Vec<EnrichedEdge>,
}

#[derive(Debug, Clone, Default)]
pub struct FilteredEntities {
    pub entities: Vec<FilteredEntity>,
    pub entity_types_seen: Vec<String>,
    pub total_count: usize,
    pub filtered_count: usize,
}

pub struct EntityReader {
    graph: Arc<dyn GraphClient>,
    retry_policy: RetryPolicy,
}

impl EntityReader {
    pub fn new(graph: Arc<dyn GraphClient>) -> Self {
        Self {
            graph,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub async fn filter_defined(
        &self,
        graph_id: &str,
        defined_types: Option<&[String]>,
        enrich: bool,
    ) -> Result<FilteredEntities> {
        let nodes = call_with_retry(&self.retry_policy, || self.graph.fetch_nodes(graph_id)).await?;
        let total_count = nodes.len();

        let defined: Option<HashSet<&str>> =
            defined_types.map(|types| types.iter().map(String::as_str).collect());

        let mut entities: Vec<FilteredEntity> = Vec::new();
        let mut entity_types_seen: HashSet<String> = HashSet::new();

        for node in &nodes {
            let custom_labels: Vec<&String> = node
                .labels
                .iter()
                .filter(|l| !GENERIC_LABELS.contains(&l.as_str()))
                .collect();
            if custom_labels.is_empty() {
                continue;
            }

            let entity_type = match &defined {
                Some(wanted) => {
                    let matched = node.labels.iter().find(|l| wanted.contains(l.as_str()));
                    match matched {
                        Some(label) => label.clone(),
                        None => continue,
                    }
                }
                None => custom_labels[0].clone(),
            };

            entity_types_seen.insert(entity_type.clone());
            entities.push(FilteredEntity {
                uuid: node.uuid.clone(),
                name: node.name.clone(),
                labels: node.labels.clone(),
                entity_type,
                summary: node.summary.clone(),
                attributes: node.attributes.clone(),
                edges: Vec::new(),
            });
        }

        if enrich && !entities.is_empty() {
            let edges = call_with_retry(&self.retry_policy, || self.graph.fetch_edges(graph_id)).await?;
            let by_uuid: std::collections::HashMap<&str, &GraphNode> =
                nodes.iter().map(|n| (n.uuid.as_str(), n)).collect();
            for entity in &mut entities {
                entity.edges = enrich_entity(&entity.uuid, &edges, &by_uuid);
            }
        }

        let filtered_count = entities.len();
        Ok(FilteredEntities {
            entities,
            entity_types_seen: entity_types_seen.into_iter().collect(),
            total_count,
            filtered_count,
        })
    }
}

fn enrich_entity(
    uuid: &str,
    edges: &[GraphEdge],
    by_uuid: &std::collections::HashMap<&str, &GraphNode>,
) -> Vec<EnrichedEdge> {
    let mut enriched = Vec::new();
    for edge in edges {
        let (direction, other_uuid) = if edge.source_uuid == uuid {
            (EdgeDirection::Outgoing, edge.target_uuid.as_str())
        } else if edge.target_uuid == uuid {
            (EdgeDirection::Incoming, edge.source_uuid.as_str())
        } else {
            continue;
        };
        let other = match by_uuid.get(other_uuid) {
            Some(node) => EndpointDescriptor {
                uuid: node.uuid.clone(),
                name: node.name.clone(),
                labels: node.labels.clone(),
            },
            None => EndpointDescriptor {
                uuid: other_uuid.to_string(),
                name: other_uuid.to_string(),
                labels: Vec::new(),
            },
        };
        enriched.push(EnrichedEdge {
            direction,
            relation: edge.relation.clone(),
            fact: edge.fact.clone(),
            other,
        });
    }
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_providers::InMemoryGraphClient;

    fn node(uuid: &str, name: &str, labels: &[&str]) -> GraphNode {
        GraphNode {
            uuid: uuid.to_string(),
            name: name.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            summary: None,
            attributes: serde_json::json!({}),
        }
    }

    fn edge(uuid: &str, source: &str, target: &str, relation: &str, fact: &str) -> GraphEdge {
        GraphEdge {
            uuid: uuid.to_string(),
            source_uuid: source.to_string(),
            target_uuid: target.to_string(),
            relation: relation.to_string(),
            fact: Some(fact.to_string()),
            valid_at: None,
            invalid_at: None,
        }
    }

    #[tokio::test]
    async fn discards_nodes_with_only_generic_labels() {
        let client = Arc::new(InMemoryGraphClient::new());
        let graph_id = client.create_graph("g").await.unwrap();
        client.seed_nodes(
            &graph_id,
            vec![node("a", "Alice", &["Entity", "Person"]), node("b", "Bookkeeping", &["Entity", "Node"])],
        );
        let reader = EntityReader::new(client);
        let result = reader.filter_defined(&graph_id, None, false).await.unwrap();
        assert_eq!(result.total_count, 2);
        assert_eq!(result.filtered_count, 1);
        assert_eq!(result.entities[0].uuid, "a");
    }

    #[tokio::test]
    async fn keeps_only_nodes_matching_defined_types() {
        let client = Arc::new(InMemoryGraphClient::new());
        let graph_id = client.create_graph("g").await.unwrap();
        client.seed_nodes(
            &graph_id,
            vec![
                node("a", "Alice", &["Entity", "Person"]),
                node("b", "Acme", &["Entity", "Organization"]),
            ],
        );
        let reader = EntityReader::new(client);
        let result = reader
            .filter_defined(&graph_id, Some(&["Organization".to_string()]), false)
            .await
            .unwrap();
        assert_eq!(result.filtered_count, 1);
        assert_eq!(result.entities[0].entity_type, "Organization");
    }

    #[tokio::test]
    async fn enrich_attaches_one_hop_edges_with_opposite_endpoint() {
        let client = Arc::new(InMemoryGraphClient::new());
        let graph_id = client.create_graph("g").await.unwrap();
        client.seed_nodes(
            &graph_id,
            vec![node("a", "Alice", &["Entity", "Person"]), node("b", "Acme", &["Entity", "Organization"])],
        );
        client.seed_edges(&graph_id, vec![edge("e1", "a", "b", "WORKS_FOR", "Alice works for Acme")]);
        let reader = EntityReader::new(client);
        let result = reader.filter_defined(&graph_id, None, true).await.unwrap();
        let alice = result.entities.iter().find(|e| e.uuid == "a").unwrap();
        assert_eq!(alice.edges.len(), 1);
        assert_eq!(alice.edges[0].direction, EdgeDirection::Outgoing);
        assert_eq!(alice.edges[0].other.uuid, "b");
    }
}
