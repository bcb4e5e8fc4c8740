//! GraphBuilder: creates a graph, registers an ontology, ingests
//! chunked episodes in batches, waits for backend processing, and returns a
//! node/edge snapshot.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sim_providers::{call_with_retry, EpisodeId, GraphClient, RetryPolicy};
use sim_types::domain::ontology::Ontology;

use crate::chunk::split_text;
use crate::error::{Error, Result};
use crate::ontology_normalize;

/// How to handle a chunk ingestion failure after some episodes already succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialFailurePolicy {
    /// Delete every episode ingested so far and fail the task.
    #[default]
    AbortAndRollback,
    /// Keep whatever was ingested and surface the error with the partial counts.
    KeepPartial,
}

#[derive(Debug, Clone)]
pub struct GraphBuildParams {
    pub graph_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub processing_timeout: Duration,
    pub poll_interval: Duration,
    pub batch_spacing: Duration,
    pub partial_failure_policy: PartialFailurePolicy,
}

impl Default for GraphBuildParams {
    fn default() -> Self {
        Self {
            graph_name: "simulation-graph".to_string(),
            chunk_size: 1000,
            chunk_overlap: 100,
            batch_size: 10,
            processing_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(3),
            batch_spacing: Duration::from_secs(1),
            partial_failure_policy: PartialFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphBuildResult {
    pub graph_id: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub entity_types: Vec<String>,
}

/// Invoked with `(percent, message)` as the build progresses.
pub type ProgressCallback<'a> = dyn FnMut(u8, &str) + Send + 'a;

pub struct GraphBuilder {
    graph: Arc<dyn GraphClient>,
    retry_policy: RetryPolicy,
}

impl GraphBuilder {
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

    pub async fn build(
        &self,
        ontology: Ontology,
        text: &str,
        params: &GraphBuildParams,
        mut on_progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<GraphBuildResult> {
        let mut report = |pct: u8, msg: &str| {
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(pct, msg);
            }
        };

        let ontology = ontology_normalize::normalize(ontology);

        report(5, "creating graph");
        let graph_id = call_with_retry(&self.retry_policy, || self.graph.create_graph(&params.graph_name))
            .await?;
        info!(%graph_id, "graph created");
        report(10, "graph created");

        report(12, "registering ontology");
        call_with_retry(&self.retry_policy, || self.graph.set_ontology(&graph_id, &ontology))
            .await?;
        report(15, "ontology registered");

        let chunks = split_text(text, params.chunk_size, params.chunk_overlap);
        report(15, &format!("split into {} chunks", chunks.len()));

        let mut episodes: Vec<EpisodeId> = Vec::with_capacity(chunks.len());
        let total_chunks = chunks.len().max(1);

        for (batch_index, batch) in chunks.chunks(params.batch_size.max(1)).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(params.batch_spacing).await;
            }
            for (offset, chunk) in batch.iter().enumerate() {
                let chunk_index = batch_index * params.batch_size.max(1) + offset;
                let outcome =
                    call_with_retry(&self.retry_policy, || self.graph.add_episode(&graph_id, chunk)).await;
                match outcome {
                    Ok(episode) => episodes.push(episode),
                    Err(err) => {
                        return self
                            .handle_ingestion_failure(&graph_id, episodes, chunk_index, err, params)
                            .await;
                    }
                }
            }
            let ingested = ((batch_index + 1) * params.batch_size.max(1)).min(total_chunks);
            let pct = 15 + ((ingested as f64 / total_chunks as f64) * 40.0) as u8;
            report(pct.min(55), &format!("ingested {ingested}/{total_chunks} chunks"));
        }

        self.wait_for_processing(&graph_id, &episodes, params, &mut report)
            .await?;

        report(90, "fetching graph snapshot");
        let nodes = call_with_retry(&self.retry_policy, || self.graph.fetch_nodes(&graph_id)).await?;
        let edges = call_with_retry(&self.retry_policy, || self.graph.fetch_edges(&graph_id)).await?;
        report(100, "graph build complete");

        Ok(GraphBuildResult {
            graph_id,
            node_count: nodes.len(),
            edge_count: edges.len(),
            entity_types: ontology.entity_type_names().into_iter().map(String::from).collect(),
        })
    }

    async fn handle_ingestion_failure(
        &self,
        graph_id: &str,
        episodes: Vec<EpisodeId>,
        chunk_index: usize,
        err: sim_providers::Error,
        params: &GraphBuildParams,
    ) -> Result<GraphBuildResult> {
        warn!(%graph_id, chunk_index, %err, "chunk ingestion exhausted retries");
        match params.partial_failure_policy {
            PartialFailurePolicy::AbortAndRollback => {
                for episode in &episodes {
                    if let Err(delete_err) = self.graph.delete_episode(graph_id, episode).await {
                        warn!(%graph_id, %delete_err, "failed to roll back episode");
                    }
                }
                Err(Error::IngestionFailed {
                    graph_id: graph_id.to_string(),
                    chunk_index,
                    source: err.to_string(),
                })
            }
            PartialFailurePolicy::KeepPartial => {
                let nodes = self.graph.fetch_nodes(graph_id).await.unwrap_or_default();
                let edges = self.graph.fetch_edges(graph_id).await.unwrap_or_default();
                warn!(
                    %graph_id,
                    node_count = nodes.len(),
                    edge_count = edges.len(),
                    "keeping partially ingested graph after failure"
                );
                Err(Error::IngestionFailed {
                    graph_id: graph_id.to_string(),
                    chunk_index,
                    source: err.to_string(),
                })
            }
        }
    }

    async fn wait_for_processing(
        &self,
        graph_id: &str,
        episodes: &[EpisodeId],
        params: &GraphBuildParams,
        report: &mut impl FnMut(u8, &str),
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + params.processing_timeout;
        let mut pending: Vec<&EpisodeId> = episodes.iter().collect();

        while !pending.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::ProcessingTimeout {
                    graph_id: graph_id.to_string(),
                });
            }

            let mut still_pending = Vec::new();
            for episode in pending {
                match self.graph.episode_processed(graph_id, episode).await {
                    Ok(true) => {}
                    Ok(false) => still_pending.push(episode),
                    Err(err) => {
                        warn!(%graph_id, %err, "error polling episode status, treating as pending");
                        still_pending.push(episode);
                    }
                }
            }
            let done = episodes.len() - still_pending.len();
            let pct = 55 + ((done as f64 / episodes.len().max(1) as f64) * 35.0) as u8;
            report(pct.min(90), &format!("processed {done}/{} episodes", episodes.len()));

            pending = still_pending;
            if !pending.is_empty() {
                tokio::time::sleep(params.poll_interval).await;
            }
        }

        Ok(())
    }
}
