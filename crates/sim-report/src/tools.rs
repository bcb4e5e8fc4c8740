//! The four search/interview tools a report section's ReACT loop may invoke.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sim_providers::{GraphClient, LlmClient};
use sim_runtime::IpcClient;

use crate::error::Result;

pub const TOOL_NAMES: [&str; 4] = ["insight_forge", "panorama_search", "quick_search", "interview_agents"];

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_SUB_QUERIES: usize = 5;

pub fn tool_descriptions() -> String {
    "\
insight_forge(query, report_context?): decomposes the query into up to 5 sub-queries, \
searches the graph for each, and returns facts, entities, and relationship chains.
panorama_search(query, include_expired=true): returns active vs historical facts, \
partitioned by the temporal validity of the underlying graph edges.
quick_search(query, limit): a single keyword-style graph search.
interview_agents(interview_topic, max_agents): selects simulated agents relevant to a \
topic, asks them questions over IPC, and returns their aggregated answers."
        .to_string()
}

pub struct ReportTools {
    graph: Arc<dyn GraphClient>,
    llm: Arc<dyn LlmClient>,
    ipc: Option<Arc<IpcClient>>,
    graph_id: String,
    simulation_id: String,
}

impl ReportTools {
    pub fn new(
        graph: Arc<dyn GraphClient>,
        llm: Arc<dyn LlmClient>,
        ipc: Option<Arc<IpcClient>>,
        graph_id: impl Into<String>,
        simulation_id: impl Into<String>,
    ) -> Self {
        Self { graph, llm, ipc, graph_id: graph_id.into(), simulation_id: simulation_id.into() }
    }

    pub async fn dispatch(&self, name: &str, args: &serde_json::Value) -> Result<String> {
        match name {
            "insight_forge" => {
                let query = args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                let context = args.get("report_context").and_then(|v| v.as_str());
                self.insight_forge(query, context).await
            }
            "panorama_search" => {
                let query = args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                let include_expired = args.get("include_expired").and_then(|v| v.as_bool()).unwrap_or(true);
                self.panorama_search(query, include_expired).await
            }
            "quick_search" => {
                let query = args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
                self.quick_search(query, limit).await
            }
            "interview_agents" => {
                let topic = args.get("interview_topic").and_then(|v| v.as_str()).unwrap_or_default();
                let max_agents = args.get("max_agents").and_then(|v| v.as_u64()).unwrap_or(3) as usize;
                self.interview_agents(topic, max_agents).await
            }
            other => Ok(format!("unknown tool: {other}")),
        }
    }

    async fn insight_forge(&self, query: &str, report_context: Option<&str>) -> Result<String> {
        let sub_queries = decompose(query, report_context, MAX_SUB_QUERIES);
        let mut lines = Vec::new();
        for sub_query in sub_queries {
            let (nodes, edges) = tokio::join!(
                tokio::time::timeout(SEARCH_TIMEOUT, self.graph.search_nodes(&self.graph_id, &sub_query, 10)),
                tokio::time::timeout(SEARCH_TIMEOUT, self.graph.search_edges(&self.graph_id, &sub_query, 10)),
            );
            let node_count = nodes.ok().and_then(|r| r.ok()).map(|v| v.len()).unwrap_or(0);
            let edge_count = edges.ok().and_then(|r| r.ok()).map(|v| v.len()).unwrap_or(0);
            lines.push(format!("- '{sub_query}': {node_count} related entities, {edge_count} relationship facts"));
        }
        Ok(format!("insight_forge results for '{query}':\n{}", lines.join("\n")))
    }

    async fn panorama_search(&self, query: &str, include_expired: bool) -> Result<String> {
        let edges = self.graph.fetch_edges(&self.graph_id).await?;
        let matching: Vec<_> = edges
            .into_iter()
            .filter(|e| e.fact.as_deref().unwrap_or_default().to_lowercase().contains(&query.to_lowercase()))
            .collect();
        let (active, historical): (Vec<_>, Vec<_>) = matching.into_iter().partition(|e| e.invalid_at.is_none());

        let mut out = format!("panorama_search for '{query}':\nActive facts ({}):\n", active.len());
        for edge in &active {
            out.push_str(&format!("- {}\n", edge.fact.clone().unwrap_or_default()));
        }
        if include_expired {
            out.push_str(&format!("\nHistorical facts ({}):\n", historical.len()));
            for edge in &historical {
                out.push_str(&format!("- {}\n", edge.fact.clone().unwrap_or_default()));
            }
        }
        Ok(out)
    }

    async fn quick_search(&self, query: &str, limit: usize) -> Result<String> {
        let hits = self.graph.search_nodes(&self.graph_id, query, limit).await?;
        Ok(format!("quick_search for '{query}': {} matching entities ({:?})", hits.len(), hits))
    }

    async fn interview_agents(&self, interview_topic: &str, max_agents: usize) -> Result<String> {
        let Some(ipc) = &self.ipc else {
            return Ok(format!("interview_agents unavailable: no live simulation to interview about '{interview_topic}'"));
        };

        let candidate_ids = self.graph.search_nodes(&self.graph_id, interview_topic, max_agents).await?;
        if candidate_ids.is_empty() {
            return Ok(format!("no agents found relevant to '{interview_topic}'"));
        }

        let question = self.generate_question(interview_topic).await;
        let interviews: Vec<serde_json::Value> = candidate_ids
            .iter()
            .map(|agent_id| serde_json::json!({ "agent_id": agent_id, "prompt": question }))
            .collect();

        let response = ipc
            .send(
                &self.simulation_id,
                sim_types::domain::ipc::IpcCommandType::BatchInterview,
                serde_json::json!({ "interviews": interviews }),
                SEARCH_TIMEOUT,
            )
            .await?;

        Ok(format!("interview_agents('{interview_topic}') responses:\n{}", response.result))
    }

    async fn generate_question(&self, topic: &str) -> String {
        let prompt = format!("Write one short interview question about: {topic}");
        self.llm
            .complete_json(&prompt, 0.5)
            .await
            .map(|raw| extract_question(&raw))
            .unwrap_or_else(|_| format!("What do you think about {topic}?"))
    }
}

#[derive(Debug, Deserialize, Default)]
struct QuestionPayload {
    #[serde(default)]
    question: String,
}

fn extract_question(raw: &str) -> String {
    serde_json::from_str::<QuestionPayload>(raw)
        .ok()
        .filter(|q| !q.question.trim().is_empty())
        .map(|q| q.question)
        .unwrap_or_else(|| raw.trim().to_string())
}

fn decompose(query: &str, report_context: Option<&str>, max: usize) -> Vec<String> {
    let mut queries = vec![query.to_string()];
    if let Some(context) = report_context {
        for word in context.split_whitespace().filter(|w| w.len() > 4).take(max - 1) {
            queries.push(format!("{query} {word}"));
        }
    }
    queries.truncate(max.max(1));
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_caps_at_max_sub_queries() {
        let context = "alpha bravo charlie delta echo foxtrot golf hotel";
        let queries = decompose("topic", Some(context), 3);
        assert_eq!(queries.len(), 3);
    }

    #[test]
    fn decompose_without_context_returns_only_the_original_query() {
        let queries = decompose("topic", None, 5);
        assert_eq!(queries, vec!["topic".to_string()]);
    }
}
