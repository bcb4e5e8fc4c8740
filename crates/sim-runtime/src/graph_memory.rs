//! GraphMemoryUpdater: single-producer/single-consumer pipeline
//! that turns simulation actions into natural-language episodes, extracts entities via
//! an LLM, and upserts them into the graph.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use sim_providers::GraphClient;
use sim_providers::LlmClient;
use sim_types::domain::action::AgentAction;
use sim_types::domain::simulation::SimulationId;

const BATCH_SIZE: usize = 5;
const SEND_INTERVAL: Duration = Duration::from_millis(500);
const MAX_RETRIES: u32 = 3;

/// One simulated action, queued for the graph-memory worker.
#[derive(Debug, Clone)]
pub struct AgentActivity {
    pub platform: String,
    pub agent_id: usize,
    pub agent_name: String,
    pub action_type: String,
    pub action_args: Value,
    pub round: u32,
    pub timestamp: String,
}

impl AgentActivity {
    pub fn from_action(platform: &str, action: &AgentAction) -> Self {
        Self {
            platform: platform.to_string(),
            agent_id: action.agent_id,
            agent_name: action.agent_name.clone(),
            action_type: action.action_type.clone(),
            action_args: action.action_args.clone(),
            round: action.round,
            timestamp: action.timestamp.clone(),
        }
    }

    /// Renders `"<agent>: <verb phrase>"`, including quoted post content and
    /// referenced author names when present.
    fn render(&self) -> String {
        let verb = self.action_type.replace('_', " ");
        match self.action_type.as_str() {
            "post" | "comment" | "reply" => {
                let content = self.action_args.get("content").and_then(|v| v.as_str()).unwrap_or("");
                format!("{}: {verb} \"{content}\"", self.agent_name)
            }
            "like" | "upvote" | "repost" | "retweet" => {
                let target_author = self.action_args.get("target_author").and_then(|v| v.as_str()).unwrap_or("someone");
                format!("{}: {verb} a post by {target_author}", self.agent_name)
            }
            _ => format!("{}: {verb}", self.agent_name),
        }
    }
}

enum WorkerMessage {
    Activity(AgentActivity),
    Shutdown,
}

/// One instance per running simulation with graph-update enabled.
pub struct SimulationGraphMemory {
    sender: mpsc::Sender<WorkerMessage>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
    skipped: Arc<std::sync::atomic::AtomicU64>,
    sent: Arc<std::sync::atomic::AtomicU64>,
    failures: Arc<std::sync::atomic::AtomicU64>,
}

impl SimulationGraphMemory {
    fn spawn(
        simulation_id: SimulationId,
        graph_id: String,
        graph: Arc<dyn GraphClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let skipped = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let sent = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let failures = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let sent_clone = sent.clone();
        let failures_clone = failures.clone();

        let worker = std::thread::Builder::new()
            .name(format!("graph-memory-{}", simulation_id.as_str()))
            .spawn(move || worker_loop(graph_id, graph, llm, rx, sent_clone, failures_clone))
            .expect("failed to spawn graph-memory worker thread");

        Self { sender: tx, worker: Mutex::new(Some(worker)), skipped, sent, failures }
    }

    /// Drops `DO_NOTHING` actions at enqueue time.
    pub fn enqueue(&self, activity: AgentActivity) {
        if activity.action_type.eq_ignore_ascii_case("do_nothing") {
            self.skipped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return;
        }
        let _ = self.sender.send(WorkerMessage::Activity(activity));
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Count of individual activities successfully upserted into the graph, not batches.
    pub fn items_sent(&self) -> u64 {
        self.sent.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Count of individual activities whose batch exhausted retries, not batches.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Drains the queue, flushes any remaining per-platform buffers, and joins the
    /// worker within a 10s bound.
    pub fn shutdown(&self) {
        let _ = self.sender.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let deadline = std::time::Instant::now() + Duration::from_secs(10);
            while !handle.is_finished() && std::time::Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn worker_loop(
    graph_id: String,
    graph: Arc<dyn GraphClient>,
    llm: Arc<dyn LlmClient>,
    rx: mpsc::Receiver<WorkerMessage>,
    sent: Arc<std::sync::atomic::AtomicU64>,
    failures: Arc<std::sync::atomic::AtomicU64>,
) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build graph-memory worker runtime");

    let mut buffers: HashMap<String, Vec<AgentActivity>> = HashMap::new();
    let mut last_send = std::time::Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(WorkerMessage::Activity(activity)) => {
                let buffer = buffers.entry(activity.platform.clone()).or_default();
                buffer.push(activity);
                if buffer.len() >= BATCH_SIZE {
                    let batch = std::mem::take(buffer);
                    if last_send.elapsed() < SEND_INTERVAL {
                        std::thread::sleep(SEND_INTERVAL - last_send.elapsed());
                    }
                    runtime.block_on(send_batch(&graph_id, &graph, &llm, &batch, &sent, &failures));
                    last_send = std::time::Instant::now();
                }
            }
            Ok(WorkerMessage::Shutdown) => {
                for (_, buffer) in buffers.drain() {
                    if buffer.is_empty() {
                        continue;
                    }
                    runtime.block_on(send_batch(&graph_id, &graph, &llm, &buffer, &sent, &failures));
                }
                return;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ExtractedEntity {
    #[serde(default)]
    name: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    attributes: Value,
}

#[derive(Debug, Deserialize, Default)]
struct ExtractionResult {
    #[serde(default)]
    entities: Vec<ExtractedEntity>,
}

async fn send_batch(
    graph_id: &str,
    graph: &Arc<dyn GraphClient>,
    llm: &Arc<dyn LlmClient>,
    batch: &[AgentActivity],
    sent: &Arc<std::sync::atomic::AtomicU64>,
    failures: &Arc<std::sync::atomic::AtomicU64>,
) {
    let episode_text = batch.iter().map(|a| a.render()).collect::<Vec<_>>().join("\n");
    let prompt = format!(
        "Extract named entities mentioned in these simulated social-media actions. \
         Return JSON {{\"entities\":[{{\"name\":...,\"labels\":[...],\"attributes\":{{}}}}]}}.\n\n{episode_text}"
    );

    let mut attempt = 0;
    loop {
        match try_send(graph_id, graph, llm, &prompt).await {
            Ok(()) => {
                sent.fetch_add(batch.len() as u64, std::sync::atomic::Ordering::Relaxed);
                return;
            }
            Err(err) => {
                attempt += 1;
                if attempt >= MAX_RETRIES {
                    failures.fetch_add(batch.len() as u64, std::sync::atomic::Ordering::Relaxed);
                    warn!(%err, batch_size = batch.len(), "graph-memory batch send exhausted retries");
                    return;
                }
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }
    }
}

async fn try_send(
    graph_id: &str,
    graph: &Arc<dyn GraphClient>,
    llm: &Arc<dyn LlmClient>,
    prompt: &str,
) -> Result<(), String> {
    let raw = llm.complete_json(prompt, 0.3).await.map_err(|e| e.to_string())?;
    let parsed: ExtractionResult = serde_json::from_str(&raw).unwrap_or_default();
    for entity in parsed.entities {
        if entity.name.trim().is_empty() {
            continue;
        }
        graph
            .upsert_node(graph_id, &entity.name, &entity.labels, entity.attributes)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Process-wide manager exposing `Create`/`Get`/`Stop`/`StopAll`.
pub struct GraphMemoryManager {
    graph: Arc<dyn GraphClient>,
    llm: Arc<dyn LlmClient>,
    active: Mutex<HashMap<SimulationId, Arc<SimulationGraphMemory>>>,
}

impl GraphMemoryManager {
    pub fn new(graph: Arc<dyn GraphClient>, llm: Arc<dyn LlmClient>) -> Self {
        Self { graph, llm, active: Mutex::new(HashMap::new()) }
    }

    pub fn create(&self, simulation_id: SimulationId, graph_id: String) -> Arc<SimulationGraphMemory> {
        let updater = Arc::new(SimulationGraphMemory::spawn(
            simulation_id.clone(),
            graph_id,
            self.graph.clone(),
            self.llm.clone(),
        ));
        self.active.lock().unwrap().insert(simulation_id, updater.clone());
        updater
    }

    pub fn get(&self, simulation_id: &SimulationId) -> Option<Arc<SimulationGraphMemory>> {
        self.active.lock().unwrap().get(simulation_id).cloned()
    }

    pub fn stop(&self, simulation_id: &SimulationId) {
        if let Some(updater) = self.active.lock().unwrap().remove(simulation_id) {
            updater.shutdown();
        }
    }

    /// Idempotent: safe to call with nothing running.
    pub fn stop_all(&self) {
        let all: Vec<SimulationId> = self.active.lock().unwrap().keys().cloned().collect();
        for simulation_id in all {
            self.stop(&simulation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_post_action_with_quoted_content() {
        let activity = AgentActivity {
            platform: "twitter".to_string(),
            agent_id: 1,
            agent_name: "Alice".to_string(),
            action_type: "post".to_string(),
            action_args: serde_json::json!({"content": "hello world"}),
            round: 1,
            timestamp: "t".to_string(),
        };
        assert_eq!(activity.render(), "Alice: post \"hello world\"");
    }

    #[test]
    fn do_nothing_actions_are_skipped_before_enqueue() {
        let graph = Arc::new(sim_providers::InMemoryGraphClient::new());
        let llm = Arc::new(sim_providers::EchoLlmClient::new(r#"{"entities":[]}"#));
        let memory = SimulationGraphMemory::spawn(SimulationId::generate(), "g1".to_string(), graph, llm);
        memory.enqueue(AgentActivity {
            platform: "twitter".to_string(),
            agent_id: 1,
            agent_name: "Alice".to_string(),
            action_type: "DO_NOTHING".to_string(),
            action_args: Value::Null,
            round: 1,
            timestamp: "t".to_string(),
        });
        assert_eq!(memory.skipped_count(), 1);
        memory.shutdown();
    }

    #[test]
    fn items_sent_and_failures_together_account_for_every_enqueued_activity() {
        let graph = Arc::new(sim_providers::InMemoryGraphClient::new());
        let llm = Arc::new(sim_providers::EchoLlmClient::new(r#"{"entities":[]}"#));
        let memory = SimulationGraphMemory::spawn(SimulationId::generate(), "g1".to_string(), graph, llm);
        let activity = |n: usize| AgentActivity {
            platform: "twitter".to_string(),
            agent_id: n,
            agent_name: format!("Agent{n}"),
            action_type: "post".to_string(),
            action_args: serde_json::json!({"content": "hi"}),
            round: 1,
            timestamp: "t".to_string(),
        };
        for n in 0..BATCH_SIZE {
            memory.enqueue(activity(n));
        }
        memory.shutdown();
        assert_eq!(memory.items_sent(), BATCH_SIZE as u64);
        assert_eq!(memory.failure_count(), 0);
        assert_eq!(memory.items_sent() + memory.failure_count() + memory.skipped_count(), BATCH_SIZE as u64);
    }

    #[test]
    fn a_failed_batch_attributes_failures_to_every_activity_in_it() {
        let graph = Arc::new(sim_providers::InMemoryGraphClient::new());
        let llm = Arc::new(sim_providers::UnavailableLlmClient);
        let memory = SimulationGraphMemory::spawn(SimulationId::generate(), "g1".to_string(), graph, llm);
        let activity = |n: usize| AgentActivity {
            platform: "reddit".to_string(),
            agent_id: n,
            agent_name: format!("Agent{n}"),
            action_type: "comment".to_string(),
            action_args: serde_json::json!({"content": "hi"}),
            round: 1,
            timestamp: "t".to_string(),
        };
        for n in 0..BATCH_SIZE {
            memory.enqueue(activity(n));
        }
        memory.shutdown();
        assert_eq!(memory.failure_count(), BATCH_SIZE as u64);
        assert_eq!(memory.items_sent(), 0);
        assert_eq!(memory.items_sent() + memory.failure_count() + memory.skipped_count(), BATCH_SIZE as u64);
    }
}
