//! IPC client: file-based command/response protocol with the
//! external simulation subprocess, plus `env_status.json` liveness checks.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::sleep;

use sim_core::{read_json, write_atomic_json, Store};
use sim_types::domain::ipc::{EnvStatus, IpcCommand, IpcCommandType, IpcResponse};

use crate::error::{Error, Result};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed prefix the orchestrator prepends to every interview prompt so the
/// interviewee replies in plain text rather than invoking tools.
pub const INTERVIEW_INSTRUCTION_PREFIX: &str =
    "Respond in plain text only. Do not call any tools or emit function calls.\n\n";

/// Treats `env_status.json` older than this as not-alive even if it still says
/// "alive": a crashed simulation process otherwise leaves a stale status behind forever.
const DEFAULT_MAX_STALENESS: Duration = Duration::from_secs(30);

pub struct IpcClient {
    store: Store,
    poll_interval: Duration,
    max_staleness: Duration,
}

impl IpcClient {
    pub fn new(store: Store) -> Self {
        Self { store, poll_interval: DEFAULT_POLL_INTERVAL, max_staleness: DEFAULT_MAX_STALENESS }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// `Send(type, args, timeout)`: writes the command, polls for a matching response
    /// file, and cleans up both files on completion or timeout.
    pub async fn send(
        &self,
        simulation_id: &str,
        command_type: IpcCommandType,
        args: Value,
        timeout: Duration,
    ) -> Result<IpcResponse> {
        let command = IpcCommand::new(command_type, args);
        let command_path = self.store.ipc_commands_dir(simulation_id).join(format!("{}.json", command.command_id));
        write_atomic_json(&command_path, &command)?;

        let response_path = self.store.ipc_responses_dir(simulation_id).join(format!("{}.json", command.command_id));
        let deadline = std::time::Instant::now() + timeout;

        loop {
            if let Ok(Some(response)) = sim_core::read_json_opt::<IpcResponse>(&response_path) {
                let _ = std::fs::remove_file(&response_path);
                let _ = std::fs::remove_file(&command_path);
                return Ok(response);
            }
            if std::time::Instant::now() >= deadline {
                let _ = std::fs::remove_file(&command_path);
                return Err(Error::Timeout(format!("ipc command {} timed out", command.command_id)));
            }
            sleep(self.poll_interval).await;
        }
    }

    pub async fn interview(&self, simulation_id: &str, agent_id: &str, prompt: &str, platform: Option<&str>, timeout: Duration) -> Result<IpcResponse> {
        let prefixed = format!("{INTERVIEW_INSTRUCTION_PREFIX}{prompt}");
        let mut args = serde_json::json!({ "agent_id": agent_id, "prompt": prefixed });
        if let Some(platform) = platform {
            args["platform"] = Value::String(platform.to_string());
        }
        self.send(simulation_id, IpcCommandType::Interview, args, timeout).await
    }

    pub async fn close_env(&self, simulation_id: &str, timeout: Duration) -> Result<IpcResponse> {
        self.send(simulation_id, IpcCommandType::CloseEnv, Value::Null, timeout).await
    }

    /// Absence, unparseable content, or a status older than `max_staleness` are all
    /// treated as "not alive".
    pub fn is_env_alive(&self, simulation_id: &str) -> bool {
        let path = self.store.env_status_path(simulation_id);
        let Ok(status) = read_json::<EnvStatus>(&path) else {
            return false;
        };
        if !status.is_alive() {
            return false;
        }
        let age = Utc::now().signed_duration_since(status.timestamp);
        age.to_std().is_ok_and(|age| age <= self.max_staleness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_types::domain::ipc::IpcStatus;
    use tempfile::TempDir;

    fn client() -> (TempDir, IpcClient) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        std::fs::create_dir_all(store.ipc_commands_dir("sim1")).unwrap();
        std::fs::create_dir_all(store.ipc_responses_dir("sim1")).unwrap();
        (dir, IpcClient::new(store).with_poll_interval(Duration::from_millis(10)))
    }

    #[tokio::test]
    async fn send_times_out_and_removes_command_file_when_no_response_appears() {
        let (_dir, client) = client();
        let result = client
            .send("sim1", IpcCommandType::CloseEnv, Value::Null, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn send_returns_response_once_it_appears_and_cleans_up_both_files() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        std::fs::create_dir_all(store.ipc_commands_dir("sim1")).unwrap();
        std::fs::create_dir_all(store.ipc_responses_dir("sim1")).unwrap();
        let commands_dir = store.ipc_commands_dir("sim1");
        let responses_dir = store.ipc_responses_dir("sim1");
        let client = IpcClient::new(store.clone()).with_poll_interval(Duration::from_millis(10));

        let responder = tokio::spawn(async move {
            loop {
                if let Ok(entries) = std::fs::read_dir(&commands_dir) {
                    if let Some(Ok(entry)) = entries.filter_map(Result::ok).next() {
                        let command: IpcCommand = read_json(&entry.path()).unwrap();
                        let response = IpcResponse {
                            command_id: command.command_id.clone(),
                            status: IpcStatus::Completed,
                            result: serde_json::json!({"ok": true}),
                            error: None,
                            timestamp: Utc::now(),
                        };
                        let response_path = responses_dir.join(format!("{}.json", command.command_id));
                        write_atomic_json(&response_path, &response).unwrap();
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let result = client
            .send("sim1", IpcCommandType::CloseEnv, Value::Null, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.status, IpcStatus::Completed);
        responder.await.unwrap();

        assert!(std::fs::read_dir(store.ipc_commands_dir("sim1")).unwrap().next().is_none());
        let _ = client;
    }

    #[test]
    fn is_env_alive_treats_missing_file_as_not_alive() {
        let (_dir, client) = client();
        assert!(!client.is_env_alive("sim1"));
    }

    #[test]
    fn is_env_alive_treats_stale_timestamp_as_not_alive() {
        let (_dir, client) = client();
        let status = EnvStatus {
            status: "alive".to_string(),
            timestamp: Utc::now() - chrono::Duration::seconds(60),
            twitter_available: true,
            reddit_available: false,
        };
        write_atomic_json(&client.store.env_status_path("sim1"), &status).unwrap();
        assert!(!client.is_env_alive("sim1"));
    }
}
