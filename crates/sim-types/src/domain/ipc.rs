use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File-based IPC command written into `ipc_commands/{uuid}.json` for the running
/// simulation subprocess to pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcCommandType {
    Interview,
    BatchInterview,
    CloseEnv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcCommand {
    pub command_id: String,
    #[serde(rename = "type")]
    pub command_type: IpcCommandType,
    #[serde(default)]
    pub args: Value,
    pub timestamp: DateTime<Utc>,
}

impl IpcCommand {
    pub fn new(command_type: IpcCommandType, args: Value) -> Self {
        Self {
            command_id: uuid::Uuid::new_v4().to_string(),
            command_type,
            args,
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle of an [`IpcResponse`] as the external simulation works through a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub command_id: String,
    pub status: IpcStatus,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Mirror of `env_status.json`, owned by the external simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvStatus {
    pub status: String, // "alive" | "stopped"
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub twitter_available: bool,
    #[serde(default)]
    pub reddit_available: bool,
}

impl EnvStatus {
    pub fn is_alive(&self) -> bool {
        self.status == "alive"
    }
}
