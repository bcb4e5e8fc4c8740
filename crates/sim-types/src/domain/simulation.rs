use super::project::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(String);

impl SimulationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SimulationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SimulationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// State machine status for a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Created,
    Preparing,
    Ready,
    Running,
    Completed,
    Stopped,
    Failed,
    Paused,
}

impl SimulationStatus {
    /// States from which `Start` is permitted.
    pub fn can_start(self) -> bool {
        matches!(
            self,
            SimulationStatus::Ready
                | SimulationStatus::Failed
                | SimulationStatus::Stopped
                | SimulationStatus::Completed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFlags {
    pub twitter: bool,
    pub reddit: bool,
}

impl PlatformFlags {
    pub fn platforms(&self) -> Vec<&'static str> {
        let mut v = Vec::new();
        if self.twitter {
            v.push("twitter");
        }
        if self.reddit {
            v.push("reddit");
        }
        v
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub simulation_id: SimulationId,
    pub project_id: ProjectId,
    pub graph_id: String,
    pub platforms: PlatformFlags,
    pub status: SimulationStatus,
    #[serde(default)]
    pub entity_count: usize,
    #[serde(default)]
    pub profile_count: usize,
    #[serde(default)]
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub config_generated: bool,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Simulation {
    pub fn new(project_id: ProjectId, graph_id: impl Into<String>, platforms: PlatformFlags) -> Self {
        let now = Utc::now();
        Self {
            simulation_id: SimulationId::generate(),
            project_id,
            graph_id: graph_id.into(),
            platforms,
            status: SimulationStatus::Created,
            entity_count: 0,
            profile_count: 0,
            entity_types: Vec::new(),
            config_generated: false,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
