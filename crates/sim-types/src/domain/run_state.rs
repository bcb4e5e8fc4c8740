use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::action::AgentAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Idle,
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformRunState {
    pub current_round: u32,
    pub simulated_hours: u32,
    pub running: bool,
    pub completed: bool,
    pub action_count: u64,
}

/// Maximum number of recent actions retained in [`RunState::recent_actions`].
pub const RECENT_ACTIONS_CAPACITY: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub simulation_id: String,
    pub runner_status: RunnerStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub simulated_hours: u32,
    pub total_hours: u32,
    pub twitter: PlatformRunState,
    pub reddit: PlatformRunState,
    #[serde(default)]
    pub recent_actions: VecDeque<AgentAction>,
    #[serde(default)]
    pub pid: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl RunState {
    pub fn new(simulation_id: impl Into<String>, total_rounds: u32, total_hours: u32) -> Self {
        let now = Utc::now();
        Self {
            simulation_id: simulation_id.into(),
            runner_status: RunnerStatus::Idle,
            current_round: 0,
            total_rounds,
            simulated_hours: 0,
            total_hours,
            twitter: PlatformRunState::default(),
            reddit: PlatformRunState::default(),
            recent_actions: VecDeque::with_capacity(RECENT_ACTIONS_CAPACITY),
            pid: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_error: None,
        }
    }

    pub fn push_action(&mut self, action: AgentAction) {
        if self.recent_actions.len() >= RECENT_ACTIONS_CAPACITY {
            self.recent_actions.pop_front();
        }
        self.recent_actions.push_back(action);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn platform_mut(&mut self, platform: &str) -> Option<&mut PlatformRunState> {
        match platform {
            "twitter" => Some(&mut self.twitter),
            "reddit" => Some(&mut self.reddit),
            _ => None,
        }
    }

    pub fn platform(&self, platform: &str) -> Option<&PlatformRunState> {
        match platform {
            "twitter" => Some(&self.twitter),
            "reddit" => Some(&self.reddit),
            _ => None,
        }
    }
}
