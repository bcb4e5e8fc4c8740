use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of `{platform}/actions.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    pub round: u32,
    pub timestamp: String,
    pub platform: String,
    pub agent_id: usize,
    pub agent_name: String,
    pub action_type: String,
    #[serde(default)]
    pub action_args: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default = "default_true")]
    pub success: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEndEvent {
    pub event_type: String, // always "round_end"
    pub round: u32,
    pub simulated_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationEndEvent {
    pub event_type: String, // always "simulation_end"
    pub round: u32,
    pub simulated_hours: u32,
    #[serde(default)]
    pub total_actions: u64,
}

/// A parsed line from `{platform}/actions.jsonl`: either an agent action or a sentinel
/// round/simulation event, distinguished by the presence of `event_type`.
#[derive(Debug, Clone)]
pub enum LogRecord {
    Action(AgentAction),
    RoundEnd { round: u32, simulated_hours: u32 },
    SimulationEnd {
        round: u32,
        simulated_hours: u32,
        total_actions: u64,
    },
}

impl LogRecord {
    /// Parses one JSONL line using the monitoring loop's discriminator: records with
    /// no `event_type` field and a present `agent_id` are agent actions.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        match value.get("event_type").and_then(|v| v.as_str()) {
            Some("round_end") => {
                let ev: RoundEndEvent = serde_json::from_value(value)?;
                Ok(LogRecord::RoundEnd {
                    round: ev.round,
                    simulated_hours: ev.simulated_hours,
                })
            }
            Some("simulation_end") => {
                let ev: SimulationEndEvent = serde_json::from_value(value)?;
                Ok(LogRecord::SimulationEnd {
                    round: ev.round,
                    simulated_hours: ev.simulated_hours,
                    total_actions: ev.total_actions,
                })
            }
            _ => {
                let action: AgentAction = serde_json::from_value(value)?;
                Ok(LogRecord::Action(action))
            }
        }
    }
}
