//! Read APIs over `{platform}/actions.jsonl`. Parses the full log on
//! each call; cheap enough at the scale this system targets since the log is
//! append-only and newline-framed, so concurrent writers never corrupt a read.

use std::collections::HashMap;
use std::fs;

use serde::Serialize;

use sim_core::Store;
use sim_types::domain::action::{AgentAction, LogRecord};

use crate::error::Result;

#[derive(Debug, Default, Clone)]
pub struct ActionFilter {
    pub platform: Option<String>,
    pub agent_id: Option<usize>,
    pub round: Option<u32>,
}

impl ActionFilter {
    fn matches(&self, platform: &str, action: &AgentAction) -> bool {
        self.platform.as_deref().is_none_or(|p| p == platform)
            && self.agent_id.is_none_or(|id| id == action.agent_id)
            && self.round.is_none_or(|r| r == action.round)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub active_agents: usize,
    pub action_counts: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub agent_id: usize,
    pub agent_name: String,
    pub total_actions: u64,
    pub action_type_counts: HashMap<String, u64>,
}

fn platforms_for(store: &Store, simulation_id: &str) -> Vec<&'static str> {
    ["twitter", "reddit"]
        .into_iter()
        .filter(|p| store.actions_log_path(simulation_id, p).exists())
        .collect()
}

fn read_actions(store: &Store, simulation_id: &str, platform: &str) -> Result<Vec<AgentAction>> {
    let path = store.actions_log_path(simulation_id, platform);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    let actions = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match LogRecord::parse(line) {
            Ok(LogRecord::Action(action)) => Some(action),
            _ => None,
        })
        .collect();
    Ok(actions)
}

/// `GetAllActions(platform?, agent_id?, round?)`.
pub fn get_all_actions(store: &Store, simulation_id: &str, filter: &ActionFilter) -> Result<Vec<AgentAction>> {
    let mut all = Vec::new();
    for platform in platforms_for(store, simulation_id) {
        if filter.platform.as_deref().is_some_and(|p| p != platform) {
            continue;
        }
        for action in read_actions(store, simulation_id, platform)? {
            if filter.matches(platform, &action) {
                all.push(action);
            }
        }
    }
    Ok(all)
}

/// `GetActions(limit, offset, …)`: pages `GetAllActions`.
pub fn get_actions(
    store: &Store,
    simulation_id: &str,
    filter: &ActionFilter,
    limit: usize,
    offset: usize,
) -> Result<Vec<AgentAction>> {
    let all = get_all_actions(store, simulation_id, filter)?;
    Ok(all.into_iter().skip(offset).take(limit).collect())
}

/// `GetTimeline(range)`: per-round aggregates across every platform.
pub fn get_timeline(store: &Store, simulation_id: &str, round_range: Option<(u32, u32)>) -> Result<Vec<RoundSummary>> {
    let actions = get_all_actions(store, simulation_id, &ActionFilter::default())?;
    let mut by_round: HashMap<u32, (std::collections::HashSet<usize>, HashMap<String, usize>)> = HashMap::new();

    for action in actions {
        if let Some((min, max)) = round_range {
            if action.round < min || action.round > max {
                continue;
            }
        }
        let entry = by_round.entry(action.round).or_default();
        entry.0.insert(action.agent_id);
        *entry.1.entry(action.action_type.clone()).or_insert(0) += 1;
    }

    let mut summaries: Vec<RoundSummary> = by_round
        .into_iter()
        .map(|(round, (agents, counts))| RoundSummary {
            round,
            active_agents: agents.len(),
            action_counts: counts,
        })
        .collect();
    summaries.sort_by_key(|s| s.round);
    Ok(summaries)
}

/// `GetAgentStats`: per-agent totals and action-type histogram.
pub fn get_agent_stats(store: &Store, simulation_id: &str) -> Result<Vec<AgentStats>> {
    let actions = get_all_actions(store, simulation_id, &ActionFilter::default())?;
    let mut by_agent: HashMap<usize, AgentStats> = HashMap::new();

    for action in actions {
        let stats = by_agent.entry(action.agent_id).or_insert_with(|| AgentStats {
            agent_id: action.agent_id,
            agent_name: action.agent_name.clone(),
            total_actions: 0,
            action_type_counts: HashMap::new(),
        });
        stats.total_actions += 1;
        *stats.action_type_counts.entry(action.action_type.clone()).or_insert(0) += 1;
    }

    let mut stats: Vec<AgentStats> = by_agent.into_values().collect();
    stats.sort_by_key(|s| s.agent_id);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn seed_log(store: &Store, simulation_id: &str, platform: &str, lines: &[&str]) {
        let path = store.actions_log_path(simulation_id, platform);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    #[test]
    fn get_all_actions_filters_by_agent_and_round() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        seed_log(
            &store,
            "sim1",
            "twitter",
            &[
                r#"{"round":1,"timestamp":"t","platform":"twitter","agent_id":1,"agent_name":"a","action_type":"post"}"#,
                r#"{"round":2,"timestamp":"t","platform":"twitter","agent_id":2,"agent_name":"b","action_type":"comment"}"#,
            ],
        );

        let filter = ActionFilter { agent_id: Some(1), ..Default::default() };
        let actions = get_all_actions(&store, "sim1", &filter).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].agent_id, 1);
    }

    #[test]
    fn get_timeline_aggregates_per_round() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        seed_log(
            &store,
            "sim1",
            "twitter",
            &[
                r#"{"round":1,"timestamp":"t","platform":"twitter","agent_id":1,"agent_name":"a","action_type":"post"}"#,
                r#"{"round":1,"timestamp":"t","platform":"twitter","agent_id":2,"agent_name":"b","action_type":"post"}"#,
                r#"{"event_type":"round_end","round":1,"simulated_hours":1}"#,
            ],
        );

        let timeline = get_timeline(&store, "sim1", None).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].active_agents, 2);
        assert_eq!(timeline[0].action_counts["post"], 2);
    }

    #[test]
    fn get_agent_stats_counts_action_types_per_agent() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        seed_log(
            &store,
            "sim1",
            "reddit",
            &[
                r#"{"round":1,"timestamp":"t","platform":"reddit","agent_id":1,"agent_name":"a","action_type":"post"}"#,
                r#"{"round":2,"timestamp":"t","platform":"reddit","agent_id":1,"agent_name":"a","action_type":"comment"}"#,
            ],
        );

        let stats = get_agent_stats(&store, "sim1").unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_actions, 2);
        assert_eq!(stats[0].action_type_counts["post"], 1);
    }
}
