//! ConfigSynthesizer: stepwise LLM generation of time/event/
//! per-agent/platform configuration, with validation and initial-post assignment.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use sim_providers::LlmClient;
use sim_types::domain::config::{
    AgentConfig, EventConfig, InitialPost, PlatformConfig, ResponseDelayWindow, SimulationParameters, TimeConfig,
};
use sim_types::domain::profile::{AgentProfile, Stance};

use crate::error::{Error, Result};
use crate::json_repair::parse_with_repair;

const AGENT_BATCH_SIZE: usize = 15;
const CONTEXT_TRUNCATE_CHARS: usize = 10_000;

/// `{official, university, governmentagency, government}` treated as interchangeable
/// when resolving an initial post's `poster_type`.
const TYPE_ALIASES: &[&[&str]] = &[&["official", "university", "governmentagency", "government"]];

#[derive(Debug, Deserialize, Default)]
struct RawTimeConfig {
    #[serde(default)]
    total_hours: Option<u32>,
    #[serde(default)]
    minutes_per_round: Option<u32>,
    #[serde(default)]
    agents_per_hour_min: Option<u32>,
    #[serde(default)]
    agents_per_hour_max: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RawEventConfig {
    #[serde(default)]
    hot_topics: Vec<String>,
    #[serde(default)]
    narrative_direction: String,
    #[serde(default)]
    initial_posts: Vec<RawInitialPost>,
}

#[derive(Debug, Deserialize)]
struct RawInitialPost {
    content: String,
    poster_type: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawAgentConfig {
    user_id: usize,
    #[serde(default)]
    activity_level: Option<f64>,
    #[serde(default)]
    post_rate: Option<f64>,
    #[serde(default)]
    comment_rate: Option<f64>,
    #[serde(default)]
    active_hours: Vec<u8>,
    #[serde(default)]
    response_delay_min_minutes: Option<u32>,
    #[serde(default)]
    response_delay_max_minutes: Option<u32>,
    #[serde(default)]
    sentiment_bias: Option<f64>,
    #[serde(default)]
    stance: Option<Stance>,
    #[serde(default)]
    influence_weight: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAgentBatch {
    #[serde(default)]
    agents: Vec<RawAgentConfig>,
}

pub struct ConfigSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl ConfigSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Runs all five generation steps and returns the assembled document; callers
    /// persist it to `simulation_config.json` atomically.
    pub async fn generate(
        &self,
        requirement: &str,
        entity_types: &[String],
        profiles: &[AgentProfile],
        use_llm: bool,
    ) -> Result<SimulationParameters> {
        let time_config = self.generate_time_config(requirement, profiles.len(), use_llm).await;
        let mut event_config = self.generate_event_config(requirement, entity_types, use_llm).await;
        let agent_configs = self.generate_agent_configs(profiles, use_llm).await;

        assign_initial_posts(&mut event_config, profiles, &agent_configs)?;

        let mut platform_configs = HashMap::new();
        platform_configs.insert("twitter".to_string(), PlatformConfig::default_twitter());
        platform_configs.insert("reddit".to_string(), PlatformConfig::default_reddit());

        Ok(SimulationParameters {
            time_config,
            agent_configs,
            event_config,
            platform_configs,
        })
    }

    async fn generate_time_config(&self, requirement: &str, entity_count: usize, use_llm: bool) -> TimeConfig {
        let default = TimeConfig::default_for(entity_count);
        if !use_llm {
            return default;
        }

        let truncated: String = requirement.chars().take(CONTEXT_TRUNCATE_CHARS).collect();
        let prompt = format!(
            "Propose a simulation time configuration for this scenario:\n{truncated}\n\
             Typical Chinese-hour activity multipliers: morning 1.0, midday 1.3, evening 1.6, overnight 0.3 (hints, adjust if warranted).\n\
             Respond as JSON: total_hours, minutes_per_round, agents_per_hour_min, agents_per_hour_max."
        );

        match self.llm.complete_json(&prompt, 0.5).await {
            Ok(raw_text) => match parse_with_repair::<RawTimeConfig>(&raw_text) {
                Some(raw) => validate_time_config(raw, entity_count, default),
                None => {
                    warn!("time config response was not parseable JSON, using defaults");
                    default
                }
            },
            Err(err) => {
                warn!(%err, "time config LLM call failed, using defaults");
                default
            }
        }
    }

    async fn generate_event_config(&self, requirement: &str, entity_types: &[String], use_llm: bool) -> EventConfig {
        if !use_llm {
            return EventConfig::default();
        }

        let prompt = format!(
            "Given this scenario:\n{requirement}\n\
             Available entity types: {}.\n\
             Respond as JSON with fields hot_topics (array of strings), narrative_direction (string), \
             initial_posts (array of {{content, poster_type}} where poster_type is one of the available entity types).",
            entity_types.join(", ")
        );

        match self.llm.complete_json(&prompt, 0.7).await {
            Ok(raw_text) => match parse_with_repair::<RawEventConfig>(&raw_text) {
                Some(raw) => EventConfig {
                    hot_topics: raw.hot_topics,
                    narrative_direction: raw.narrative_direction,
                    initial_posts: raw
                        .initial_posts
                        .into_iter()
                        .map(|p| InitialPost {
                            content: p.content,
                            poster_type: p.poster_type,
                            poster_agent_id: None,
                        })
                        .collect(),
                },
                None => {
                    warn!("event config response was not parseable JSON, using empty defaults");
                    EventConfig::default()
                }
            },
            Err(err) => {
                warn!(%err, "event config LLM call failed, using empty defaults");
                EventConfig::default()
            }
        }
    }

    async fn generate_agent_configs(&self, profiles: &[AgentProfile], use_llm: bool) -> Vec<AgentConfig> {
        if !use_llm || profiles.is_empty() {
            return profiles.iter().map(rule_based_agent_config).collect();
        }

        let mut by_id: HashMap<usize, AgentConfig> = HashMap::new();

        for batch in profiles.chunks(AGENT_BATCH_SIZE) {
            let prompt = build_batch_prompt(batch);
            match self.llm.complete_json(&prompt, 0.5).await {
                Ok(raw_text) => {
                    if let Some(raw) = parse_with_repair::<RawAgentBatch>(&raw_text) {
                        for agent in raw.agents {
                            if let Some(profile) = batch.iter().find(|p| p.user_id == agent.user_id) {
                                by_id.insert(agent.user_id, finalize_agent_config(profile, agent));
                            }
                        }
                    } else {
                        warn!(batch_start = batch[0].user_id, "agent batch response unparseable, using rule-based fallback for this batch");
                    }
                }
                Err(err) => {
                    warn!(%err, batch_start = batch[0].user_id, "agent batch LLM call failed, using rule-based fallback for this batch");
                }
            }
        }

        profiles
            .iter()
            .map(|p| by_id.remove(&p.user_id).unwrap_or_else(|| rule_based_agent_config(p)))
            .collect()
    }
}

fn validate_time_config(raw: RawTimeConfig, entity_count: usize, default: TimeConfig) -> TimeConfig {
    let cap = ((entity_count as f64) * 0.9).floor().max(1.0) as u32;
    let min = raw.agents_per_hour_min.unwrap_or(default.agents_per_hour_min).clamp(1, cap);
    let max = raw.agents_per_hour_max.unwrap_or(default.agents_per_hour_max).clamp(1, cap);
    let (min, max) = if min > max { (default.agents_per_hour_min.min(cap), max.max(min)) } else { (min, max) };

    TimeConfig {
        total_hours: raw.total_hours.unwrap_or(default.total_hours),
        minutes_per_round: raw.minutes_per_round.unwrap_or(default.minutes_per_round),
        agents_per_hour_min: min,
        agents_per_hour_max: max,
        hour_buckets: default.hour_buckets,
    }
}

fn build_batch_prompt(batch: &[AgentProfile]) -> String {
    let descriptions: Vec<String> = batch
        .iter()
        .map(|p| format!("- user_id {}: {} ({}), persona: {}", p.user_id, p.display_name, p.source_entity_type, p.persona))
        .collect();
    format!(
        "For each of the following agents, propose activity/posting/response/influence parameters:\n{}\n\
         Respond as JSON: {{\"agents\": [{{user_id, activity_level, post_rate, comment_rate, active_hours, \
         response_delay_min_minutes, response_delay_max_minutes, sentiment_bias, stance, influence_weight}}]}}.",
        descriptions.join("\n")
    )
}

fn finalize_agent_config(profile: &AgentProfile, raw: RawAgentConfig) -> AgentConfig {
    let rule_based = rule_based_agent_config(profile);
    AgentConfig {
        user_id: profile.user_id,
        activity_level: raw.activity_level.unwrap_or(rule_based.activity_level).clamp(0.0, 1.0),
        post_rate: raw.post_rate.unwrap_or(rule_based.post_rate).max(0.0),
        comment_rate: raw.comment_rate.unwrap_or(rule_based.comment_rate).max(0.0),
        active_hours: if raw.active_hours.is_empty() { rule_based.active_hours } else { raw.active_hours },
        response_delay: match (raw.response_delay_min_minutes, raw.response_delay_max_minutes) {
            (Some(min), Some(max)) if min <= max => ResponseDelayWindow { min_minutes: min, max_minutes: max },
            _ => rule_based.response_delay,
        },
        sentiment_bias: raw.sentiment_bias.unwrap_or(rule_based.sentiment_bias).clamp(-1.0, 1.0),
        stance: raw.stance.unwrap_or(rule_based.stance),
        influence_weight: raw.influence_weight.unwrap_or(rule_based.influence_weight).max(0.0),
    }
}

/// Rule-based defaults keyed by entity type: institutions get low
/// activity / work hours / high influence; media get broad hours / fast response;
/// individuals get evening peak / fast response / low influence; students get
/// evenings+midday / highest response rate.
fn rule_based_agent_config(profile: &AgentProfile) -> AgentConfig {
    let entity_type = profile.source_entity_type.to_lowercase();
    let (activity_level, post_rate, comment_rate, active_hours, response_delay, influence_weight) =
        if entity_type.contains("student") {
            (0.6, 0.3, 0.6, vec![9, 10, 11, 12, 13, 19, 20, 21, 22], ResponseDelayWindow { min_minutes: 1, max_minutes: 10 }, 0.3)
        } else if INSTITUTION_LIKE.iter().any(|k| entity_type.contains(k)) {
            (0.2, 0.2, 0.1, (9..18).collect(), ResponseDelayWindow { min_minutes: 30, max_minutes: 180 }, 0.9)
        } else if entity_type.contains("media") {
            (0.8, 0.6, 0.3, (0..24).collect(), ResponseDelayWindow { min_minutes: 1, max_minutes: 15 }, 0.7)
        } else {
            (0.4, 0.3, 0.4, vec![18, 19, 20, 21, 22, 23], ResponseDelayWindow { min_minutes: 5, max_minutes: 60 }, 0.2)
        };

    AgentConfig {
        user_id: profile.user_id,
        activity_level,
        post_rate,
        comment_rate,
        active_hours,
        response_delay,
        sentiment_bias: 0.0,
        stance: Stance::Neutral,
        influence_weight,
    }
}

const INSTITUTION_LIKE: &[&str] = &["organization", "institution", "company", "government", "university"];

fn resolve_alias(entity_type: &str) -> &str {
    let lower = entity_type.to_lowercase();
    for group in TYPE_ALIASES {
        if group.iter().any(|g| *g == lower) {
            return group[0];
        }
    }
    entity_type
}

/// Resolves `poster_agent_id` for every initial post: exact type match, then alias
/// match, then the agent with the highest `influence_weight`; a per-type round-robin
/// cursor keeps posts from collapsing onto a single agent.
fn assign_initial_posts(event_config: &mut EventConfig, profiles: &[AgentProfile], agent_configs: &[AgentConfig]) -> Result<()> {
    if profiles.is_empty() {
        if event_config.initial_posts.is_empty() {
            return Ok(());
        }
        return Err(Error::NoAgentsAvailable);
    }

    let influence_by_id: HashMap<usize, f64> = agent_configs.iter().map(|a| (a.user_id, a.influence_weight)).collect();

    let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
    let mut by_alias: HashMap<String, Vec<usize>> = HashMap::new();
    for profile in profiles {
        by_type.entry(profile.source_entity_type.to_lowercase()).or_default().push(profile.user_id);
        by_alias
            .entry(resolve_alias(&profile.source_entity_type).to_string())
            .or_default()
            .push(profile.user_id);
    }

    let highest_influence = profiles
        .iter()
        .max_by(|a, b| {
            let ia = influence_by_id.get(&a.user_id).copied().unwrap_or(0.0);
            let ib = influence_by_id.get(&b.user_id).copied().unwrap_or(0.0);
            ia.partial_cmp(&ib).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|p| p.user_id)
        .ok_or(Error::NoAgentsAvailable)?;

    let mut cursors: HashMap<String, usize> = HashMap::new();

    for post in &mut event_config.initial_posts {
        let type_key = post.poster_type.to_lowercase();
        let candidates = by_type
            .get(&type_key)
            .or_else(|| by_alias.get(resolve_alias(&post.poster_type)))
            .cloned()
            .unwrap_or_else(|| vec![highest_influence]);

        let cursor = cursors.entry(type_key).or_insert(0);
        let chosen = candidates[*cursor % candidates.len()];
        *cursor += 1;
        post.poster_agent_id = Some(chosen);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_providers::{EchoLlmClient, UnavailableLlmClient};
    use sim_types::domain::profile::Gender;

    fn profile(user_id: usize, entity_type: &str) -> AgentProfile {
        AgentProfile {
            user_id,
            user_name: format!("user_{user_id}"),
            display_name: format!("User {user_id}"),
            bio: "bio".to_string(),
            persona: "persona".to_string(),
            age: 30,
            gender: Gender::Other,
            mbti: "INFP".to_string(),
            country: "Unknown".to_string(),
            profession: "Unspecified".to_string(),
            interests: Vec::new(),
            source_entity_uuid: format!("uuid-{user_id}"),
            source_entity_type: entity_type.to_string(),
        }
    }

    #[tokio::test]
    async fn falls_back_to_rule_based_agent_configs_without_llm() {
        let llm = Arc::new(UnavailableLlmClient);
        let synth = ConfigSynthesizer::new(llm);
        let profiles = vec![profile(0, "Student"), profile(1, "Organization")];
        let params = synth
            .generate("a scenario", &["Person".to_string(), "Organization".to_string()], &profiles, false)
            .await
            .unwrap();
        assert_eq!(params.agent_configs.len(), 2);
        assert!(params.agent_configs[1].influence_weight > params.agent_configs[0].influence_weight);
        assert!(params.platform_configs.contains_key("twitter"));
        assert!(params.platform_configs.contains_key("reddit"));
    }

    #[tokio::test]
    async fn time_config_defaults_are_consistent_with_entity_count() {
        let llm = Arc::new(EchoLlmClient::new("not json"));
        let synth = ConfigSynthesizer::new(llm);
        let config = synth.generate_time_config("scenario", 10, true).await;
        assert!(config.agents_per_hour_min <= config.agents_per_hour_max);
    }

    #[test]
    fn assign_initial_posts_round_robins_within_a_type() {
        let profiles = vec![profile(0, "Person"), profile(1, "Person"), profile(2, "Person")];
        let agent_configs: Vec<AgentConfig> = profiles.iter().map(rule_based_agent_config).collect();
        let mut event_config = EventConfig {
            initial_posts: vec![
                InitialPost { content: "a".to_string(), poster_type: "person".to_string(), poster_agent_id: None },
                InitialPost { content: "b".to_string(), poster_type: "person".to_string(), poster_agent_id: None },
                InitialPost { content: "c".to_string(), poster_type: "person".to_string(), poster_agent_id: None },
            ],
            ..Default::default()
        };
        assign_initial_posts(&mut event_config, &profiles, &agent_configs).unwrap();
        let ids: Vec<usize> = event_config.initial_posts.iter().map(|p| p.poster_agent_id.unwrap()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn assign_initial_posts_resolves_via_alias_map() {
        let profiles = vec![profile(0, "University")];
        let agent_configs: Vec<AgentConfig> = profiles.iter().map(rule_based_agent_config).collect();
        let mut event_config = EventConfig {
            initial_posts: vec![InitialPost { content: "a".to_string(), poster_type: "official".to_string(), poster_agent_id: None }],
            ..Default::default()
        };
        assign_initial_posts(&mut event_config, &profiles, &agent_configs).unwrap();
        assert_eq!(event_config.initial_posts[0].poster_agent_id, Some(0));
    }

    #[test]
    fn assign_initial_posts_errors_when_no_agents_exist() {
        let mut event_config = EventConfig {
            initial_posts: vec![InitialPost { content: "a".to_string(), poster_type: "person".to_string(), poster_agent_id: None }],
            ..Default::default()
        };
        let result = assign_initial_posts(&mut event_config, &[], &[]);
        assert!(result.is_err());
    }
}
