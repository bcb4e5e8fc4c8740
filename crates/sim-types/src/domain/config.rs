use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::profile::Stance;

/// A named hour bucket with an activity multiplier (e.g. "morning" => 1.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourBucket {
    pub name: String,
    pub hours: Vec<u8>,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    pub total_hours: u32,
    pub minutes_per_round: u32,
    pub agents_per_hour_min: u32,
    pub agents_per_hour_max: u32,
    #[serde(default)]
    pub hour_buckets: Vec<HourBucket>,
}

impl TimeConfig {
    pub fn default_for(entity_count: usize) -> Self {
        let max_cap = ((entity_count as f64) * 0.9).floor().max(1.0) as u32;
        Self {
            total_hours: 24,
            minutes_per_round: 30,
            agents_per_hour_min: 1.min(max_cap),
            agents_per_hour_max: max_cap,
            hour_buckets: vec![
                HourBucket {
                    name: "morning".to_string(),
                    hours: (6..12).collect(),
                    multiplier: 1.0,
                },
                HourBucket {
                    name: "midday".to_string(),
                    hours: (12..14).collect(),
                    multiplier: 1.3,
                },
                HourBucket {
                    name: "evening".to_string(),
                    hours: (18..23).collect(),
                    multiplier: 1.6,
                },
                HourBucket {
                    name: "overnight".to_string(),
                    hours: (0..6).collect(),
                    multiplier: 0.3,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDelayWindow {
    pub min_minutes: u32,
    pub max_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub user_id: usize,
    /// 0.0..=1.0
    pub activity_level: f64,
    pub post_rate: f64,
    pub comment_rate: f64,
    #[serde(default)]
    pub active_hours: Vec<u8>,
    pub response_delay: ResponseDelayWindow,
    /// -1.0..=1.0
    pub sentiment_bias: f64,
    pub stance: Stance,
    /// relative weight, non-negative
    pub influence_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialPost {
    pub content: String,
    pub poster_type: String,
    /// Resolved once the config is finalized; `None` until then.
    #[serde(default)]
    pub poster_agent_id: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventConfig {
    #[serde(default)]
    pub hot_topics: Vec<String>,
    #[serde(default)]
    pub narrative_direction: String,
    #[serde(default)]
    pub initial_posts: Vec<InitialPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub recency_weight: f64,
    pub popularity_weight: f64,
    pub relevance_weight: f64,
    pub viral_threshold: f64,
    pub echo_chamber_strength: f64,
}

impl PlatformConfig {
    pub fn default_twitter() -> Self {
        Self {
            recency_weight: 0.5,
            popularity_weight: 0.3,
            relevance_weight: 0.2,
            viral_threshold: 50.0,
            echo_chamber_strength: 0.4,
        }
    }

    pub fn default_reddit() -> Self {
        Self {
            recency_weight: 0.3,
            popularity_weight: 0.5,
            relevance_weight: 0.2,
            viral_threshold: 100.0,
            echo_chamber_strength: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub time_config: TimeConfig,
    pub agent_configs: Vec<AgentConfig>,
    pub event_config: EventConfig,
    pub platform_configs: HashMap<String, PlatformConfig>,
}
