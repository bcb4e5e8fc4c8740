//! ProfileSynthesizer: per-entity persona generation, bounded
//! parallelism, streaming save.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use sim_graph::FilteredEntity;
use sim_providers::{GraphClient, LlmClient};
use sim_types::domain::profile::{AgentProfile, Gender, RedditProfileRecord, TwitterProfileRecord};

use crate::error::Result;
use crate::json_repair::parse_with_repair;

const ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE_LADDER: [f64; 3] = [0.7, 0.5, 0.3];

/// Labels treated as a group/institution rather than an individual.
const INSTITUTION_LABELS: &[&str] = &[
    "Organization",
    "Institution",
    "Company",
    "Government",
    "GovernmentAgency",
    "University",
    "Media",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    Individual,
    Institution,
}

pub fn classify(entity_type: &str) -> EntityClass {
    if INSTITUTION_LABELS.iter().any(|l| l.eq_ignore_ascii_case(entity_type)) {
        EntityClass::Institution
    } else {
        EntityClass::Individual
    }
}

/// The target persistence format for [`ProfileSynthesizer::generate_all`]'s realtime
/// save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Reddit,
    Twitter,
}

#[derive(Debug, Clone)]
pub struct GenerateAllOptions {
    pub use_llm: bool,
    pub parallel_n: usize,
    pub realtime_path: Option<PathBuf>,
    pub platform: Platform,
}

impl Default for GenerateAllOptions {
    fn default() -> Self {
        Self {
            use_llm: true,
            parallel_n: 4,
            realtime_path: None,
            platform: Platform::Reddit,
        }
    }
}

/// LLM JSON response shape for one profile.
#[derive(Debug, Deserialize, Default)]
struct RawProfile {
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    persona: Option<String>,
    #[serde(default)]
    age: Option<u32>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    mbti: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    profession: Option<String>,
    #[serde(default)]
    interests: Vec<String>,
}

pub struct ProfileSynthesizer {
    graph: Arc<dyn GraphClient>,
    llm: Arc<dyn LlmClient>,
}

impl ProfileSynthesizer {
    pub fn new(graph: Arc<dyn GraphClient>, llm: Arc<dyn LlmClient>) -> Self {
        Self { graph, llm }
    }

    /// Produces one [`AgentProfile`] for `entity`, assigning it `user_id`.
    pub async fn generate_one(&self, graph_id: &str, entity: &FilteredEntity, user_id: usize, use_llm: bool) -> AgentProfile {
        let class = classify(&entity.entity_type);

        if !use_llm {
            return rule_based_profile(entity, user_id, class);
        }

        let context = self.enrich_context(graph_id, entity).await;
        let prompt = build_prompt(entity, &context, class);

        for temperature in TEMPERATURE_LADDER {
            match self.llm.complete_json(&prompt, temperature).await {
                Ok(raw_text) => {
                    if let Some(raw) = parse_with_repair::<RawProfile>(&raw_text) {
                        return normalize_profile(entity, user_id, class, raw);
                    }
                    warn!(entity = %entity.name, temperature, "LLM profile response was not parseable JSON, retrying");
                }
                Err(err) => {
                    warn!(entity = %entity.name, temperature, %err, "LLM profile call failed, retrying");
                }
            }
        }

        warn!(entity = %entity.name, "profile generation exhausted all attempts, falling back to rule-based default");
        rule_based_profile(entity, user_id, class)
    }

    /// Retrieves facts and related-node summaries via two concurrent graph searches,
    /// each bounded by a 30s timeout, and deduplicates against edges the entity was
    /// already enriched with.
    async fn enrich_context(&self, graph_id: &str, entity: &FilteredEntity) -> String {
        let nodes_fut = tokio::time::timeout(ENRICHMENT_TIMEOUT, self.graph.search_nodes(graph_id, &entity.name, 10));
        let edges_fut = tokio::time::timeout(ENRICHMENT_TIMEOUT, self.graph.search_edges(graph_id, &entity.name, 10));
        let (nodes_result, edges_result) = tokio::join!(nodes_fut, edges_fut);

        let known_facts: std::collections::HashSet<&str> =
            entity.edges.iter().filter_map(|e| e.fact.as_deref()).collect();

        let mut lines = Vec::new();
        if let Some(summary) = &entity.summary {
            lines.push(format!("Summary: {summary}"));
        }
        for edge in &entity.edges {
            if let Some(fact) = &edge.fact {
                lines.push(format!("Fact: {fact} (with {})", edge.other.name));
            }
        }

        if let Ok(Ok(related_nodes)) = nodes_result {
            lines.push(format!("Related entities found: {}", related_nodes.len()));
        }
        if let Ok(Ok(related_edges)) = edges_result {
            let new_count = related_edges.len();
            if new_count > 0 && !known_facts.is_empty() {
                lines.push(format!("Additional related facts found: {new_count}"));
            } else if new_count > 0 {
                lines.push(format!("Related facts found: {new_count}"));
            }
        }

        lines.join("\n")
    }

    /// Allocates `user_id = index`, runs a bounded worker pool over `entities`, and
    /// streams a full-list incremental save after every completion.
    pub async fn generate_all(
        &self,
        graph_id: &str,
        entities: &[FilteredEntity],
        opts: GenerateAllOptions,
        on_progress: Option<Arc<dyn Fn(usize, usize, &str) + Send + Sync>>,
    ) -> Vec<AgentProfile> {
        let total = entities.len();
        let slots: Mutex<Vec<Option<AgentProfile>>> = Mutex::new(vec![None; total]);
        let completed = Mutex::new(0usize);
        let realtime_path = opts.realtime_path.clone();
        let platform = opts.platform;

        stream::iter(entities.iter().enumerate())
            .for_each_concurrent(opts.parallel_n.max(1), |(index, entity)| {
                let on_progress = on_progress.clone();
                let realtime_path = realtime_path.clone();
                let slots = &slots;
                let completed = &completed;
                async move {
                    let profile = self.generate_one(graph_id, entity, index, opts.use_llm).await;
                    println!("--- profile {} ({}/{}) ---\n{}\n", profile.user_name, index + 1, total, profile.persona);

                    {
                        let mut guard = slots.lock().unwrap();
                        guard[index] = Some(profile);
                    }
                    let done = {
                        let mut c = completed.lock().unwrap();
                        *c += 1;
                        *c
                    };
                    if let Some(cb) = &on_progress {
                        cb(done, total, &format!("generated profile {done}/{total}"));
                    }
                    if let Some(path) = &realtime_path {
                        let snapshot: Vec<AgentProfile> = slots
                            .lock()
                            .unwrap()
                            .iter()
                            .filter_map(|p| p.clone())
                            .collect();
                        if let Err(err) = save_snapshot(path, &snapshot, platform) {
                            warn!(%err, "failed to write realtime profile snapshot");
                        }
                    }
                }
            })
            .await;

        info!(total, "profile generation complete");
        slots.lock().unwrap().iter().filter_map(|p| p.clone()).collect()
    }
}

fn build_prompt(entity: &FilteredEntity, context: &str, class: EntityClass) -> String {
    let template = match class {
        EntityClass::Individual => "Generate a realistic individual social-media persona",
        EntityClass::Institution => "Generate a realistic institutional/organizational social-media persona",
    };
    format!(
        "{template} for entity \"{}\" (type: {}).\nContext:\n{}\nRespond as a JSON object with fields: bio, persona, age, gender, mbti, country, profession, interests.",
        entity.name, entity.entity_type, context
    )
}

fn normalize_profile(entity: &FilteredEntity, user_id: usize, class: EntityClass, raw: RawProfile) -> AgentProfile {
    // Institutions are forced to a neutral age/gender regardless of what the LLM returned
    //.
    let age = match class {
        EntityClass::Institution => 30,
        EntityClass::Individual => raw.age.unwrap_or(30).clamp(13, 90),
    };

    let gender = match class {
        EntityClass::Institution => Gender::Other,
        EntityClass::Individual => raw.gender.as_deref().map(normalize_gender).unwrap_or(Gender::Other),
    };

    let mut bio = raw.bio.unwrap_or_else(|| format!("{} is active on social media.", entity.name));
    if bio.chars().count() > 200 {
        bio = bio.chars().take(200).collect();
    }

    AgentProfile {
        user_id,
        user_name: slugify(&entity.name, user_id),
        display_name: entity.name.clone(),
        bio,
        persona: raw.persona.unwrap_or_else(|| default_persona_text(entity, class)),
        age,
        gender,
        mbti: raw.mbti.filter(|s| !s.is_empty()).unwrap_or_else(|| "INFP".to_string()),
        country: raw.country.filter(|s| !s.is_empty()).unwrap_or_else(|| "Unknown".to_string()),
        profession: raw
            .profession
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_profession(entity, class)),
        interests: raw.interests,
        source_entity_uuid: entity.uuid.clone(),
        source_entity_type: entity.entity_type.clone(),
    }
}

/// Maps the common English and Chinese gender synonyms an LLM prompt response might use,
/// defaulting to `Other`.
fn normalize_gender(raw: &str) -> Gender {
    match raw.trim().to_lowercase().as_str() {
        "male" | "man" | "m" | "男" | "男性" => Gender::Male,
        "female" | "woman" | "f" | "女" | "女性" => Gender::Female,
        _ => Gender::Other,
    }
}

fn rule_based_profile(entity: &FilteredEntity, user_id: usize, class: EntityClass) -> AgentProfile {
    AgentProfile {
        user_id,
        user_name: slugify(&entity.name, user_id),
        display_name: entity.name.clone(),
        bio: format!("{} ({}).", entity.name, entity.entity_type),
        persona: default_persona_text(entity, class),
        age: 30,
        gender: Gender::Other,
        mbti: "INFP".to_string(),
        country: "Unknown".to_string(),
        profession: default_profession(entity, class),
        interests: Vec::new(),
        source_entity_uuid: entity.uuid.clone(),
        source_entity_type: entity.entity_type.clone(),
    }
}

fn default_persona_text(entity: &FilteredEntity, class: EntityClass) -> String {
    match class {
        EntityClass::Institution => format!(
            "{} is an institutional account representing a {}, posting in a formal, measured voice.",
            entity.name, entity.entity_type
        ),
        EntityClass::Individual => format!(
            "{} is an everyday social-media user with an interest in topics related to being a {}.",
            entity.name, entity.entity_type
        ),
    }
}

fn default_profession(entity: &FilteredEntity, class: EntityClass) -> String {
    match class {
        EntityClass::Institution => entity.entity_type.clone(),
        EntityClass::Individual => "Unspecified".to_string(),
    }
}

fn slugify(name: &str, user_id: usize) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", slug.trim_matches('_'), user_id)
}

fn save_snapshot(path: &Path, profiles: &[AgentProfile], platform: Platform) -> Result<()> {
    match platform {
        Platform::Reddit => {
            let records: Vec<RedditProfileRecord> = profiles.iter().map(RedditProfileRecord::from).collect();
            sim_core::write_atomic_json(path, &records)?;
        }
        Platform::Twitter => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for profile in profiles {
                let record = TwitterProfileRecord::from(profile);
                writer.serialize(record)?;
            }
            let bytes: Vec<u8> = writer.into_inner().map_err(|e| e.into_error())?;
            sim_core::write_atomic(path, &bytes)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_graph::FilteredEntity;
    use sim_providers::{EchoLlmClient, InMemoryGraphClient};

    fn entity(name: &str, entity_type: &str) -> FilteredEntity {
        FilteredEntity {
            uuid: format!("uuid-{name}"),
            name: name.to_string(),
            labels: vec!["Entity".to_string(), entity_type.to_string()],
            entity_type: entity_type.to_string(),
            summary: None,
            attributes: serde_json::json!({}),
            edges: Vec::new(),
        }
    }

    #[tokio::test]
    async fn generate_all_assigns_user_id_equal_to_index() {
        let graph = Arc::new(InMemoryGraphClient::new());
        let llm = Arc::new(EchoLlmClient::new(
            r#"{"bio":"b","persona":"p","age":25,"gender":"female","mbti":"INTJ","country":"US","profession":"writer","interests":["books"]}"#,
        ));
        let synth = ProfileSynthesizer::new(graph, llm);
        let entities = vec![entity("E1", "Person"), entity("E2", "Person"), entity("E3", "Person")];
        let opts = GenerateAllOptions { parallel_n: 2, ..Default::default() };
        let profiles = synth.generate_all("g1", &entities, opts, None).await;
        assert_eq!(profiles.len(), 3);
        for (i, p) in profiles.iter().enumerate() {
            assert_eq!(p.user_id, i);
        }
        assert_eq!(profiles[0].display_name, "E1");
    }

    #[tokio::test]
    async fn institution_profiles_force_age_30_and_gender_other() {
        let graph = Arc::new(InMemoryGraphClient::new());
        let llm = Arc::new(EchoLlmClient::new(r#"{"age": 99, "gender": "male"}"#));
        let synth = ProfileSynthesizer::new(graph, llm);
        let org = entity("Acme", "Organization");
        let profile = synth.generate_one("g1", &org, 0, true).await;
        assert_eq!(profile.age, 30);
        assert_eq!(profile.gender, Gender::Other);
    }

    #[tokio::test]
    async fn falls_back_to_rule_based_profile_when_llm_unavailable() {
        let graph = Arc::new(InMemoryGraphClient::new());
        let llm = Arc::new(sim_providers::UnavailableLlmClient);
        let synth = ProfileSynthesizer::new(graph, llm);
        let e = entity("Bob", "Person");
        let profile = synth.generate_one("g1", &e, 7, true).await;
        assert_eq!(profile.user_id, 7);
        assert_eq!(profile.display_name, "Bob");
    }

    #[test]
    fn normalize_gender_maps_chinese_synonyms() {
        assert_eq!(normalize_gender("男"), Gender::Male);
        assert_eq!(normalize_gender("女性"), Gender::Female);
        assert_eq!(normalize_gender("unknown"), Gender::Other);
    }
}
