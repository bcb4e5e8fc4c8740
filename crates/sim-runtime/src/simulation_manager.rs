//! SimulationManager: simulation state machine, orchestrating
//! EntityReader -> ProfileSynthesizer -> ConfigSynthesizer into a prepared bundle.

use std::sync::Arc;

use sim_core::{read_json, write_atomic_json, Store};
use sim_graph::EntityReader;
use sim_profile::{ConfigSynthesizer, GenerateAllOptions, Platform, ProfileSynthesizer};
use sim_types::domain::profile::{AgentProfile, RedditProfileRecord, TwitterProfileRecord};
use sim_types::domain::project::ProjectId;
use sim_types::domain::simulation::{PlatformFlags, Simulation, SimulationId, SimulationStatus};

use crate::error::{Error, Result};

pub struct PrepareOptions {
    pub requirement: String,
    pub document_text: String,
    pub defined_types: Option<Vec<String>>,
    pub use_llm_profiles: bool,
    pub parallel_profile_n: usize,
}

pub struct SimulationManager {
    store: Store,
}

impl SimulationManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn create(&self, project_id: ProjectId, graph_id: impl Into<String>, platforms: PlatformFlags) -> Result<Simulation> {
        let simulation = Simulation::new(project_id, graph_id, platforms);
        self.save(&simulation)?;
        Ok(simulation)
    }

    pub fn save(&self, simulation: &Simulation) -> Result<()> {
        write_atomic_json(&self.store.simulation_state_path(simulation.simulation_id.as_str()), simulation)?;
        Ok(())
    }

    pub fn get(&self, simulation_id: &SimulationId) -> Result<Simulation> {
        read_json(&self.store.simulation_state_path(simulation_id.as_str())).map_err(|e| match e {
            sim_core::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("simulation {simulation_id}"))
            }
            other => Error::from(other),
        })
    }

    pub fn list(&self) -> Result<Vec<Simulation>> {
        let ids = self.store.list_simulation_ids()?;
        let mut simulations: Vec<Simulation> = ids
            .into_iter()
            .filter_map(|id| self.get(&SimulationId::from(id)).ok())
            .collect();
        simulations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(simulations)
    }

    /// Runs EntityReader -> ProfileSynthesizer -> ConfigSynthesizer and persists the
    /// resulting bundle, transitioning `pending -> preparing -> ready | failed`.
    #[allow(clippy::too_many_arguments)]
    pub async fn prepare(
        &self,
        simulation_id: &SimulationId,
        opts: PrepareOptions,
        entity_reader: &EntityReader,
        profile_synth: &ProfileSynthesizer,
        config_synth: &ConfigSynthesizer,
    ) -> Result<()> {
        let mut simulation = self.get(simulation_id)?;
        simulation.status = SimulationStatus::Preparing;
        simulation.touch();
        self.save(&simulation)?;

        let result = self.prepare_inner(&mut simulation, opts, entity_reader, profile_synth, config_synth).await;

        match result {
            Ok(()) => {
                simulation.status = SimulationStatus::Ready;
                simulation.last_error = None;
                simulation.touch();
                self.save(&simulation)?;
                Ok(())
            }
            Err(err) => {
                simulation.status = SimulationStatus::Failed;
                simulation.last_error = Some(err.to_string());
                simulation.touch();
                let _ = self.save(&simulation);
                Err(err)
            }
        }
    }

    async fn prepare_inner(
        &self,
        simulation: &mut Simulation,
        opts: PrepareOptions,
        entity_reader: &EntityReader,
        profile_synth: &ProfileSynthesizer,
        config_synth: &ConfigSynthesizer,
    ) -> Result<()> {
        let filtered = entity_reader
            .filter_defined(&simulation.graph_id, opts.defined_types.as_deref(), true)
            .await?;
        if filtered.entities.is_empty() {
            return Err(Error::InvalidOperation("no entities available to prepare a simulation from".to_string()));
        }

        let reddit_path = self.store.reddit_profiles_path(simulation.simulation_id.as_str());
        let generate_opts = GenerateAllOptions {
            use_llm: opts.use_llm_profiles,
            parallel_n: opts.parallel_profile_n.max(1),
            realtime_path: Some(reddit_path.clone()),
            platform: Platform::Reddit,
        };
        let profiles = profile_synth
            .generate_all(&simulation.graph_id, &filtered.entities, generate_opts, None)
            .await;

        persist_profiles(&self.store, simulation.simulation_id.as_str(), &profiles)?;

        let parameters = config_synth
            .generate(&opts.requirement, &filtered.entity_types_seen, &profiles, opts.use_llm_profiles)
            .await?;
        write_atomic_json(&self.store.simulation_config_path(simulation.simulation_id.as_str()), &parameters)?;

        simulation.entity_count = filtered.entities.len();
        simulation.profile_count = profiles.len();
        simulation.entity_types = filtered.entity_types_seen;
        simulation.config_generated = true;
        let _ = opts.document_text;
        Ok(())
    }

    /// `preparing` + all four required files present auto-upgrades to `ready`.
    pub fn is_prepared(&self, simulation_id: &SimulationId) -> Result<bool> {
        let Ok(mut simulation) = self.get(simulation_id) else {
            return Ok(false);
        };

        let id = simulation_id.as_str();
        let all_files_present = self.store.simulation_state_path(id).exists()
            && self.store.simulation_config_path(id).exists()
            && self.store.reddit_profiles_path(id).exists()
            && self.store.twitter_profiles_path(id).exists();

        if !all_files_present || !simulation.config_generated {
            return Ok(false);
        }

        if simulation.status == SimulationStatus::Preparing {
            simulation.status = SimulationStatus::Ready;
            simulation.touch();
            self.save(&simulation)?;
        }

        Ok(matches!(
            simulation.status,
            SimulationStatus::Ready
                | SimulationStatus::Preparing
                | SimulationStatus::Running
                | SimulationStatus::Completed
                | SimulationStatus::Stopped
                | SimulationStatus::Failed
        ))
    }

    pub fn start(&self, simulation_id: &SimulationId, force: bool) -> Result<Simulation> {
        let mut simulation = self.get(simulation_id)?;
        if !simulation.status.can_start() && !force {
            return Err(Error::InvalidOperation(format!(
                "simulation {simulation_id} cannot start from status {:?}",
                simulation.status
            )));
        }
        simulation.status = SimulationStatus::Running;
        simulation.last_error = None;
        simulation.touch();
        self.save(&simulation)?;
        Ok(simulation)
    }

    pub fn mark_completed(&self, simulation_id: &SimulationId) -> Result<()> {
        self.transition(simulation_id, SimulationStatus::Completed, None)
    }

    pub fn mark_stopped(&self, simulation_id: &SimulationId) -> Result<()> {
        self.transition(simulation_id, SimulationStatus::Stopped, None)
    }

    pub fn mark_failed(&self, simulation_id: &SimulationId, error: impl Into<String>) -> Result<()> {
        self.transition(simulation_id, SimulationStatus::Failed, Some(error.into()))
    }

    fn transition(&self, simulation_id: &SimulationId, status: SimulationStatus, error: Option<String>) -> Result<()> {
        let mut simulation = self.get(simulation_id)?;
        simulation.status = status;
        simulation.last_error = error;
        simulation.touch();
        self.save(&simulation)
    }
}

fn persist_profiles(store: &Store, simulation_id: &str, profiles: &[AgentProfile]) -> Result<()> {
    let reddit: Vec<RedditProfileRecord> = profiles.iter().map(RedditProfileRecord::from).collect();
    write_atomic_json(&store.reddit_profiles_path(simulation_id), &reddit)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    for profile in profiles {
        writer.serialize(TwitterProfileRecord::from(profile)).map_err(|e| Error::InvalidOperation(e.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    sim_core::write_atomic(&store.twitter_profiles_path(simulation_id), &bytes)?;
    Ok(())
}

/// Convenience for callers that only have borrowed providers (e.g. the CLI demo)
/// and want an `Arc`-wrapped manager shareable across tasks.
pub fn shared(store: Store) -> Arc<SimulationManager> {
    Arc::new(SimulationManager::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_providers::{EchoLlmClient, GraphClient, InMemoryGraphClient};
    use std::sync::Arc as StdArc;
    use tempfile::TempDir;

    fn manager() -> (TempDir, SimulationManager) {
        let dir = TempDir::new().unwrap();
        (dir, SimulationManager::new(Store::new(dir.path())))
    }

    #[tokio::test]
    async fn prepare_fails_when_graph_has_no_entities() {
        let (_dir, manager) = manager();
        let simulation = manager
            .create(ProjectId::generate(), "empty-graph", PlatformFlags { twitter: true, reddit: true })
            .unwrap();

        let graph = StdArc::new(InMemoryGraphClient::new());
        let llm = StdArc::new(EchoLlmClient::new("{}"));
        let entity_reader = EntityReader::new(graph.clone());
        let profile_synth = ProfileSynthesizer::new(graph.clone(), llm.clone());
        let config_synth = ConfigSynthesizer::new(llm);

        let opts = PrepareOptions {
            requirement: "scenario".to_string(),
            document_text: String::new(),
            defined_types: None,
            use_llm_profiles: false,
            parallel_profile_n: 2,
        };

        let result = manager
            .prepare(&simulation.simulation_id, opts, &entity_reader, &profile_synth, &config_synth)
            .await;
        assert!(result.is_err());

        let reloaded = manager.get(&simulation.simulation_id).unwrap();
        assert_eq!(reloaded.status, SimulationStatus::Failed);
    }

    #[tokio::test]
    async fn prepare_succeeds_and_persists_all_bundle_files() {
        let (_dir, manager) = manager();
        let graph = StdArc::new(InMemoryGraphClient::new());
        let graph_id = graph.create_graph("g").await.unwrap();
        graph.seed_nodes(
            &graph_id,
            vec![sim_providers::GraphNode {
                uuid: "u1".to_string(),
                name: "Alice".to_string(),
                labels: vec!["Entity".to_string(), "Person".to_string()],
                summary: None,
                attributes: serde_json::json!({}),
            }],
        );

        let simulation = manager
            .create(ProjectId::generate(), graph_id, PlatformFlags { twitter: true, reddit: true })
            .unwrap();

        let llm = StdArc::new(EchoLlmClient::new("{}"));
        let entity_reader = EntityReader::new(graph.clone());
        let profile_synth = ProfileSynthesizer::new(graph.clone(), llm.clone());
        let config_synth = ConfigSynthesizer::new(llm);

        let opts = PrepareOptions {
            requirement: "scenario".to_string(),
            document_text: String::new(),
            defined_types: None,
            use_llm_profiles: false,
            parallel_profile_n: 2,
        };

        manager
            .prepare(&simulation.simulation_id, opts, &entity_reader, &profile_synth, &config_synth)
            .await
            .unwrap();

        assert!(manager.is_prepared(&simulation.simulation_id).unwrap());
        let reloaded = manager.get(&simulation.simulation_id).unwrap();
        assert_eq!(reloaded.status, SimulationStatus::Ready);
        assert_eq!(reloaded.entity_count, 1);
    }
}
