//! Thin demo binary: wires a project, a graph build, a prepared simulation, and a
//! generated report together over the default in-process providers, so the
//! orchestration layer can be exercised end to end without a real HTTP frontend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use sim_core::Store;
use sim_graph::{EntityReader, GraphBuildParams, GraphBuilder};
use sim_profile::{ConfigSynthesizer, ProfileSynthesizer};
use sim_providers::{EchoLlmClient, GraphClient, InMemoryGraphClient, LlmClient, OntologyService, RuleBasedOntologyService};
use sim_report::ReportAgent;
use sim_runtime::simulation_manager::PrepareOptions;
use sim_runtime::{IpcClient, ProjectStore, SimulationManager};
use sim_types::domain::simulation::PlatformFlags;

#[derive(Parser)]
#[command(name = "sim-cli", about = "Demo driver for the simulation-orchestration crates")]
struct Cli {
    /// Root directory for the uploads/ and logs/ trees (defaults to ./sim-data).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs project -> graph build -> simulation prepare -> report generation
    /// against a short seeded document, end to end.
    Demo {
        /// What the resulting simulation should model.
        #[arg(long, default_value = "how public opinion shifts after a product recall")]
        requirement: String,
    },
    /// Lists every project on disk.
    ListProjects,
    /// Lists every simulation on disk.
    ListSimulations,
    /// Lists every report on disk.
    ListReports,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(|| PathBuf::from("./sim-data"));
    let store = Store::new(data_dir.clone());
    std::fs::create_dir_all(store.logs_dir()).context("creating logs directory")?;
    let _log_guard = init_logging(&store);

    match cli.command {
        Command::Demo { requirement } => run_demo(store, &requirement).await,
        Command::ListProjects => {
            for project in ProjectStore::new(store).list(None)? {
                println!("{}  {}  {:?}", project.project_id, project.name, project.status);
            }
            Ok(())
        }
        Command::ListSimulations => {
            for simulation in SimulationManager::new(store).list()? {
                println!("{}  {:?}  entities={}", simulation.simulation_id, simulation.status, simulation.entity_count);
            }
            Ok(())
        }
        Command::ListReports => {
            let reports = ReportAgent::new(
                store,
                Arc::new(InMemoryGraphClient::new()),
                Arc::new(EchoLlmClient::new("{}")),
                None,
            )
            .list()?;
            for report in reports {
                println!("{}  {:?}", report.report_id, report.status);
            }
            Ok(())
        }
    }
}

fn init_logging(store: &Store) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(store.logs_dir(), "sim-cli");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(non_blocking)
        .init();
    guard
}

async fn run_demo(store: Store, requirement: &str) -> Result<()> {
    let document_text = "Acme Corp recalled its flagship blender after reports of overheating. \
        Customers voiced frustration on social media, while the company promised refunds.";

    let llm: Arc<dyn LlmClient> = Arc::new(EchoLlmClient::new("{}"));
    let graph: Arc<dyn GraphClient> = Arc::new(InMemoryGraphClient::new());
    let ontology_service: Arc<dyn OntologyService> = Arc::new(RuleBasedOntologyService);

    let project_store = ProjectStore::new(store.clone());
    let project = project_store.create("opinion-shift-demo")?;
    info!(project_id = %project.project_id, "created project");

    let ontology = ontology_service.generate(&[document_text.to_string()], requirement, None).await?;
    let builder = GraphBuilder::new(graph.clone());
    let build_result = builder.build(ontology, document_text, &GraphBuildParams::default(), None).await?;
    info!(graph_id = %build_result.graph_id, nodes = build_result.node_count, "graph built");

    let simulation_manager = SimulationManager::new(store.clone());
    let simulation = simulation_manager.create(
        project.project_id.clone(),
        build_result.graph_id.clone(),
        PlatformFlags { twitter: true, reddit: true },
    )?;
    info!(simulation_id = %simulation.simulation_id, "created simulation");

    let entity_reader = EntityReader::new(graph.clone());
    let profile_synth = ProfileSynthesizer::new(graph.clone(), llm.clone());
    let config_synth = ConfigSynthesizer::new(llm.clone());

    let prepare_opts = PrepareOptions {
        requirement: requirement.to_string(),
        document_text: document_text.to_string(),
        defined_types: None,
        use_llm_profiles: false,
        parallel_profile_n: 2,
    };
    simulation_manager
        .prepare(&simulation.simulation_id, prepare_opts, &entity_reader, &profile_synth, &config_synth)
        .await
        .context("preparing simulation")?;
    info!(simulation_id = %simulation.simulation_id, "simulation prepared");

    let ipc = Some(Arc::new(IpcClient::new(store.clone())));
    let report_agent = ReportAgent::new(store, graph, llm, ipc);
    let report = report_agent.create(simulation.simulation_id.as_str(), build_result.graph_id, requirement)?;
    report_agent.generate(report.report_id.as_str()).await.context("generating report")?;
    info!(report_id = %report.report_id, "report generated");

    println!("demo complete: project={} simulation={} report={}", project.project_id, simulation.simulation_id, report.report_id);
    Ok(())
}
