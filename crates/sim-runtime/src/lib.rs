//! Project/task/simulation state machines, subprocess supervision, file-based IPC, and
//! the graph-memory update pipeline.

pub mod error;
pub mod graph_memory;
pub mod ipc;
pub mod project_store;
pub mod runner;
pub mod shutdown;
pub mod simulation_manager;
pub mod task_registry;

pub use error::{Error, Result};
pub use graph_memory::{AgentActivity, GraphMemoryManager, SimulationGraphMemory};
pub use ipc::IpcClient;
pub use project_store::ProjectStore;
pub use runner::{PlatformSelector, SimulationRunner};
pub use simulation_manager::{PrepareOptions, SimulationManager};
pub use task_registry::{TaskRegistry, TaskUpdate};
