//! SIGINT/SIGTERM coordinator: tears down every
//! tracked simulation and graph-memory pipeline in bounded time, exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::graph_memory::GraphMemoryManager;
use crate::runner::SimulationRunner;

static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Registers a process-wide `ctrlc` handler that stops every running simulation and
/// flushes every graph-memory pipeline before the process exits. Idempotent: only the
/// first call installs the handler. In a development "reloader" setup this must run
/// only in the child process that actually owns the subprocesses.
pub fn register(runner: Arc<SimulationRunner>, graph_memory: Arc<GraphMemoryManager>) -> Result<(), ctrlc::Error> {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    ctrlc::set_handler(move || {
        info!("shutdown signal received, stopping all simulations");
        runner.shutdown_all();
        graph_memory.stop_all();
        std::process::exit(0);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::Store;
    use sim_providers::{EchoLlmClient, InMemoryGraphClient};
    use std::sync::Arc as StdArc;

    #[test]
    fn register_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = StdArc::new(SimulationRunner::new(Store::new(dir.path())));
        let graph_memory = StdArc::new(GraphMemoryManager::new(
            StdArc::new(InMemoryGraphClient::new()),
            StdArc::new(EchoLlmClient::new("{}")),
        ));
        // ctrlc only allows one handler per process; calling register() twice across
        // the whole test binary must not panic even though only the first call
        // actually installs one.
        let _ = register(runner.clone(), graph_memory.clone());
        let _ = register(runner, graph_memory);
    }
}
