//! SimulationRunner: subprocess lifecycle for the external
//! per-platform simulation binary, action-log tailing, and force-stop.

mod monitor;
pub mod reader;

use std::collections::HashMap;
use std::fs;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use sim_core::Store;
use sim_types::domain::run_state::{RunState, RunnerStatus};
use sim_types::domain::simulation::{PlatformFlags, SimulationId};

use crate::error::{Error, Result};
use crate::graph_memory::GraphMemoryManager;

pub use monitor::MonitorHandle;
pub use reader::{ActionFilter, AgentStats, RoundSummary};

/// Path to the wrapper script that launches the external per-platform simulation
/// binary. Out of scope to implement; we only need to invoke it.
const SIMULATION_WRAPPER: &str = "scripts/run_simulation.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSelector {
    Twitter,
    Reddit,
    Parallel,
}

impl PlatformSelector {
    fn arg(self) -> &'static str {
        match self {
            PlatformSelector::Twitter => "twitter",
            PlatformSelector::Reddit => "reddit",
            PlatformSelector::Parallel => "parallel",
        }
    }

    pub fn from_platforms(flags: PlatformFlags) -> Self {
        match (flags.twitter, flags.reddit) {
            (true, true) => PlatformSelector::Parallel,
            (true, false) => PlatformSelector::Twitter,
            (false, true) => PlatformSelector::Reddit,
            (false, false) => PlatformSelector::Parallel,
        }
    }
}

struct RunningChild {
    pid: u32,
    monitor: MonitorHandle,
}

/// Tracks every simulation currently running in this process, so global shutdown
/// can reach every child without consulting disk state.
pub struct SimulationRunner {
    store: Store,
    children: Mutex<HashMap<SimulationId, RunningChild>>,
}

impl SimulationRunner {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            children: Mutex::new(HashMap::new()),
        }
    }

    fn is_alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }

    /// Returns true if the runner already has this simulation's child tracked and alive.
    pub fn is_running(&self, simulation_id: &SimulationId) -> bool {
        self.children
            .lock()
            .unwrap()
            .get(simulation_id)
            .is_some_and(|child| Self::is_alive(child.pid))
    }

    /// Start contract. `graph_memory` is `Some` only when the caller
    /// has already validated `graph_id` and wants action-log activity forwarded.
    pub fn start(
        &self,
        simulation_id: &SimulationId,
        platforms: PlatformFlags,
        total_rounds: u32,
        total_hours: u32,
        force: bool,
        graph_memory: Option<Arc<GraphMemoryManager>>,
        graph_id: Option<String>,
    ) -> Result<u32> {
        if self.is_running(simulation_id) {
            if !force {
                return Err(Error::InvalidOperation(format!(
                    "simulation {simulation_id} is already running; pass force=true to restart"
                )));
            }
            self.stop(simulation_id)?;
            self.clean_run_artifacts(simulation_id)?;
        }

        let selector = PlatformSelector::from_platforms(platforms);
        let log_path = self.store.simulation_log_path(simulation_id.as_str());
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let log_file = fs::OpenOptions::new().create(true).append(true).open(&log_path)?;
        let log_file_err = log_file.try_clone()?;

        let mut command = Command::new(SIMULATION_WRAPPER);
        command
            .arg(selector.arg())
            .arg(simulation_id.as_str())
            .arg(self.store.simulation_dir(simulation_id.as_str()))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err));

        new_process_group(&mut command);

        let child = command.spawn().map_err(|err| {
            Error::InvalidOperation(format!("failed to spawn simulation process: {err}"))
        })?;
        let pid = child.id();

        let mut run_state = RunState::new(simulation_id.as_str(), total_rounds, total_hours);
        run_state.runner_status = RunnerStatus::Running;
        run_state.pid = Some(pid);
        for platform in platforms.platforms() {
            if let Some(p) = run_state.platform_mut(platform) {
                p.running = true;
            }
        }
        sim_core::write_atomic_json(&self.store.run_state_path(simulation_id.as_str()), &run_state)?;

        let gm = match (&graph_memory, &graph_id) {
            (Some(manager), Some(gid)) => Some(manager.create(simulation_id.clone(), gid.clone())),
            _ => None,
        };

        let monitor = MonitorHandle::spawn(self.store.clone(), simulation_id.clone(), platforms, child, gm);

        self.children
            .lock()
            .unwrap()
            .insert(simulation_id.clone(), RunningChild { pid, monitor });

        info!(simulation_id = simulation_id.as_str(), pid, "simulation started");
        Ok(pid)
    }

    /// Stop contract: SIGTERM the process group, 10s grace, SIGKILL,
    /// 5s grace, falling back to per-process signaling if the group lookup fails.
    pub fn stop(&self, simulation_id: &SimulationId) -> Result<()> {
        let child = self.children.lock().unwrap().remove(simulation_id);
        let Some(child) = child else {
            return Ok(());
        };

        terminate_pid(child.pid);
        child.monitor.join(Duration::from_secs(15));

        let path = self.store.run_state_path(simulation_id.as_str());
        if let Ok(mut state) = sim_core::read_json::<RunState>(&path) {
            state.runner_status = RunnerStatus::Stopped;
            state.touch();
            let _ = sim_core::write_atomic_json(&path, &state);
        }
        Ok(())
    }

    /// Removes `run_state.json`, per-platform `actions.jsonl`, `simulation.log`,
    /// `{platform}_simulation.db`, and `env_status.json`, preserving config/profiles.
    fn clean_run_artifacts(&self, simulation_id: &SimulationId) -> Result<()> {
        let id = simulation_id.as_str();
        let paths = [
            self.store.run_state_path(id),
            self.store.simulation_log_path(id),
            self.store.env_status_path(id),
            self.store.actions_log_path(id, "twitter"),
            self.store.actions_log_path(id, "reddit"),
            self.store.platform_db_path(id, "twitter"),
            self.store.platform_db_path(id, "reddit"),
        ];
        for path in paths {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Bounded graceful-then-forceful termination of every tracked child, idempotent,
    /// and safe to call with nothing running.
    pub fn shutdown_all(&self) {
        let children: Vec<SimulationId> = self.children.lock().unwrap().keys().cloned().collect();
        for simulation_id in children {
            if let Err(err) = self.stop(&simulation_id) {
                warn!(simulation_id = simulation_id.as_str(), %err, "error stopping simulation during shutdown");
            }
        }
    }
}

#[cfg(unix)]
fn new_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            libc::setpgid(0, 0);
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn new_process_group(_command: &mut Command) {}

fn terminate_pid(pid: u32) {
    let pgid = pid as i32;
    let group_result = unsafe { libc::kill(-pgid, libc::SIGTERM) };
    if group_result != 0 {
        unsafe { libc::kill(pgid, libc::SIGTERM) };
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while std::time::Instant::now() < deadline {
        if unsafe { libc::kill(pgid, 0) } != 0 {
            return;
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    if group_result == 0 {
        unsafe { libc::kill(-pgid, libc::SIGKILL) };
    } else {
        unsafe { libc::kill(pgid, libc::SIGKILL) };
    }
    std::thread::sleep(Duration::from_secs(5));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_selector_maps_flags_correctly() {
        assert_eq!(
            PlatformSelector::from_platforms(PlatformFlags { twitter: true, reddit: true }),
            PlatformSelector::Parallel
        );
        assert_eq!(
            PlatformSelector::from_platforms(PlatformFlags { twitter: true, reddit: false }),
            PlatformSelector::Twitter
        );
        assert_eq!(
            PlatformSelector::from_platforms(PlatformFlags { twitter: false, reddit: true }),
            PlatformSelector::Reddit
        );
    }

    #[test]
    fn stop_on_untracked_simulation_is_a_no_op() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = SimulationRunner::new(Store::new(dir.path()));
        assert!(runner.stop(&SimulationId::generate()).is_ok());
    }
}
