//! Per-simulation monitor thread: tails `{platform}/actions.jsonl`, updates
//! `run_state.json`, forwards activity to the graph-memory pipeline, and detects
//! child exit, using a named-thread-plus-channel pattern.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::process::Child;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use sim_core::Store;
use sim_types::domain::action::LogRecord;
use sim_types::domain::run_state::{RunState, RunnerStatus};
use sim_types::domain::simulation::{PlatformFlags, SimulationId};

use crate::graph_memory::{AgentActivity, SimulationGraphMemory};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

enum ControlMessage {
    Stop,
}

pub struct MonitorHandle {
    control: mpsc::Sender<ControlMessage>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn spawn(
        store: Store,
        simulation_id: SimulationId,
        platforms: PlatformFlags,
        child: Child,
        graph_memory: Option<Arc<SimulationGraphMemory>>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel();
        let join = std::thread::Builder::new()
            .name(format!("sim-monitor-{}", simulation_id.as_str()))
            .spawn(move || run(store, simulation_id, platforms, child, graph_memory, control_rx))
            .expect("failed to spawn simulation monitor thread");

        Self { control: control_tx, join: Some(join) }
    }

    /// Signals the monitor to stop polling and waits up to `timeout` for it to exit.
    pub fn join(mut self, timeout: Duration) {
        let _ = self.control.send(ControlMessage::Stop);
        if let Some(handle) = self.join.take() {
            let deadline = std::time::Instant::now() + timeout;
            while !handle.is_finished() && std::time::Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

struct TailState {
    file: Option<File>,
    offset: u64,
}

impl TailState {
    fn new() -> Self {
        Self { file: None, offset: 0 }
    }

    fn read_new_lines(&mut self, path: &std::path::Path) -> Vec<String> {
        if self.file.is_none() {
            self.file = File::open(path).ok();
            self.offset = 0;
        }
        let Some(file) = self.file.as_mut() else {
            return Vec::new();
        };
        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return Vec::new();
        }
        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => {
                    if !line.ends_with('\n') {
                        break; // partial line; wait for the writer to finish it
                    }
                    self.offset += n as u64;
                    lines.push(line.trim_end().to_string());
                }
                Err(_) => break,
            }
        }
        lines
    }
}

fn run(
    store: Store,
    simulation_id: SimulationId,
    platforms: PlatformFlags,
    mut child: Child,
    graph_memory: Option<Arc<SimulationGraphMemory>>,
    control_rx: mpsc::Receiver<ControlMessage>,
) {
    let id = simulation_id.as_str();
    let platform_names = platforms.platforms();
    let mut tails: Vec<(&'static str, TailState)> =
        platform_names.iter().map(|p| (*p, TailState::new())).collect();

    loop {
        if let Ok(ControlMessage::Stop) = control_rx.try_recv() {
            let _ = child.kill();
            let _ = child.wait();
            return;
        }

        let mut state = match sim_core::read_json::<RunState>(&store.run_state_path(id)) {
            Ok(s) => s,
            Err(err) => {
                warn!(simulation_id = id, %err, "monitor could not read run_state.json");
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
        };

        for (platform, tail) in tails.iter_mut() {
            let path = store.actions_log_path(id, platform);
            if !path.exists() {
                continue;
            }
            for line in tail.read_new_lines(&path) {
                if line.trim().is_empty() {
                    continue;
                }
                match LogRecord::parse(&line) {
                    Ok(LogRecord::Action(action)) => {
                        if let Some(p) = state.platform_mut(platform) {
                            p.action_count += 1;
                        }
                        if let Some(manager) = &graph_memory {
                            manager.enqueue(AgentActivity::from_action(platform, &action));
                        }
                        state.push_action(action);
                    }
                    Ok(LogRecord::RoundEnd { round, simulated_hours }) => {
                        if let Some(p) = state.platform_mut(platform) {
                            p.current_round = round;
                            p.simulated_hours = simulated_hours;
                        }
                        state.current_round = state.twitter.current_round.max(state.reddit.current_round);
                        state.simulated_hours = state.twitter.simulated_hours.max(state.reddit.simulated_hours);
                    }
                    Ok(LogRecord::SimulationEnd { .. }) => {
                        if let Some(p) = state.platform_mut(platform) {
                            p.completed = true;
                            p.running = false;
                        }
                    }
                    Err(err) => {
                        warn!(simulation_id = id, platform, %err, "failed to parse action log line");
                    }
                }
            }
        }

        let any_log_started = platform_names.iter().any(|p| store.actions_log_path(id, p).exists());
        let all_completed = any_log_started
            && platform_names
                .iter()
                .all(|p| !store.actions_log_path(id, p).exists() || state.platform(p).is_some_and(|s| s.completed));
        if all_completed && state.runner_status == RunnerStatus::Running {
            state.runner_status = RunnerStatus::Completed;
            state.completed_at = Some(chrono::Utc::now());
        }

        state.touch();
        if let Err(err) = sim_core::write_atomic_json(&store.run_state_path(id), &state) {
            warn!(simulation_id = id, %err, "failed to persist run_state.json");
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                let mut state = sim_core::read_json::<RunState>(&store.run_state_path(id)).unwrap_or(state);
                if status.success() {
                    state.runner_status = RunnerStatus::Completed;
                    state.completed_at = Some(chrono::Utc::now());
                } else {
                    state.runner_status = RunnerStatus::Failed;
                    state.last_error = Some(tail_simulation_log(&store, id));
                }
                state.touch();
                let _ = sim_core::write_atomic_json(&store.run_state_path(id), &state);
                if let Some(manager) = &graph_memory {
                    manager.shutdown();
                }
                info!(simulation_id = id, exit_code = status.code(), "simulation process exited");
                return;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(simulation_id = id, %err, "failed to poll child status");
                return;
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

fn tail_simulation_log(store: &Store, simulation_id: &str) -> String {
    const TAIL_BYTES: u64 = 4096;
    let path = store.simulation_log_path(simulation_id);
    let Ok(contents) = std::fs::read(&path) else {
        return "simulation process exited with a non-zero status".to_string();
    };
    let start = contents.len().saturating_sub(TAIL_BYTES as usize);
    String::from_utf8_lossy(&contents[start..]).into_owned()
}
