//! Typed filesystem layout for projects, simulations, and reports.
//!
//! All writes go through [`write_atomic`]/[`write_atomic_json`]: write to a temporary
//! sibling file, fsync, then rename over the destination, so readers never observe a
//! partially-written file.

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Root of the `uploads/{projects,simulations,reports}/` tree plus the sibling `logs/`
/// directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.uploads_dir().join("projects").join(project_id)
    }

    pub fn project_files_dir(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("files")
    }

    pub fn project_json_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("project.json")
    }

    pub fn extracted_text_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("extracted_text.txt")
    }

    pub fn simulation_dir(&self, simulation_id: &str) -> PathBuf {
        self.uploads_dir().join("simulations").join(simulation_id)
    }

    pub fn simulation_state_path(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("state.json")
    }

    pub fn reddit_profiles_path(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("reddit_profiles.json")
    }

    pub fn twitter_profiles_path(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("twitter_profiles.csv")
    }

    pub fn simulation_config_path(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("simulation_config.json")
    }

    pub fn platform_dir(&self, simulation_id: &str, platform: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join(platform)
    }

    pub fn actions_log_path(&self, simulation_id: &str, platform: &str) -> PathBuf {
        self.platform_dir(simulation_id, platform).join("actions.jsonl")
    }

    pub fn simulation_log_path(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("simulation.log")
    }

    pub fn run_state_path(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("run_state.json")
    }

    pub fn env_status_path(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("env_status.json")
    }

    pub fn ipc_commands_dir(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("ipc_commands")
    }

    pub fn ipc_responses_dir(&self, simulation_id: &str) -> PathBuf {
        self.simulation_dir(simulation_id).join("ipc_responses")
    }

    pub fn platform_db_path(&self, simulation_id: &str, platform: &str) -> PathBuf {
        self.simulation_dir(simulation_id)
            .join(format!("{platform}_simulation.db"))
    }

    pub fn report_dir(&self, report_id: &str) -> PathBuf {
        self.uploads_dir().join("reports").join(report_id)
    }

    pub fn report_meta_path(&self, report_id: &str) -> PathBuf {
        self.report_dir(report_id).join("meta.json")
    }

    pub fn report_outline_path(&self, report_id: &str) -> PathBuf {
        self.report_dir(report_id).join("outline.json")
    }

    pub fn report_progress_path(&self, report_id: &str) -> PathBuf {
        self.report_dir(report_id).join("progress.json")
    }

    /// 1-based, zero-padded section filename.
    pub fn report_section_path(&self, report_id: &str, section_number: usize) -> PathBuf {
        self.report_dir(report_id)
            .join(format!("section_{section_number:02}.md"))
    }

    pub fn report_full_path(&self, report_id: &str) -> PathBuf {
        self.report_dir(report_id).join("full_report.md")
    }

    pub fn report_agent_log_path(&self, report_id: &str) -> PathBuf {
        self.report_dir(report_id).join("agent_log.jsonl")
    }

    pub fn report_console_log_path(&self, report_id: &str) -> PathBuf {
        self.report_dir(report_id).join("console_log.txt")
    }

    /// Sorted descending by the `created_at` field every entity in this subtree carries.
    pub fn list_project_ids(&self) -> Result<Vec<String>> {
        list_subdirs(&self.uploads_dir().join("projects"))
    }

    pub fn list_simulation_ids(&self) -> Result<Vec<String>> {
        list_subdirs(&self.uploads_dir().join("simulations"))
    }

    pub fn list_report_ids(&self) -> Result<Vec<String>> {
        list_subdirs(&self.uploads_dir().join("reports"))
    }
}

fn list_subdirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir()
            && let Some(name) = entry.file_name().to_str()
        {
            ids.push(name.to_string());
        }
    }
    Ok(ids)
}

/// Write `contents` durably: temp sibling file, fsync, atomic rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = sibling_tmp_path(path);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn write_atomic_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &contents)
}

/// Reads and parses a JSON file, surfacing [`Error::CorruptRecord`] instead of a bare
/// parse error so callers can distinguish "never written" (`NotFound`, handled by the
/// caller) from "written but unreadable".
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read(path)?;
    serde_json::from_slice(&contents).map_err(|_| Error::CorruptRecord {
        path: path.display().to_string(),
    })
}

pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tmp");
    let tmp_name = format!(".{file_name}.{}.tmp", std::process::id());
    path.with_file_name(tmp_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        value: u32,
    }

    #[test]
    fn write_atomic_json_then_read_json_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dummy.json");
        write_atomic_json(&path, &Dummy { value: 42 }).unwrap();
        let loaded: Dummy = read_json(&path).unwrap();
        assert_eq!(loaded, Dummy { value: 42 });
    }

    #[test]
    fn read_json_opt_returns_none_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Option<Dummy> = read_json_opt(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn read_json_reports_corrupt_record_for_unparseable_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"not json").unwrap();
        let result: Result<Dummy> = read_json(&path);
        assert!(matches!(result, Err(Error::CorruptRecord { .. })));
    }

    #[test]
    fn store_paths_follow_the_documented_layout() {
        let store = Store::new("/data/root");
        assert_eq!(
            store.project_json_path("p1"),
            PathBuf::from("/data/root/uploads/projects/p1/project.json")
        );
        assert_eq!(
            store.actions_log_path("s1", "twitter"),
            PathBuf::from("/data/root/uploads/simulations/s1/twitter/actions.jsonl")
        );
        assert_eq!(
            store.report_section_path("r1", 3),
            PathBuf::from("/data/root/uploads/reports/r1/section_03.md")
        );
    }

    #[test]
    fn list_project_ids_empty_when_directory_absent() {
        let store = Store::new("/nonexistent/does/not/exist");
        assert_eq!(store.list_project_ids().unwrap(), Vec::<String>::new());
    }
}
