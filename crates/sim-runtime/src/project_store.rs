//! ProjectStore: project CRUD, file upload, and extracted-text
//! persistence on top of [`sim_core::Store`].

use std::fs;
use std::path::PathBuf;

use sim_core::{read_json, write_atomic, write_atomic_json, Store};
use sim_types::domain::project::{Project, ProjectId, UploadedFile};

use crate::error::{Error, Result};

/// File extensions accepted for upload.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "md", "markdown", "txt"];

pub struct ProjectStore {
    store: Store,
}

impl ProjectStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn create(&self, name: impl Into<String>) -> Result<Project> {
        let project = Project::new(ProjectId::generate(), name);
        self.save(&project)?;
        Ok(project)
    }

    pub fn save(&self, project: &Project) -> Result<()> {
        write_atomic_json(&self.store.project_json_path(project.project_id.as_str()), project)?;
        Ok(())
    }

    pub fn get(&self, project_id: &ProjectId) -> Result<Project> {
        read_json(&self.store.project_json_path(project_id.as_str()))
            .map_err(Error::from)
            .map_err(|e| match e {
                Error::Core(sim_core::Error::Io(io)) if io.kind() == std::io::ErrorKind::NotFound => {
                    Error::NotFound(format!("project {project_id}"))
                }
                other => other,
            })
    }

    pub fn list(&self, limit: Option<usize>) -> Result<Vec<Project>> {
        let mut ids = self.store.list_project_ids()?;
        let mut projects: Vec<Project> = Vec::new();
        for id in ids.drain(..) {
            if let Ok(project) = self.get(&ProjectId::from(id)) {
                projects.push(project);
            }
        }
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            projects.truncate(limit);
        }
        Ok(projects)
    }

    pub fn delete(&self, project_id: &ProjectId) -> Result<()> {
        let dir = self.store.project_dir(project_id.as_str());
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Stores `bytes` under `files/` with a random short filename, rejecting
    /// extensions outside `{pdf, md, markdown, txt}`.
    pub fn save_file(&self, project_id: &ProjectId, original_filename: &str, bytes: &[u8]) -> Result<UploadedFile> {
        let ext = PathBuf::from(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(Error::InvalidOperation(format!("unsupported file extension: {ext}")));
        }

        let saved_filename = format!("{}.{ext}", uuid::Uuid::new_v4());
        let path = self.store.project_files_dir(project_id.as_str()).join(&saved_filename);
        write_atomic(&path, bytes)?;

        Ok(UploadedFile {
            original_filename: original_filename.to_string(),
            saved_filename,
            path: path.to_string_lossy().into_owned(),
            size: bytes.len() as u64,
        })
    }

    pub fn save_extracted_text(&self, project_id: &ProjectId, text: &str) -> Result<()> {
        write_atomic(&self.store.extracted_text_path(project_id.as_str()), text.as_bytes())?;
        Ok(())
    }

    pub fn get_extracted_text(&self, project_id: &ProjectId) -> Result<String> {
        let path = self.store.extracted_text_path(project_id.as_str());
        Ok(fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_types::domain::project::ProjectStatus;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(Store::new(dir.path()));
        (dir, store)
    }

    #[test]
    fn create_then_get_round_trips() {
        let (_dir, store) = store();
        let project = store.create("demo").unwrap();
        let fetched = store.get(&project.project_id).unwrap();
        assert_eq!(fetched.name, "demo");
        assert_eq!(fetched.status, ProjectStatus::Created);
    }

    #[test]
    fn save_file_rejects_unsupported_extension() {
        let (_dir, store) = store();
        let project = store.create("demo").unwrap();
        let result = store.save_file(&project.project_id, "payload.exe", b"data");
        assert!(result.is_err());
    }

    #[test]
    fn save_file_accepts_allowed_extension_and_roundtrips_bytes() {
        let (_dir, store) = store();
        let project = store.create("demo").unwrap();
        let uploaded = store.save_file(&project.project_id, "doc.md", b"# hi").unwrap();
        assert_eq!(uploaded.original_filename, "doc.md");
        let bytes = fs::read(&uploaded.path).unwrap();
        assert_eq!(bytes, b"# hi");
    }

    #[test]
    fn list_orders_by_created_at_descending() {
        let (_dir, store) = store();
        let a = store.create("first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = store.create("second").unwrap();
        let listed = store.list(None).unwrap();
        assert_eq!(listed[0].project_id, b.project_id);
        assert_eq!(listed[1].project_id, a.project_id);
    }

    #[test]
    fn delete_removes_the_project_directory() {
        let (_dir, store) = store();
        let project = store.create("demo").unwrap();
        store.delete(&project.project_id).unwrap();
        assert!(store.get(&project.project_id).is_err());
    }
}
