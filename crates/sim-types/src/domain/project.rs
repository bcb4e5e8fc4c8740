use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a [`Project`], also the name of its folder under
/// `uploads/projects/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a [`Project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Created,
    OntologyGenerated,
    GraphBuilding,
    GraphCompleted,
    Failed,
}

/// Descriptor of a single uploaded source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub original_filename: String,
    pub saved_filename: String,
    pub path: String,
    pub size: u64,
}

/// Chunking parameters used by [`crate::domain::ontology`]/graph building.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub requirement: String,
    #[serde(default)]
    pub files: Vec<UploadedFile>,
    #[serde(default)]
    pub extracted_text_len: usize,
    #[serde(default)]
    pub ontology: Option<super::ontology::Ontology>,
    #[serde(default)]
    pub analysis_summary: Option<String>,
    #[serde(default)]
    pub graph_id: Option<String>,
    pub chunk_params: ChunkParams,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            project_id,
            name: name.into(),
            status: ProjectStatus::Created,
            requirement: String::new(),
            files: Vec::new(),
            extracted_text_len: 0,
            ontology: None,
            analysis_summary: None,
            graph_id: None,
            chunk_params: ChunkParams::default(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
