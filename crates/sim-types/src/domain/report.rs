use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ReportId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReportId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle of a [`Report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Planning,
    Generating,
    Completed,
    Failed,
}

/// One subsection of an [`OutlineSection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSubsection {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub title: String,
    #[serde(default)]
    pub subsections: Vec<OutlineSubsection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Outline {
    pub title: String,
    pub summary: String,
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: ReportId,
    pub simulation_id: String,
    pub graph_id: String,
    pub requirement: String,
    pub status: ReportStatus,
    #[serde(default)]
    pub outline: Option<Outline>,
    /// Assembled `full_report.md` contents, set once status reaches `completed`.
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn new(simulation_id: impl Into<String>, graph_id: impl Into<String>, requirement: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            report_id: ReportId::generate(),
            simulation_id: simulation_id.into(),
            graph_id: graph_id.into(),
            requirement: requirement.into(),
            status: ReportStatus::Pending,
            outline: None,
            markdown: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
