use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "not_started",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProjectStatus::NotStarted),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(format!("unknown project status '{other}'")),
        }
    }
}

/// One entry of a project's deliverables list.
///
/// Rows written by the web client hold bare strings (a link or a label); richer
/// entries carry an id, a title and a completion flag. Both shapes decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Deliverable {
    Link(String),
    Record {
        id: String,
        title: String,
        #[serde(default)]
        completed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl Deliverable {
    /// A finished deliverable that is just a link (document, prototype, ...).
    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        let title = title.into();
        Deliverable::Record {
            id: title.to_lowercase().replace(' ', "-"),
            title,
            completed: true,
            url: Some(url.into()),
        }
    }
}

impl From<&str> for Deliverable {
    fn from(value: &str) -> Self {
        Deliverable::Link(value.to_string())
    }
}

/// Row of the `project_progress` table, unique per (user_id, project_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: String,
    pub status: ProjectStatus,
    pub progress: i32,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProjectProgress {
    pub user_id: Uuid,
    pub project_id: String,
    pub status: ProjectStatus,
    pub progress: i32,
    pub deliverables: Vec<Deliverable>,
}

/// Partial progress write. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deliverables: Option<Vec<Deliverable>>,
}

impl ProgressUpdate {
    pub fn apply_to(&self, row: &mut ProjectProgress) {
        if let Some(status) = self.status {
            row.status = status;
        }
        if let Some(progress) = self.progress {
            row.progress = progress;
        }
        if let Some(deliverables) = &self.deliverables {
            row.deliverables = deliverables.clone();
        }
    }
}
