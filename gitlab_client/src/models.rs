//! Wire types for the subset of the GitLab v4 API the graders use.
//!
//! Unknown fields are ignored; only what the pipeline reads is modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline and job status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    #[serde(other)]
    Other,
}

impl BuildStatus {
    /// A run that produced a trace worth grading.
    pub fn is_graded(self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::Failed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineRun {
    pub id: u64,
    pub status: BuildStatus,
    /// Submission time used for late penalties.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Job {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub status: BuildStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub file_path: String,
    pub content_sha256: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(default)]
    pub path_with_namespace: String,
}
