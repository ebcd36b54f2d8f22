//! Traits the grading pipeline depends on.
//!
//! Project and pipeline identifiers are the service's numeric ids. Every call may fail with
//! [`FacadeError::RemoteUnavailable`], [`FacadeError::NotFound`] or [`FacadeError::Unauthorized`].

use async_trait::async_trait;

use crate::error::FacadeError;
use crate::models::{BuildStatus, Job, PipelineRun, Project, User};

/// Read-only view of builds and repository contents.
#[async_trait]
pub trait BuildFacade: Send + Sync {
    /// Head commit id of `branch`.
    async fn latest_commit(&self, project: u64, branch: &str) -> Result<String, FacadeError>;

    /// Pipelines for `commit` on `branch`, most recent first as the service orders them.
    async fn pipelines(
        &self,
        project: u64,
        commit: &str,
        branch: &str,
    ) -> Result<Vec<PipelineRun>, FacadeError>;

    /// Jobs of a pipeline in service order.
    async fn jobs(&self, project: u64, pipeline: u64) -> Result<Vec<Job>, FacadeError>;

    /// Raw job log. Untrusted and possibly very large.
    async fn job_trace(&self, project: u64, job: u64) -> Result<String, FacadeError>;

    /// SHA-256 (lower-case hex) of `path` at `git_ref`.
    async fn file_hash(&self, project: u64, path: &str, git_ref: &str) -> Result<String, FacadeError>;

    async fn file_bytes(&self, project: u64, path: &str, git_ref: &str) -> Result<Vec<u8>, FacadeError>;

    /// The newest pipeline for `commit`; see [`select_latest`].
    async fn latest_pipeline(
        &self,
        project: u64,
        commit: &str,
        branch: &str,
    ) -> Result<PipelineRun, FacadeError> {
        let runs = self.pipelines(project, commit, branch).await?;
        select_latest(runs, commit)
    }
}

/// Lookups used when turning a student list into a roster.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<User, FacadeError>;

    /// `path` is the full namespace path, e.g. `compiler/sp25/wang/cp-3210001`.
    async fn find_project(&self, path: &str) -> Result<Project, FacadeError>;
}

/// Job inspection and re-execution, used by the manual retry tool.
#[async_trait]
pub trait JobControl: Send + Sync {
    async fn job(&self, project: u64, job: u64) -> Result<Job, FacadeError>;

    /// Asks the service to run `job` again and returns the newly created job.
    async fn retry_job(&self, project: u64, job: u64) -> Result<Job, FacadeError>;
}

/// Takes the first run of the service's most-recent-first listing.
///
/// Fails with `NotFound` when there is none and with `Pending` when that run has not started.
pub fn select_latest(runs: Vec<PipelineRun>, commit: &str) -> Result<PipelineRun, FacadeError> {
    let latest = runs
        .into_iter()
        .next()
        .ok_or_else(|| FacadeError::NotFound(format!("pipeline for commit {commit}")))?;
    if latest.status == BuildStatus::Pending {
        return Err(FacadeError::Pending {
            pipeline_id: latest.id,
        });
    }
    Ok(latest)
}
