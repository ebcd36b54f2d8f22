//tests/support/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gitlab_client::models::{Project, User};
use gitlab_client::{BuildFacade, BuildStatus, Directory, FacadeError, Job, JobControl, PipelineRun};
use util::{Identity, RosterEntry};

pub const MARKER: &str = "$ python3 sp25-tests/test.py $CI_COMMIT_REF_NAME .";

pub fn trace(assignment: &str, score: &str) -> String {
    format!("Preparing environment\n{MARKER}\nRunning {assignment} test...\nTest score: {score}\nJob succeeded\n")
}

/// 2025-10-01 12:00:00 UTC, before a `2025-10-01 23:59:59` deadline at UTC+8 (15:59:59 UTC).
pub fn on_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
}

pub fn entry(username: &str, project: Option<u64>) -> RosterEntry {
    RosterEntry {
        username: username.to_string(),
        display_name: format!("Student {username}"),
        user_id: Identity::Resolved(1),
        project_id: project.map_or(Identity::Unresolved, Identity::Resolved),
    }
}

#[derive(Debug, Clone)]
pub struct FakeProject {
    pub commit: Result<String, FacadeError>,
    pub pipelines: Vec<PipelineRun>,
    pub jobs: Vec<Job>,
    pub traces: HashMap<u64, String>,
    pub files: HashMap<String, Vec<u8>>,
    /// Trace served for a job created by `retry_job`.
    pub retried_trace: Option<String>,
    /// Facade calls that answer `RemoteUnavailable` for this project.
    pub faults: HashSet<&'static str>,
}

impl FakeProject {
    /// One successful pipeline with one job whose trace reports `score`.
    pub fn scored(assignment: &str, score: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            commit: Ok("abc123".into()),
            pipelines: vec![PipelineRun {
                id: 100,
                status: BuildStatus::Success,
                created_at,
            }],
            jobs: vec![Job {
                id: 1000,
                name: "test".into(),
                status: BuildStatus::Success,
                created_at,
            }],
            traces: HashMap::from([(1000, trace(assignment, score))]),
            files: HashMap::new(),
            retried_trace: None,
            faults: HashSet::new(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            commit: Err(FacadeError::RemoteUnavailable("connection reset".into())),
            ..Self::scored("lab1", "0.00", on_time())
        }
    }

    pub fn pending(assignment: &str) -> Self {
        let mut p = Self::scored(assignment, "100.00", on_time());
        p.pipelines[0].status = BuildStatus::Pending;
        p
    }

    /// Makes `call` (`pipelines`, `jobs`, `job_trace` or `file_hash`) fail with `RemoteUnavailable`.
    pub fn failing_at(mut self, call: &'static str) -> Self {
        self.faults.insert(call);
        self
    }

    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(path.to_string(), bytes.to_vec());
        self
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub projects: Mutex<HashMap<u64, FakeProject>>,
    pub users: HashMap<String, u64>,
    pub project_paths: HashMap<String, u64>,
    /// Added to every trace fetch, to make tasks overlap.
    pub delay: Option<Duration>,
    pub trace_requests: AtomicUsize,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeHost {
    pub fn with_projects(projects: impl IntoIterator<Item = (u64, FakeProject)>) -> Self {
        Self {
            projects: Mutex::new(projects.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn trace_requests(&self) -> usize {
        self.trace_requests.load(Ordering::SeqCst)
    }

    fn project(&self, id: u64) -> Result<FakeProject, FacadeError> {
        self.projects
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| FacadeError::NotFound(format!("project {id}")))
    }

    /// The project, unless `call` is faulted for it.
    fn answer(&self, id: u64, call: &str) -> Result<FakeProject, FacadeError> {
        let project = self.project(id)?;
        if project.faults.contains(call) {
            return Err(FacadeError::RemoteUnavailable(format!("{call} timed out")));
        }
        Ok(project)
    }
}

#[async_trait]
impl BuildFacade for FakeHost {
    async fn latest_commit(&self, project: u64, _branch: &str) -> Result<String, FacadeError> {
        self.project(project)?.commit
    }

    async fn pipelines(&self, project: u64, _commit: &str, _branch: &str) -> Result<Vec<PipelineRun>, FacadeError> {
        Ok(self.answer(project, "pipelines")?.pipelines)
    }

    async fn jobs(&self, project: u64, _pipeline: u64) -> Result<Vec<Job>, FacadeError> {
        Ok(self.answer(project, "jobs")?.jobs)
    }

    async fn job_trace(&self, project: u64, job: u64) -> Result<String, FacadeError> {
        self.trace_requests.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let p = self.answer(project, "job_trace")?;
        if job >= 2000 {
            return p.retried_trace.ok_or_else(|| FacadeError::NotFound(format!("job {job}")));
        }
        p.traces
            .get(&job)
            .cloned()
            .ok_or_else(|| FacadeError::NotFound(format!("job {job}")))
    }

    async fn file_hash(&self, project: u64, path: &str, git_ref: &str) -> Result<String, FacadeError> {
        self.answer(project, "file_hash")?;
        let bytes = self.file_bytes(project, path, git_ref).await?;
        Ok(util::hashing::sha256_hex(&bytes))
    }

    async fn file_bytes(&self, project: u64, path: &str, _git_ref: &str) -> Result<Vec<u8>, FacadeError> {
        self.project(project)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FacadeError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl Directory for FakeHost {
    async fn find_user(&self, username: &str) -> Result<User, FacadeError> {
        self.users
            .get(username)
            .map(|&id| User {
                id,
                username: username.to_string(),
            })
            .ok_or_else(|| FacadeError::NotFound(format!("user {username}")))
    }

    async fn find_project(&self, path: &str) -> Result<Project, FacadeError> {
        self.project_paths
            .get(path)
            .map(|&id| Project {
                id,
                path_with_namespace: path.to_string(),
            })
            .ok_or_else(|| FacadeError::NotFound(format!("project {path}")))
    }
}

#[async_trait]
impl JobControl for FakeHost {
    async fn job(&self, _project: u64, job: u64) -> Result<Job, FacadeError> {
        Ok(Job {
            id: job,
            name: "test".into(),
            status: BuildStatus::Success,
            created_at: Utc::now(),
        })
    }

    async fn retry_job(&self, _project: u64, job: u64) -> Result<Job, FacadeError> {
        Ok(Job {
            id: job + 1000,
            name: "test".into(),
            status: BuildStatus::Pending,
            created_at: Utc::now(),
        })
    }
}
