//! GitLab v4 REST implementation of the facade traits.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, redirect};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::FacadeError;
use crate::facade::{BuildFacade, Directory, JobControl};
use crate::models::{Branch, FileInfo, Job, PipelineRun, Project, User};

/// Everything except unreserved characters is escaped, so `/` inside file and
/// namespace paths survives as a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encodes one URL path segment.
pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT).to_string()
}

/// Keeps at most the last `max` bytes of a streamed trace; scores are printed at the end.
///
/// Memory stays within twice `max` however long the stream is.
#[derive(Debug)]
pub struct TraceTail {
    buf: Vec<u8>,
    max: usize,
    seen: usize,
}

impl TraceTail {
    pub fn new(max: usize) -> Self {
        Self {
            buf: Vec::new(),
            max,
            seen: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.seen += chunk.len();
        let chunk = &chunk[chunk.len().saturating_sub(self.max)..];
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > self.max.saturating_mul(2).max(1) {
            let excess = self.buf.len() - self.max;
            self.buf.drain(..excess);
        }
    }

    /// Total bytes pushed, kept or not.
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn into_string(self) -> String {
        let start = self.buf.len().saturating_sub(self.max);
        String::from_utf8_lossy(&self.buf[start..]).into_owned()
    }
}

#[derive(Clone)]
pub struct GitLabClient {
    http: Client,
    base_url: String,
    max_trace_bytes: usize,
}

impl GitLabClient {
    /// Builds a client authenticating with a private token.
    ///
    /// `timeout` bounds every request; it is the only timeout the grading pipeline has.
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        max_trace_bytes: usize,
    ) -> Result<Self, FacadeError> {
        let mut token_value = HeaderValue::from_str(token)
            .map_err(|_| FacadeError::Unauthorized("token is not a valid header value".into()))?;
        token_value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("PRIVATE-TOKEN", token_value);

        let http = Client::builder()
            .user_agent(concat!("grader/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .gzip(true)
            .timeout(timeout)
            .redirect(redirect::Policy::limited(5))
            .build()
            .map_err(|e| FacadeError::RemoteUnavailable(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_trace_bytes,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, FacadeError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(%status, what, "remote call");
        if status.is_success() {
            Ok(response)
        } else {
            Err(FacadeError::from_status(status, what))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, FacadeError> {
        let response = self
            .send(self.http.get(self.url(path)).query(query), what)
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| FacadeError::Malformed(format!("{what}: {e}")))
    }
}

#[async_trait]
impl BuildFacade for GitLabClient {
    async fn latest_commit(&self, project: u64, branch: &str) -> Result<String, FacadeError> {
        let path = format!(
            "/projects/{project}/repository/branches/{}",
            encode_segment(branch)
        );
        let branch_info: Branch = self
            .get_json(&path, &[], &format!("branch {branch} of project {project}"))
            .await?;
        Ok(branch_info.commit.id)
    }

    async fn pipelines(
        &self,
        project: u64,
        commit: &str,
        branch: &str,
    ) -> Result<Vec<PipelineRun>, FacadeError> {
        self.get_json(
            &format!("/projects/{project}/pipelines"),
            &[("sha", commit), ("ref", branch)],
            &format!("pipelines of project {project}"),
        )
        .await
    }

    async fn jobs(&self, project: u64, pipeline: u64) -> Result<Vec<Job>, FacadeError> {
        self.get_json(
            &format!("/projects/{project}/pipelines/{pipeline}/jobs"),
            &[],
            &format!("jobs of pipeline {pipeline}"),
        )
        .await
    }

    async fn job_trace(&self, project: u64, job: u64) -> Result<String, FacadeError> {
        let what = format!("trace of job {job}");
        let response = self
            .send(
                self.http
                    .get(self.url(&format!("/projects/{project}/jobs/{job}/trace"))),
                &what,
            )
            .await?;
        let mut stream = response.bytes_stream();
        let mut tail = TraceTail::new(self.max_trace_bytes);
        while let Some(chunk) = stream.next().await {
            tail.push(&chunk?);
        }
        if tail.seen() > self.max_trace_bytes {
            debug!(job, size = tail.seen(), "trace truncated to its tail");
        }
        Ok(tail.into_string())
    }

    async fn file_hash(&self, project: u64, path: &str, git_ref: &str) -> Result<String, FacadeError> {
        let info: FileInfo = self
            .get_json(
                &format!(
                    "/projects/{project}/repository/files/{}",
                    encode_segment(path)
                ),
                &[("ref", git_ref)],
                &format!("file {path}@{git_ref}"),
            )
            .await?;
        Ok(info.content_sha256)
    }

    async fn file_bytes(&self, project: u64, path: &str, git_ref: &str) -> Result<Vec<u8>, FacadeError> {
        let what = format!("raw file {path}@{git_ref}");
        let response = self
            .send(
                self.http
                    .get(self.url(&format!(
                        "/projects/{project}/repository/files/{}/raw",
                        encode_segment(path)
                    )))
                    .query(&[("ref", git_ref)]),
                &what,
            )
            .await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Directory for GitLabClient {
    async fn find_user(&self, username: &str) -> Result<User, FacadeError> {
        let users: Vec<User> = self
            .get_json("/users", &[("username", username)], &format!("user {username}"))
            .await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| FacadeError::NotFound(format!("user {username}")))
    }

    async fn find_project(&self, path: &str) -> Result<Project, FacadeError> {
        self.get_json(
            &format!("/projects/{}", encode_segment(path)),
            &[],
            &format!("project {path}"),
        )
        .await
    }
}

#[async_trait]
impl JobControl for GitLabClient {
    async fn job(&self, project: u64, job: u64) -> Result<Job, FacadeError> {
        self.get_json(
            &format!("/projects/{project}/jobs/{job}"),
            &[],
            &format!("job {job}"),
        )
        .await
    }

    async fn retry_job(&self, project: u64, job: u64) -> Result<Job, FacadeError> {
        let what = format!("retry of job {job}");
        let response = self
            .send(
                self.http
                    .post(self.url(&format!("/projects/{project}/jobs/{job}/retry"))),
                &what,
            )
            .await?;
        response
            .json::<Job>()
            .await
            .map_err(|e| FacadeError::Malformed(format!("{what}: {e}")))
    }
}
