//! # Remote Build Facade
//!
//! Read-only access to the code-hosting service that stores student repositories and runs
//! their CI: branch → commit, commit → latest pipeline, pipeline → jobs, job → trace, and
//! file hashes/bytes at a ref.
//!
//! - [`facade`]: the traits the grading pipeline consumes. Tests substitute in-memory fakes.
//! - [`client`]: the GitLab REST (v4) implementation on top of `reqwest`.
//! - [`models`]: wire types.
//!
//! The facade never retries; retry policy belongs to whoever drives it.

pub mod client;
pub mod error;
pub mod facade;
pub mod models;

pub use client::GitLabClient;
pub use error::FacadeError;
pub use facade::{BuildFacade, Directory, JobControl};
pub use models::{BuildStatus, Job, PipelineRun};
