//! Per-unit failure taxonomy.
//!
//! Every error raised while grading one roster entry ends up as a [`UnitError`] and is
//! turned into a `Failed(reason)` row by the unit processor. None of them reach `main`.

use gitlab_client::FacadeError;
use marker::MarkerError;
use util::{ConfigError, RosterError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error(transparent)]
    Remote(FacadeError),

    #[error(transparent)]
    Trace(#[from] MarkerError),

    #[error("pipeline {pipeline_id} has not started")]
    PendingPipeline { pipeline_id: u64 },

    #[error("pipeline {pipeline_id} has no jobs")]
    NoJobs { pipeline_id: u64 },

    #[error("student has no project")]
    Unresolved,

    #[error("unit task panicked")]
    Panicked,
}

impl From<FacadeError> for UnitError {
    fn from(e: FacadeError) -> Self {
        match e {
            FacadeError::Pending { pipeline_id } => UnitError::PendingPipeline { pipeline_id },
            other => UnitError::Remote(other),
        }
    }
}

impl UnitError {
    /// Stable kebab-case reason recorded with `Failed`/`Skipped` outcomes.
    pub fn reason(&self) -> &'static str {
        match self {
            UnitError::Remote(e) => match e {
                FacadeError::RemoteUnavailable(_) => "remote-unavailable",
                FacadeError::NotFound(_) => "not-found",
                FacadeError::Unauthorized(_) => "unauthorized",
                FacadeError::Pending { .. } => "pipeline-pending",
                FacadeError::Malformed(_) => "malformed-response",
            },
            UnitError::Trace(e) => match e {
                MarkerError::NoTestRun => "no-test-run",
                MarkerError::WrongAssignment(_) => "wrong-assignment",
                MarkerError::NoScoreFound => "no-score-found",
                MarkerError::ScoreOutOfRange(_) => "score-out-of-range",
                MarkerError::InvalidPattern(_) => "invalid-pattern",
                MarkerError::InvalidToolchainFile(_) => "invalid-toolchain-file",
            },
            UnitError::PendingPipeline { .. } => "pipeline-pending",
            UnitError::NoJobs { .. } => "no-jobs",
            UnitError::Unresolved => "unprovisioned",
            UnitError::Panicked => "panicked",
        }
    }
}

/// Problems preparing an assignment for grading; these abort the command.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Marker(#[from] MarkerError),
}

/// Problems writing result or summary files.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Write(#[from] RosterError),

    #[error("failed to encode summary: {0}")]
    Encode(#[from] serde_json::Error),
}
