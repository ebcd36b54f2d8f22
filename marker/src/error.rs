//! Marker Error Types
//!
//! [`MarkerError`] covers every way raw build output can fail to become a score.
//! Integrity problems are not errors: they are reported in
//! [`crate::integrity::IntegrityReport`] and never stop scoring.

/// Represents all error types that can occur while turning a trace into a score.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkerError {
    /// The harness never reached the test run (marker line absent).
    #[error("no test run found in trace")]
    NoTestRun,
    /// A test run happened, but not for the expected assignment.
    #[error("test run in trace is not for {0}")]
    WrongAssignment(String),
    /// The run finished without printing a score.
    #[error("no score found in trace")]
    NoScoreFound,
    /// The harness printed a number that cannot be a percentage.
    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(f64),
    /// The configured score label produced an unusable pattern.
    #[error("invalid score pattern: {0}")]
    InvalidPattern(String),
    /// The student's toolchain selection file could not be read as TOML.
    #[error("invalid toolchain file: {0}")]
    InvalidToolchainFile(String),
}
