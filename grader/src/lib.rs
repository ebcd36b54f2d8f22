//! # Grader
//!
//! Bulk grading of CI-tested assignments: per-student units run concurrently
//! ([`scheduler`]), each composing the remote facade with the pure marker logic
//! ([`unit`]), then results are reduced ([`summary`]) and written ([`report`]).

pub mod commands;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod summary;
pub mod unit;

pub use error::UnitError;
pub use scheduler::{Workers, fan_out, score_class};
pub use summary::Summary;
pub use unit::{Grading, UnitAudit, UnitResult, UnitStatus};
