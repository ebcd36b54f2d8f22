//! Process-wide bootstrap shared by the grading binaries.

pub mod logger;

pub use logger::{LogSettings, init_logging};
