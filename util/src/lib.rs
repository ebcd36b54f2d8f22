//! Shared plumbing for the grading tools: configuration, roster files, on-disk layout.

pub mod config;
pub mod course;
pub mod hashing;
pub mod paths;
pub mod roster;

pub use config::{AppConfig, ConfigError};
pub use course::CourseConfig;
pub use roster::{ClassFile, Identity, RosterEntry, RosterError};
