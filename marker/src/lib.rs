//! # Marker Library
//!
//! Turns CI output into scores. Everything here is independent of how the data was
//! fetched, so the bulk scoring run and the single-job retry tool share the same logic.
//!
//! ## Key Concepts
//! - **Trace parsing**: [`parsers::trace_parser::extract_score`] reads the score a test harness printed.
//! - **Penalties**: [`penalty::assess`] converts lateness into a kept percentage.
//! - **Integrity**: [`integrity::verify`] audits harness files against per-track allow-lists.
//! - **Records**: [`types::ScoreRecord`] is what ends up in a result file.

pub mod error;
pub mod integrity;
pub mod parsers;
pub mod penalty;
pub mod toolchain;
pub mod types;
pub mod utilities;

pub use error::MarkerError;
pub use integrity::{IntegrityReport, Violation, ViolationKind};
pub use parsers::trace_parser::{TraceRules, TraceVerdict, extract_score};
pub use types::{AnnotatedScore, Penalty, ScoreRecord};
