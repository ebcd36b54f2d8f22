//! # Parsers
//!
//! Parsers for raw build output. Each is a pure function returning [`crate::error::MarkerError`] on failure.
//!
//! The available parsers are:
//! - [`trace_parser`]: Recovers the test score from a CI job trace.

pub mod trace_parser;
