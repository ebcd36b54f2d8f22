//! # Utilities
//!
//! Helpers shared across the marker.
//!
//! - [`trace_normalization`]: Strips terminal control sequences from CI traces.

pub mod trace_normalization;
