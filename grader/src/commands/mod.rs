//! CLI commands. Each one walks the class files, fans out over students, and prints
//! a short human-readable summary to stdout.

pub mod hash;
pub mod reports;
pub mod resolve;
pub mod retry;
pub mod score;
