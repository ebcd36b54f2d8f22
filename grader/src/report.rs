//! Reporter
//!
//! Result files mirror the roster with the score appended:
//! `username,name,user_id,project_id,score` where `score` is a number, `Failed`,
//! or `number*penalty%`. A JSON summary is written next to them.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use util::roster::write_lines;

use crate::error::ReportError;
use crate::summary::{Summary, percent};
use crate::unit::UnitResult;

pub fn result_line(result: &UnitResult) -> String {
    format!("{},{}", result.entry.to_line(), result.label())
}

/// Writes one class's result file, replacing any previous one.
pub fn write_class_results(path: &Path, results: &[UnitResult]) -> Result<(), ReportError> {
    write_lines(path, results.iter().map(result_line))?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub class: String,
    #[serde(flatten)]
    pub summary: Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub assignment: String,
    pub generated_at: DateTime<Utc>,
    /// Key read for the alternate-toolchain counter, if the assignment has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_flag: Option<String>,
    pub classes: Vec<ClassSummary>,
    pub all: Summary,
}

impl RunSummary {
    pub fn new(assignment: &str, toolchain_flag: Option<&str>) -> Self {
        Self {
            assignment: assignment.to_string(),
            generated_at: Utc::now(),
            toolchain_flag: toolchain_flag.map(str::to_string),
            classes: Vec::new(),
            all: Summary::default(),
        }
    }

    pub fn push(&mut self, class: String, summary: Summary) {
        self.all += summary;
        self.classes.push(ClassSummary { class, summary });
    }

    /// Global rollup as printed after all classes.
    pub fn rollup_lines(&self, counts_parse_errors: bool) -> Vec<String> {
        let all = &self.all;
        let mut lines = vec!["All classes:".to_string(), all.headline()];
        if all.cached > 0 {
            lines.push(format!("Cached: {} ({})", all.cached, percent(all.cached, all.total)));
        }
        if all.late > 0 {
            lines.push(format!("Late: {} ({})", all.late, percent(all.late, all.total)));
        }
        if counts_parse_errors {
            lines.push(format!(
                "Parse Error: {} ({})",
                all.parse_errors,
                percent(all.parse_errors, all.total)
            ));
        }
        if let Some(flag) = &self.toolchain_flag {
            lines.push(format!(
                "Alternate toolchain ({flag}): {} ({})",
                all.alternate_toolchain,
                percent(all.alternate_toolchain, all.total)
            ));
        }
        lines
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let body = serde_json::to_string_pretty(self)?;
        write_lines(path, [body])?;
        Ok(())
    }
}
