//!
//! Trace Parser Module
//!
//! Recovers the numeric test score from a CI job trace. Traces are untrusted and noisy:
//! they contain harness setup output, colour codes, possibly several test sections when a
//! test was retried, and whatever the student's program printed.
//!
//! # Algorithm
//!
//! 1. Strip terminal control sequences.
//! 2. Keep only what follows the **last** run marker; no marker means [`MarkerError::NoTestRun`].
//! 3. Require the assignment banner in that remainder, else [`MarkerError::WrongAssignment`].
//! 4. Take the **last** `<label> <number>` match, else [`MarkerError::NoScoreFound`].
//!
//! Timeout and parse-error markers are flagged but never change the score.

use regex::Regex;
use util::course::{ParseErrorRule, TraceConfig};

use crate::error::MarkerError;
use crate::utilities::trace_normalization::strip_control;

/// Compiled trace markers for one course.
#[derive(Debug, Clone)]
pub struct TraceRules {
    run_marker: String,
    banner_template: String,
    score: Regex,
    timeout_marker: String,
    parse_error: Option<ParseErrorRule>,
}

impl TraceRules {
    pub fn new(config: &TraceConfig) -> Result<Self, MarkerError> {
        if config.run_marker.is_empty() {
            return Err(MarkerError::InvalidPattern("run marker is empty".into()));
        }
        let label = config.score_label.trim();
        if label.is_empty() {
            return Err(MarkerError::InvalidPattern("score label is empty".into()));
        }
        // The number must sit on the label's own line.
        let pattern = format!(r"{}[ \t]*(\d+(?:\.\d+)?)", regex::escape(label));
        let score = Regex::new(&pattern).map_err(|e| MarkerError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            run_marker: config.run_marker.clone(),
            banner_template: config.banner.clone(),
            score,
            timeout_marker: config.timeout_marker.clone(),
            parse_error: config.parse_error.clone(),
        })
    }

    fn banner(&self, assignment: &str) -> String {
        self.banner_template.replace("{assignment}", assignment)
    }
}

/// What a trace says about one submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceVerdict {
    /// Raw score in 0..=100.
    pub score: f64,
    /// The timeout marker appeared somewhere in the trace.
    pub timed_out: bool,
    /// The assignment's parse-error marker appeared in the test run.
    pub parse_error: bool,
}

/// Extracts the score for `assignment` from a raw trace.
///
/// Pure: shared by the bulk scoring run and the single-job retry tool.
pub fn extract_score(
    trace: &str,
    assignment: &str,
    rules: &TraceRules,
) -> Result<TraceVerdict, MarkerError> {
    let trace = strip_control(trace);
    let timed_out = !rules.timeout_marker.is_empty() && trace.contains(&rules.timeout_marker);

    let run = match trace.rfind(&rules.run_marker) {
        Some(at) => &trace[at + rules.run_marker.len()..],
        None => return Err(MarkerError::NoTestRun),
    };

    if !run.contains(&rules.banner(assignment)) {
        return Err(MarkerError::WrongAssignment(assignment.to_string()));
    }

    let raw = rules
        .score
        .captures_iter(run)
        .last()
        .and_then(|c| c.get(1))
        .ok_or(MarkerError::NoScoreFound)?
        .as_str();
    let score: f64 = raw.parse().map_err(|_| MarkerError::NoScoreFound)?;
    if !(0.0..=100.0).contains(&score) {
        return Err(MarkerError::ScoreOutOfRange(score));
    }

    let parse_error = rules
        .parse_error
        .as_ref()
        .is_some_and(|rule| rule.assignment == assignment && run.contains(&rule.marker));

    Ok(TraceVerdict {
        score,
        timed_out,
        parse_error,
    })
}
