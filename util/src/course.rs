//! Course policy: deadlines, integrity allow-lists, trace markers and toolchain flags.
//!
//! Loaded once per run from a JSON file. Every section has defaults matching the
//! current course harness so a minimal file only needs `deadlines` and `integrity`.
//!
//! ```json
//! {
//!   "deadlines": { "lab1": "2025-10-01 23:59:59" },
//!   "integrity": {
//!     "selector": ".gitlab-ci.yml",
//!     "tracks": [
//!       { "name": "cpp",   "files": { ".gitlab-ci.yml": ["9f2c..."], "tests/test.py": ["41ab..."] } },
//!       { "name": "ocaml", "files": { ".gitlab-ci.yml": ["77d0..."] } }
//!     ]
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CourseConfig {
    /// Assignment (branch) name to deadline.
    #[serde(default)]
    pub deadlines: BTreeMap<String, String>,

    /// Offset applied to deadlines written without one.
    #[serde(default = "default_deadline_offset")]
    pub deadline_utc_offset_hours: i32,

    #[serde(default)]
    pub integrity: IntegrityConfig,

    #[serde(default)]
    pub trace: TraceConfig,

    /// Assignment name to the boolean key read from the student's toolchain file.
    #[serde(default = "default_toolchain_flags")]
    pub toolchain_flags: BTreeMap<String, String>,

    #[serde(default = "default_toolchain_file")]
    pub toolchain_file: String,

    #[serde(default)]
    pub repo: RepoConfig,

    /// Report location inside student repositories; `{assignment}` is substituted.
    #[serde(default = "default_report_path")]
    pub report_path: String,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntegrityConfig {
    /// File whose hash decides which track a submission belongs to.
    #[serde(default = "default_selector")]
    pub selector: String,

    /// Ordered; the first track is the fallback when the selector matches none.
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            selector: default_selector(),
            tracks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackConfig {
    pub name: String,
    /// Relative path to the set of permitted SHA-256 digests.
    #[serde(default)]
    pub files: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraceConfig {
    /// Separates harness setup from the test run; the last occurrence counts.
    #[serde(default = "default_run_marker")]
    pub run_marker: String,

    /// Banner printed by the harness; `{assignment}` is substituted.
    #[serde(default = "default_banner")]
    pub banner: String,

    #[serde(default = "default_score_label")]
    pub score_label: String,

    #[serde(default = "default_timeout_marker")]
    pub timeout_marker: String,

    #[serde(default = "default_parse_error")]
    pub parse_error: Option<ParseErrorRule>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            run_marker: default_run_marker(),
            banner: default_banner(),
            score_label: default_score_label(),
            timeout_marker: default_timeout_marker(),
            parse_error: default_parse_error(),
        }
    }
}

/// Counts traces of one assignment that contain a known parser failure message.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParseErrorRule {
    pub assignment: String,
    pub marker: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepoConfig {
    /// Namespace holding per-teacher subgroups, e.g. `compiler/sp25`.
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_repo_prefix")]
    pub prefix: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            group: String::new(),
            prefix: default_repo_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            deadlines: BTreeMap::new(),
            deadline_utc_offset_hours: default_deadline_offset(),
            integrity: IntegrityConfig::default(),
            trace: TraceConfig::default(),
            toolchain_flags: default_toolchain_flags(),
            toolchain_file: default_toolchain_file(),
            repo: RepoConfig::default(),
            report_path: default_report_path(),
            retry: RetryConfig::default(),
        }
    }
}

impl CourseConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Deadline for `assignment`, or `None` when the course sets none.
    pub fn deadline_for(&self, assignment: &str) -> Result<Option<DateTime<FixedOffset>>, ConfigError> {
        self.deadlines
            .get(assignment)
            .map(|raw| parse_instant(raw, self.deadline_utc_offset_hours))
            .transpose()
    }

    /// Key to read from the toolchain file for `assignment`, if any.
    pub fn toolchain_flag(&self, assignment: &str) -> Option<&str> {
        self.toolchain_flags.get(assignment).map(String::as_str)
    }

    pub fn report_path_for(&self, assignment: &str) -> String {
        self.report_path.replace("{assignment}", assignment)
    }

    /// Repository path for a student under a teacher subgroup.
    pub fn project_path(&self, teacher: &str, username: &str) -> String {
        let name = format!("{}{}", self.repo.prefix, username);
        if self.repo.group.is_empty() {
            format!("{teacher}/{name}")
        } else {
            format!("{}/{teacher}/{name}", self.repo.group.trim_end_matches('/'))
        }
    }
}

/// Parses an instant written either with an explicit offset (RFC 3339 or
/// `YYYY-MM-DD HH:MM:SS +HHMM`) or as wall-clock time at `offset_hours`.
pub fn parse_instant(raw: &str, offset_hours: i32) -> Result<DateTime<FixedOffset>, ConfigError> {
    let raw = raw.trim();
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "deadline".into(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt);
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| invalid(&e.to_string()))?;
    let offset = FixedOffset::east_opt(offset_hours * 3600)
        .ok_or_else(|| invalid("UTC offset out of range"))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| invalid("ambiguous local time"))
}

fn default_deadline_offset() -> i32 {
    8
}

fn default_selector() -> String {
    ".gitlab-ci.yml".into()
}

fn default_run_marker() -> String {
    "$ python3 sp25-tests/test.py $CI_COMMIT_REF_NAME .".into()
}

fn default_banner() -> String {
    "Running {assignment} test...".into()
}

fn default_score_label() -> String {
    "Test score:".into()
}

fn default_timeout_marker() -> String {
    "Timeout".into()
}

fn default_parse_error() -> Option<ParseErrorRule> {
    Some(ParseErrorRule {
        assignment: "lab0".into(),
        marker: "Parse Error".into(),
    })
}

fn default_toolchain_flags() -> BTreeMap<String, String> {
    [
        ("lab3", "use_accipit"),
        ("lab4", "use_qemu"),
        ("bonus1", "use_qemu"),
        ("bonus2", "use_qemu"),
    ]
    .into_iter()
    .map(|(a, k)| (a.to_string(), k.to_string()))
    .collect()
}

fn default_toolchain_file() -> String {
    "config.toml".into()
}

fn default_repo_prefix() -> String {
    "cp-".into()
}

fn default_report_path() -> String {
    "reports/{assignment}.pdf".into()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_wait() -> u64 {
    1800
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn minimal_file_gets_harness_defaults() {
        let cfg: CourseConfig = serde_json::from_str(r#"{ "deadlines": {} }"#).unwrap();
        assert_eq!(cfg.integrity.selector, ".gitlab-ci.yml");
        assert_eq!(cfg.trace.score_label, "Test score:");
        assert_eq!(cfg.toolchain_flag("lab4"), Some("use_qemu"));
        assert_eq!(cfg.toolchain_flag("lab1"), None);
        assert_eq!(cfg.retry.poll_interval_secs, 5);
        assert_eq!(cfg.trace.parse_error.as_ref().unwrap().assignment, "lab0");
    }

    #[test]
    fn parse_error_rule_can_be_disabled() {
        let cfg: CourseConfig = serde_json::from_str(r#"{ "trace": { "parse_error": null } }"#).unwrap();
        assert!(cfg.trace.parse_error.is_none());
        assert_eq!(cfg.trace.timeout_marker, "Timeout");
    }

    #[test]
    fn tracks_keep_declaration_order() {
        let cfg: CourseConfig = serde_json::from_str(
            r#"{
                "integrity": {
                    "tracks": [
                        { "name": "cpp", "files": { ".gitlab-ci.yml": ["aa"] } },
                        { "name": "ocaml", "files": { ".gitlab-ci.yml": ["bb"], "test.py": ["cc", "dd"] } }
                    ]
                }
            }"#,
        )
        .unwrap();
        let names: Vec<_> = cfg.integrity.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["cpp", "ocaml"]);
        assert_eq!(cfg.integrity.tracks[1].files["test.py"].len(), 2);
    }

    #[test]
    fn wall_clock_deadline_uses_course_offset() {
        let dt = parse_instant("2025-10-01 23:59:59", 8).unwrap();
        assert_eq!(
            dt.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2025, 10, 1, 15, 59, 59).unwrap()
        );
    }

    #[test]
    fn explicit_offsets_are_respected() {
        let a = parse_instant("2025-10-01 23:59:59 +0800", 0).unwrap();
        let b = parse_instant("2025-10-01T15:59:59Z", 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn garbage_deadline_is_invalid() {
        assert!(matches!(
            parse_instant("next friday", 8),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn deadline_lookup_is_optional() {
        let mut cfg = CourseConfig::default();
        cfg.deadlines.insert("lab1".into(), "2025-10-01 23:59:59".into());
        assert!(cfg.deadline_for("lab1").unwrap().is_some());
        assert!(cfg.deadline_for("lab2").unwrap().is_none());
    }

    #[test]
    fn project_path_joins_group_teacher_and_prefix() {
        let mut cfg = CourseConfig::default();
        cfg.repo.group = "compiler/sp25/".into();
        assert_eq!(cfg.project_path("wang", "3210001"), "compiler/sp25/wang/cp-3210001");
        assert_eq!(cfg.report_path_for("lab2"), "reports/lab2.pdf");
    }
}
