//! Unit Processor
//!
//! Grades one roster entry for one assignment:
//!
//! 1. no project → `Skipped("unprovisioned")`
//! 2. latest commit → latest pipeline (pending → `Failed("pipeline-pending")`)
//! 3. integrity audit (logged, never fatal)
//! 4. first job's trace → score
//! 5. late penalty against the pipeline's creation time
//!
//! Every error is converted into a `Failed(reason)` result here; panics are handled by
//! the scheduler, which owns the task boundary.

use chrono::{DateTime, FixedOffset};
use gitlab_client::BuildFacade;
use marker::integrity::{self, IntegrityReport};
use marker::{AnnotatedScore, ScoreRecord, TraceRules, extract_score, penalty, toolchain};
use tracing::{debug, info, warn};
use util::course::IntegrityConfig;
use util::{CourseConfig, RosterEntry};

use crate::error::{SetupError, UnitError};

/// Everything needed to grade one assignment, prepared once per run.
#[derive(Debug, Clone)]
pub struct Grading {
    pub assignment: String,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub rules: TraceRules,
    pub integrity: IntegrityConfig,
    /// `(file, key)` read for the alternate-toolchain counter.
    pub toolchain: Option<(String, String)>,
}

impl Grading {
    pub fn from_course(course: &CourseConfig, assignment: &str) -> Result<Self, SetupError> {
        let deadline = course.deadline_for(assignment)?;
        if deadline.is_none() {
            warn!(assignment, "No deadline configured, late penalties are disabled");
        }
        Ok(Self {
            assignment: assignment.to_string(),
            deadline,
            rules: TraceRules::new(&course.trace)?,
            integrity: course.integrity.clone(),
            toolchain: course
                .toolchain_flag(assignment)
                .map(|key| (course.toolchain_file.clone(), key.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Scored,
    /// Carried over from a previous result file.
    Cached,
    Skipped(String),
    Failed(String),
}

/// Side observations that never affect the score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitAudit {
    pub integrity: Option<IntegrityReport>,
    pub alternate_toolchain: bool,
    pub timed_out: bool,
    pub parse_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitResult {
    pub entry: RosterEntry,
    pub status: UnitStatus,
    pub record: ScoreRecord,
    pub audit: UnitAudit,
}

impl UnitResult {
    pub fn scored(entry: RosterEntry, score: AnnotatedScore, audit: UnitAudit) -> Self {
        Self {
            record: ScoreRecord::scored(entry.username.clone(), score),
            entry,
            status: UnitStatus::Scored,
            audit,
        }
    }

    /// A row reused from a previous run with its label unchanged.
    pub fn cached(entry: RosterEntry, label: &str) -> Self {
        let mut record = ScoreRecord::from_label(entry.username.clone(), label);
        if !record.is_failed() {
            record.final_label = label.trim().to_string();
        }
        Self {
            record,
            entry,
            status: UnitStatus::Cached,
            audit: UnitAudit::default(),
        }
    }

    pub fn skipped(entry: RosterEntry, error: &UnitError) -> Self {
        Self {
            record: ScoreRecord::failed(entry.username.clone()),
            entry,
            status: UnitStatus::Skipped(error.reason().to_string()),
            audit: UnitAudit::default(),
        }
    }

    pub fn failed(entry: RosterEntry, error: &UnitError, audit: UnitAudit) -> Self {
        Self {
            record: ScoreRecord::failed(entry.username.clone()),
            entry,
            status: UnitStatus::Failed(error.reason().to_string()),
            audit,
        }
    }

    /// Label written to the result file.
    pub fn label(&self) -> &str {
        &self.record.final_label
    }
}

/// Grades `entry`. Never fails; problems become `Skipped`/`Failed` results.
pub async fn process(facade: &dyn BuildFacade, grading: &Grading, entry: RosterEntry) -> UnitResult {
    let Some(project) = entry.project_id.id() else {
        debug!(username = %entry.username, "Skipping student without project");
        return UnitResult::skipped(entry, &UnitError::Unresolved);
    };

    let mut audit = UnitAudit::default();
    match grade(facade, grading, project, &entry.username, &mut audit).await {
        Ok(score) => {
            debug!(username = %entry.username, assignment = %grading.assignment, score = %score, "Scored");
            UnitResult::scored(entry, score, audit)
        }
        Err(e) => {
            warn!(
                username = %entry.username,
                assignment = %grading.assignment,
                reason = e.reason(),
                error = %e,
                "Unit failed"
            );
            UnitResult::failed(entry, &e, audit)
        }
    }
}

async fn grade(
    facade: &dyn BuildFacade,
    grading: &Grading,
    project: u64,
    username: &str,
    audit: &mut UnitAudit,
) -> Result<AnnotatedScore, UnitError> {
    let branch = grading.assignment.as_str();
    let commit = facade.latest_commit(project, branch).await?;
    let pipeline = facade.latest_pipeline(project, &commit, branch).await?;

    let report = integrity::verify(facade, project, &commit, &grading.integrity).await;
    for v in &report.violations {
        warn!(
            username,
            assignment = branch,
            path = %v.path,
            kind = ?v.kind,
            observed = v.observed.as_deref().unwrap_or("-"),
            detail = v.detail.as_deref().unwrap_or("-"),
            "Integrity violation"
        );
    }
    audit.integrity = Some(report);

    if let Some((file, key)) = &grading.toolchain {
        audit.alternate_toolchain = read_toolchain_flag(facade, project, &commit, file, key, username).await;
    }

    let jobs = facade.jobs(project, pipeline.id).await?;
    if jobs.len() > 1 {
        info!(
            username,
            pipeline = pipeline.id,
            jobs = jobs.len(),
            "Pipeline has several jobs, grading the first"
        );
    }
    let job = jobs
        .first()
        .ok_or(UnitError::NoJobs { pipeline_id: pipeline.id })?;

    let trace = facade.job_trace(project, job.id).await?;
    let verdict = extract_score(&trace, branch, &grading.rules)?;
    audit.timed_out = verdict.timed_out;
    audit.parse_error = verdict.parse_error;
    if verdict.timed_out {
        warn!(username, job = job.id, job_name = %job.name, "Timeout in job");
    }

    Ok(penalty::annotate(verdict.score, pipeline.created_at, grading.deadline))
}

/// Reads the toolchain flag; any failure counts as the default toolchain.
async fn read_toolchain_flag(
    facade: &dyn BuildFacade,
    project: u64,
    git_ref: &str,
    file: &str,
    key: &str,
    username: &str,
) -> bool {
    let bytes = match facade.file_bytes(project, file, git_ref).await {
        Ok(b) => b,
        Err(e) => {
            debug!(username, file, error = %e, "Toolchain file unavailable");
            return false;
        }
    };
    toolchain::flag_enabled(&bytes, key).unwrap_or_else(|e| {
        warn!(username, file, error = %e, "Failed to check toolchain file");
        false
    })
}
