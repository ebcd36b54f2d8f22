//! Re-runs stale full-mark jobs.
//!
//! A job that scored full marks before the harness was updated (created before
//! `start_time`), or that never finished, is retried and re-scored with the same
//! extractor the bulk run uses. Jobs below full marks are left alone.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use gitlab_client::{BuildFacade, FacadeError, JobControl};
use marker::{TraceRules, extract_score};
use tokio::time::Instant;
use tracing::{info, warn};
use util::course::RetryConfig;
use util::roster::{list_class_files, read_roster};
use util::{CourseConfig, RosterEntry, paths};

use crate::error::UnitError;
use crate::scheduler::{Workers, fan_out};
use crate::summary::percent;

/// A service that can both be read and asked to re-run jobs.
pub trait RetryHost: BuildFacade + JobControl {}

impl<T: BuildFacade + JobControl + ?Sized> RetryHost for T {}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Unresolved,
    /// Below full marks; retrying cannot help.
    BelowFull(f64),
    /// The job ran after `start_time` and finished.
    UpToDate,
    Retried { job: u64, before: f64, after: f64 },
    /// The retried job did not finish within the wait limit.
    StillRunning { job: u64 },
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Polling {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl From<&RetryConfig> for Polling {
    fn from(c: &RetryConfig) -> Self {
        Self {
            interval: Duration::from_secs(c.poll_interval_secs),
            max_wait: Duration::from_secs(c.max_wait_secs),
        }
    }
}

pub async fn run(
    host: Arc<dyn RetryHost>,
    data_root: &Path,
    course: &CourseConfig,
    assignment: &str,
    start_time: DateTime<FixedOffset>,
    teacher: Option<&str>,
    workers: Workers,
) -> Result<()> {
    let rules = Arc::new(TraceRules::new(&course.trace).context("invalid trace configuration")?);
    let polling = Polling::from(&course.retry);
    let roster_dir = paths::roster_dir(data_root);
    let classes = list_class_files(&roster_dir, teacher)
        .with_context(|| format!("cannot list classes in {}", roster_dir.display()))?;

    for class in classes {
        println!("{} {}", class.teacher, class.group);
        let roster = match read_roster(&class.path) {
            Ok(r) => r,
            Err(e) => {
                warn!(class = %class.label(), error = %e, "Skipping unreadable roster");
                println!("Skipped: {e}");
                continue;
            }
        };

        let outcomes = fan_out(
            &roster,
            workers,
            |entry| {
                let host = Arc::clone(&host);
                let rules = Arc::clone(&rules);
                let branch = assignment.to_string();
                async move { retry_unit(host.as_ref(), &rules, &branch, start_time, polling, &entry).await }
            },
            |_| RetryOutcome::Failed("panicked".into()),
        )
        .await;

        let retried = outcomes
            .iter()
            .filter(|o| matches!(o, RetryOutcome::Retried { .. }))
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, RetryOutcome::Failed(_) | RetryOutcome::StillRunning { .. }))
            .count();
        println!(
            "Total: {}, Retried: {}, Failed: {} ({})",
            outcomes.len(),
            retried,
            failed,
            percent(failed, outcomes.len())
        );
    }
    Ok(())
}

/// Retries one student's job if it is stale. Never fails; errors become `Failed`.
pub async fn retry_unit(
    host: &dyn RetryHost,
    rules: &TraceRules,
    branch: &str,
    start_time: DateTime<FixedOffset>,
    polling: Polling,
    entry: &RosterEntry,
) -> RetryOutcome {
    let Some(project) = entry.project_id.id() else {
        return RetryOutcome::Unresolved;
    };
    match retry_job(host, rules, branch, start_time, polling, project, &entry.username).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(username = %entry.username, reason = e.reason(), error = %e, "Failed to process");
            RetryOutcome::Failed(e.reason().to_string())
        }
    }
}

async fn retry_job(
    host: &dyn RetryHost,
    rules: &TraceRules,
    branch: &str,
    start_time: DateTime<FixedOffset>,
    polling: Polling,
    project: u64,
    username: &str,
) -> Result<RetryOutcome, UnitError> {
    let commit = host.latest_commit(project, branch).await?;
    // Pending pipelines are retried too.
    let pipeline = host
        .pipelines(project, &commit, branch)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| FacadeError::NotFound(format!("pipeline for commit {commit}")))?;
    let job = host
        .jobs(project, pipeline.id)
        .await?
        .into_iter()
        .next()
        .ok_or(UnitError::NoJobs { pipeline_id: pipeline.id })?;

    let before = extract_score(&host.job_trace(project, job.id).await?, branch, rules)?.score;
    if before < 100.0 {
        info!(username, score = before, "Score is not 100, skip retry");
        return Ok(RetryOutcome::BelowFull(before));
    }
    if job.created_at >= start_time && job.status.is_graded() {
        return Ok(RetryOutcome::UpToDate);
    }

    let retried = host.retry_job(project, job.id).await?;
    info!(username, old_job = job.id, job = retried.id, "Retried job");

    let deadline = Instant::now() + polling.max_wait;
    loop {
        let current = host.job(project, retried.id).await?;
        if current.status.is_graded() {
            break;
        }
        if Instant::now() >= deadline {
            warn!(username, job = retried.id, "Retried job still running, giving up");
            return Ok(RetryOutcome::StillRunning { job: retried.id });
        }
        tokio::time::sleep(polling.interval).await;
    }

    let after = extract_score(&host.job_trace(project, retried.id).await?, branch, rules)?.score;
    info!(username, before, after, "Score changed");
    Ok(RetryOutcome::Retried {
        job: retried.id,
        before,
        after,
    })
}
