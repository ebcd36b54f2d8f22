use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{LogSettings, init_logging};
use gitlab_client::GitLabClient;
use grader::Workers;
use grader::commands::{hash, reports, resolve, retry, score};
use tracing::info;
use util::course::parse_instant;
use util::{AppConfig, CourseConfig, paths};

#[derive(Parser, Debug)]
#[command(version, about = "Grade CI-tested assignments hosted on GitLab")]
struct Cli {
    /// Read environment variables from this file instead of `.env`
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score an assignment for every class (or one teacher's classes)
    Score {
        /// Assignment, which is also the branch name, e.g. `lab2`
        assignment: String,
        teacher: Option<String>,
        /// Only re-grade rows that failed in the previous result file
        #[arg(long)]
        resume: bool,
        /// Concurrent units; defaults to SCORE_WORKERS
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Look up user and project ids for `students/*.csv`
    Resolve,
    /// Download students' PDF reports
    Reports {
        assignment: String,
        teacher: Option<String>,
    },
    /// Retry full-mark jobs created before START_TIME (`YYYY-MM-DD HH:MM:SS`, course time zone)
    Retry {
        assignment: String,
        start_time: String,
        teacher: Option<String>,
    },
    /// Print SHA-256 digests of local files for integrity allow-lists
    Hash {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Hash { files } = &cli.command {
        return hash::run(files);
    }

    let config = AppConfig::load(cli.env.as_deref()).context("failed to load configuration")?;
    let _log_guard = init_logging(&LogSettings {
        level: config.log_level.clone(),
        dir: config.log_dir.clone(),
        file_name: config.log_file.clone(),
        to_stdout: config.log_to_stdout,
    });

    let course = CourseConfig::load(&config.course_config)
        .with_context(|| format!("failed to load {}", config.course_config.display()))?;
    let client = Arc::new(
        GitLabClient::new(
            &config.gitlab_url,
            &config.gitlab_token,
            Duration::from_secs(config.http_timeout_secs),
            config.max_trace_bytes,
        )
        .context("failed to build GitLab client")?,
    );
    let data_root = paths::absolute_root(&config.data_root);
    let workers = Workers::Bounded(config.score_workers);

    info!(command = ?cli.command, data_root = %data_root.display(), "Starting");

    match cli.command {
        Command::Score {
            assignment,
            teacher,
            resume,
            workers: requested,
        } => {
            let opts = score::ScoreOptions {
                assignment,
                teacher,
                resume,
                workers: requested.map_or(workers, Workers::Bounded),
            };
            score::run(client, &data_root, &course, &opts).await?;
        }
        Command::Resolve => resolve::run(client, &data_root, &course).await?,
        Command::Reports { assignment, teacher } => {
            reports::run(client, &data_root, &course, &assignment, teacher.as_deref(), workers).await?
        }
        Command::Retry {
            assignment,
            start_time,
            teacher,
        } => {
            let start = parse_instant(&start_time, course.deadline_utc_offset_hours)
                .with_context(|| format!("invalid start time {start_time:?}"))?;
            retry::run(
                client,
                &data_root,
                &course,
                &assignment,
                start,
                teacher.as_deref(),
                workers,
            )
            .await?
        }
        Command::Hash { .. } => {}
    }

    Ok(())
}
