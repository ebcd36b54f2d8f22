use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gitlab_client::BuildFacade;
use tracing::{info, warn};
use util::roster::{list_class_files, read_results, read_roster};
use util::{CourseConfig, paths};

use crate::report::{RunSummary, write_class_results};
use crate::scheduler::{Workers, score_class};
use crate::summary::Summary;
use crate::unit::Grading;

#[derive(Debug, Clone)]
pub struct ScoreOptions {
    pub assignment: String,
    pub teacher: Option<String>,
    /// Reuse non-`Failed` rows of the previous result file.
    pub resume: bool,
    pub workers: Workers,
}

/// Scores every class and writes result files plus `summary.json`.
///
/// A class whose roster cannot be read is reported and skipped.
pub async fn run(
    facade: Arc<dyn BuildFacade>,
    data_root: &Path,
    course: &CourseConfig,
    opts: &ScoreOptions,
) -> Result<RunSummary> {
    let assignment = opts.assignment.as_str();
    let grading = Arc::new(
        Grading::from_course(course, assignment)
            .with_context(|| format!("cannot grade {assignment}"))?,
    );

    let roster_dir = paths::roster_dir(data_root);
    let classes = list_class_files(&roster_dir, opts.teacher.as_deref())
        .with_context(|| format!("cannot list classes in {}", roster_dir.display()))?;
    let score_dir = paths::score_dir(data_root, assignment);

    let mut run = RunSummary::new(assignment, course.toolchain_flag(assignment));

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

        let result_path = score_dir.join(class.file_name());
        let seeds = if opts.resume && result_path.is_file() {
            match read_results(&result_path) {
                Ok(rows) => Some(rows),
                Err(e) => {
                    warn!(class = %class.label(), error = %e, "Ignoring unreadable previous results");
                    None
                }
            }
        } else {
            None
        };

        let results = score_class(
            Arc::clone(&facade),
            Arc::clone(&grading),
            &roster,
            seeds.as_deref(),
            opts.workers,
        )
        .await;

        write_class_results(&result_path, &results)
            .with_context(|| format!("cannot write {}", result_path.display()))?;

        let summary = Summary::of(&results);
        info!(class = %class.label(), assignment, total = summary.total, failed = summary.failed, "Class scored");
        println!("Saved to {}", result_path.display());
        println!("{}", summary.headline());
        run.push(format!("{}-{}", class.teacher, class.group), summary);
    }

    let counts_parse_errors = course
        .trace
        .parse_error
        .as_ref()
        .is_some_and(|rule| rule.assignment == assignment);
    for line in run.rollup_lines(counts_parse_errors) {
        println!("{line}");
    }

    let summary_path = paths::summary_path(data_root, assignment);
    run.write(&summary_path)
        .with_context(|| format!("cannot write {}", summary_path.display()))?;

    Ok(run)
}
