//! Downloads each student's written report from the head of the assignment branch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use gitlab_client::BuildFacade;
use tracing::{info, warn};
use util::roster::{list_class_files, read_roster};
use util::{CourseConfig, RosterEntry, paths};

use crate::scheduler::{Workers, fan_out};
use crate::summary::percent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Saved(PathBuf),
    /// No project to download from.
    Skipped,
    Failed(String),
}

pub async fn run(
    facade: Arc<dyn BuildFacade>,
    data_root: &Path,
    course: &CourseConfig,
    assignment: &str,
    teacher: Option<&str>,
    workers: Workers,
) -> Result<()> {
    let roster_dir = paths::roster_dir(data_root);
    let classes = list_class_files(&roster_dir, teacher)
        .with_context(|| format!("cannot list classes in {}", roster_dir.display()))?;
    let report_path = course.report_path_for(assignment);

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

        let dest = paths::reports_dir(data_root, assignment, &class.teacher);
        let outcomes = fan_out(
            &roster,
            workers,
            |entry| {
                let facade = Arc::clone(&facade);
                let report_path = report_path.clone();
                let branch = assignment.to_string();
                let dest = dest.clone();
                async move { fetch_report(facade.as_ref(), &branch, &report_path, &dest, &entry).await }
            },
            |_| Fetch::Failed("panicked".into()),
        )
        .await;

        let failed = outcomes.iter().filter(|o| !matches!(o, Fetch::Saved(_))).count();
        println!("Saved to {}", dest.display());
        println!(
            "Total: {}, Failed: {} ({})",
            outcomes.len(),
            failed,
            percent(failed, outcomes.len())
        );
    }
    Ok(())
}

/// Saves `<dest>/<username>-<display_name>.pdf`.
pub async fn fetch_report(
    facade: &dyn BuildFacade,
    branch: &str,
    report_path: &str,
    dest: &Path,
    entry: &RosterEntry,
) -> Fetch {
    let Some(project) = entry.project_id.id() else {
        warn!(username = %entry.username, "No project, report skipped");
        return Fetch::Skipped;
    };

    let download = async {
        let commit = facade.latest_commit(project, branch).await?;
        let bytes = facade.file_bytes(project, report_path, &commit).await?;
        tokio::fs::create_dir_all(dest).await?;
        let file = dest.join(format!(
            "{}-{}.pdf",
            entry.username,
            entry.display_name.replace(['/', '\\'], "_")
        ));
        tokio::fs::write(&file, bytes).await?;
        anyhow::Ok(file)
    };

    match download.await {
        Ok(file) => {
            info!(username = %entry.username, file = %file.display(), "Report saved");
            Fetch::Saved(file)
        }
        Err(e) => {
            warn!(username = %entry.username, error = %e, "Failed to get report");
            Fetch::Failed(e.to_string())
        }
    }
}
