//! Turns `students/*.csv` into rosters by looking up user and project ids.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gitlab_client::Directory;
use tracing::{debug, warn};
use util::roster::{Student, list_class_files, read_students, write_lines};
use util::{CourseConfig, Identity, RosterEntry, paths};

use crate::scheduler::{Workers, fan_out};
use crate::summary::percent;

pub async fn run(directory: Arc<dyn Directory>, data_root: &Path, course: &CourseConfig) -> Result<()> {
    let students_dir = paths::students_dir(data_root);
    let classes = list_class_files(&students_dir, None)
        .with_context(|| format!("cannot list classes in {}", students_dir.display()))?;
    let roster_dir = paths::roster_dir(data_root);

    for class in classes {
        println!("{} {}", class.teacher, class.group);

        let students = match read_students(&class.path) {
            Ok(s) => s,
            Err(e) => {
                warn!(class = %class.label(), error = %e, "Skipping unreadable student list");
                println!("Skipped: {e}");
                continue;
            }
        };

        let entries = fan_out(
            &students,
            Workers::Unbounded,
            |student| {
                let directory = Arc::clone(&directory);
                let project_path = course.project_path(&class.teacher, &student.username);
                async move { resolve_student(directory.as_ref(), student, &project_path).await }
            },
            unresolved,
        )
        .await;

        let path = roster_dir.join(class.file_name());
        write_lines(&path, entries.iter().map(RosterEntry::to_line))
            .with_context(|| format!("cannot write {}", path.display()))?;

        let failed = entries
            .iter()
            .filter(|e| e.user_id == Identity::Unresolved || e.project_id == Identity::Unresolved)
            .count();
        println!("Saved to {}", path.display());
        println!(
            "Total: {}, Failed: {} ({})",
            entries.len(),
            failed,
            percent(failed, entries.len())
        );
    }
    Ok(())
}

/// Looks up both ids; each one that cannot be found is recorded as unresolved.
pub async fn resolve_student(directory: &dyn Directory, student: Student, project_path: &str) -> RosterEntry {
    let user_id = match directory.find_user(&student.username).await {
        Ok(user) => Identity::Resolved(user.id),
        Err(e) => {
            warn!(username = %student.username, error = %e, "Failed to find user");
            Identity::Unresolved
        }
    };
    let project_id = match directory.find_project(project_path).await {
        Ok(project) => Identity::Resolved(project.id),
        Err(e) => {
            warn!(username = %student.username, project_path, error = %e, "Failed to find project");
            Identity::Unresolved
        }
    };
    debug!(username = %student.username, %user_id, %project_id, "Resolved");

    RosterEntry {
        username: student.username,
        display_name: student.display_name,
        user_id,
        project_id,
    }
}

fn unresolved(student: &Student) -> RosterEntry {
    RosterEntry {
        username: student.username.clone(),
        display_name: student.display_name.clone(),
        user_id: Identity::Unresolved,
        project_id: Identity::Unresolved,
    }
}
