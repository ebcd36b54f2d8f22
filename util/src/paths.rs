//! On-disk layout under the data root.

use std::path::{Path, PathBuf};

/// Resolve a possibly relative root against the current directory.
pub fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(root)
    }
}

/// {DATA_ROOT}/students
pub fn students_dir(root: &Path) -> PathBuf {
    root.join("students")
}

/// {DATA_ROOT}/repo
pub fn roster_dir(root: &Path) -> PathBuf {
    root.join("repo")
}

/// {DATA_ROOT}/score/{assignment}
pub fn score_dir(root: &Path, assignment: &str) -> PathBuf {
    root.join("score").join(assignment)
}

/// {DATA_ROOT}/score/{assignment}/summary.json
pub fn summary_path(root: &Path, assignment: &str) -> PathBuf {
    score_dir(root, assignment).join("summary.json")
}

/// {DATA_ROOT}/reports/{assignment}/{teacher}
pub fn reports_dir(root: &Path, assignment: &str, teacher: &str) -> PathBuf {
    root.join("reports").join(assignment).join(teacher)
}
