//! Roster and result files.
//!
//! Class files are plain comma-separated records, one student per line, named
//! `<teacher>-<group>.csv`:
//!
//! - students: `username,display_name`
//! - roster:   `username,display_name,user_id,project_id`
//! - results:  `username,display_name,user_id,project_id,score`
//!
//! Identity fields hold the literal `Failed` when they could not be resolved.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Sentinel written for anything unresolved or failed.
pub const FAILED: &str = "Failed";

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    FieldCount {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{path}:{line}: invalid identity {value:?}")]
    Identity {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("class file name {0:?} is not of the form <teacher>-<group>.csv")]
    ClassName(String),
}

/// A numeric id on the hosting service, or the `Failed` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    Resolved(u64),
    Unresolved,
}

impl Identity {
    pub fn id(self) -> Option<u64> {
        match self {
            Identity::Resolved(id) => Some(id),
            Identity::Unresolved => None,
        }
    }
}

/// Serialised as the bare id or the `Failed` placeholder, as in roster files.
impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Identity::Resolved(id) => serializer.serialize_u64(*id),
            Identity::Unresolved => serializer.serialize_str(FAILED),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Resolved(id) => write!(f, "{id}"),
            Identity::Unresolved => f.write_str(FAILED),
        }
    }
}

impl FromStr for Identity {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == FAILED {
            Ok(Identity::Unresolved)
        } else {
            s.parse().map(Identity::Resolved)
        }
    }
}

/// A student before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub username: String,
    pub display_name: String,
}

/// One roster line; immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub username: String,
    pub display_name: String,
    pub user_id: Identity,
    pub project_id: Identity,
}

impl RosterEntry {
    /// The roster line without a trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.username, self.display_name, self.user_id, self.project_id
        )
    }
}

/// A line of a previous result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub entry: RosterEntry,
    /// Score column exactly as written, e.g. `87.5`, `87.5*90%` or `Failed`.
    pub score: String,
}

impl ResultRow {
    pub fn is_failed(&self) -> bool {
        self.score == FAILED
    }
}

/// A class file discovered under a roster directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub teacher: String,
    pub group: String,
    pub path: PathBuf,
}

impl ClassFile {
    pub fn from_path(path: &Path) -> Result<Self, RosterError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        match stem.split_once('-') {
            Some((teacher, group)) if !teacher.is_empty() && !group.is_empty() => Ok(Self {
                teacher: teacher.to_string(),
                group: group.to_string(),
                path: path.to_path_buf(),
            }),
            _ => Err(RosterError::ClassName(stem)),
        }
    }

    /// `<teacher>-<group>.csv`
    pub fn file_name(&self) -> String {
        format!("{}-{}.csv", self.teacher, self.group)
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.teacher, self.group)
    }
}

/// Lists `*.csv` class files in `dir`, sorted by file name, optionally keeping one teacher.
///
/// Files whose names cannot be split into teacher and group are logged and skipped.
pub fn list_class_files(dir: &Path, teacher: Option<&str>) -> Result<Vec<ClassFile>, RosterError> {
    let entries = fs::read_dir(dir).map_err(|source| RosterError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    paths.sort();

    let mut classes = Vec::with_capacity(paths.len());
    for path in paths {
        match ClassFile::from_path(&path) {
            Ok(class) if teacher.is_none_or(|t| t == class.teacher) => classes.push(class),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "skipping class file"),
        }
    }
    Ok(classes)
}

pub fn read_students(path: &Path) -> Result<Vec<Student>, RosterError> {
    read_records(path, 2)?
        .into_iter()
        .map(|(_, mut f)| {
            let display_name = f.pop().unwrap_or_default();
            let username = f.pop().unwrap_or_default();
            Ok(Student { username, display_name })
        })
        .collect()
}

/// Reads a roster. A malformed line never drops the class: identity fields that cannot
/// be read become [`Identity::Unresolved`] and only that line is logged.
pub fn read_roster(path: &Path) -> Result<Vec<RosterEntry>, RosterError> {
    Ok(read_lines(path)?
        .into_iter()
        .map(|(line, fields)| lenient_entry(path, line, &fields))
        .collect())
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRow>, RosterError> {
    read_records(path, 5)?
        .into_iter()
        .map(|(line, fields)| {
            Ok(ResultRow {
                entry: entry_from_fields(path, line, &fields[..4])?,
                score: fields[4].clone(),
            })
        })
        .collect()
}

/// Writes lines joined by `\n`, replacing any existing file.
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<(), RosterError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let body = lines
        .into_iter()
        .map(|l| l.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    let io_err = |source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, body).map_err(io_err)
}

fn entry_from_fields(path: &Path, line: usize, fields: &[String]) -> Result<RosterEntry, RosterError> {
    let identity = |value: &str| {
        value.parse::<Identity>().map_err(|_| RosterError::Identity {
            path: path.to_path_buf(),
            line,
            value: value.to_string(),
        })
    };
    Ok(RosterEntry {
        username: fields[0].clone(),
        display_name: fields[1].clone(),
        user_id: identity(&fields[2])?,
        project_id: identity(&fields[3])?,
    })
}

fn lenient_entry(path: &Path, line: usize, fields: &[String]) -> RosterEntry {
    let well_formed = fields.len() == 4;
    if !well_formed {
        tracing::warn!(
            path = %path.display(),
            line,
            found = fields.len(),
            "roster line should have 4 fields, identities left unresolved"
        );
    }
    let text = |i: usize| fields.get(i).cloned().unwrap_or_default();
    let identity = |i: usize| {
        if !well_formed {
            return Identity::Unresolved;
        }
        fields[i].parse::<Identity>().unwrap_or_else(|_| {
            tracing::warn!(
                path = %path.display(),
                line,
                value = %fields[i],
                "invalid identity, treating as unresolved"
            );
            Identity::Unresolved
        })
    };
    RosterEntry {
        username: text(0),
        display_name: text(1),
        user_id: identity(2),
        project_id: identity(3),
    }
}

/// Reads non-blank lines as `(line_number, fields)`.
fn read_lines(path: &Path) -> Result<Vec<(usize, Vec<String>)>, RosterError> {
    let content = fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .enumerate()
        .map(|(idx, raw)| (idx + 1, raw.trim()))
        .filter(|(_, raw)| !raw.is_empty())
        .map(|(line, raw)| (line, raw.split(',').map(|f| f.trim().to_string()).collect()))
        .collect())
}

/// Like [`read_lines`], but every line must have exactly `expected` fields.
fn read_records(path: &Path, expected: usize) -> Result<Vec<(usize, Vec<String>)>, RosterError> {
    let records = read_lines(path)?;
    if let Some((line, fields)) = records.iter().find(|(_, f)| f.len() != expected) {
        return Err(RosterError::FieldCount {
            path: path.to_path_buf(),
            line: *line,
            expected,
            found: fields.len(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn identity_round_trips_through_text() {
        assert_eq!("42".parse::<Identity>().unwrap(), Identity::Resolved(42));
        assert_eq!("Failed".parse::<Identity>().unwrap(), Identity::Unresolved);
        assert!("unknown".parse::<Identity>().is_err());
        assert_eq!(Identity::Unresolved.to_string(), "Failed");
        assert_eq!(serde_json::to_string(&Identity::Resolved(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&Identity::Unresolved).unwrap(), "\"Failed\"");
    }

    #[test]
    fn roster_lines_parse_and_tolerate_crlf() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "wang-1.csv",
            "3210001,Alice,11,901\r\n3210002,Bob,Failed,Failed\r\n\r\n",
        );
        let roster = read_roster(&path).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].project_id, Identity::Resolved(901));
        assert_eq!(roster[1].user_id, Identity::Unresolved);
        assert_eq!(roster[1].to_line(), "3210002,Bob,Failed,Failed");
    }

    #[test]
    fn bad_roster_lines_keep_their_row_as_unresolved() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "wang-1.csv", "a,A,1,1\nb,B,None,2\nc,C,3\nd,D,4,4\n");
        let roster = read_roster(&path).unwrap();
        let names: Vec<_> = roster.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
        assert_eq!(roster[1].user_id, Identity::Unresolved);
        assert_eq!(roster[1].project_id, Identity::Resolved(2));
        assert_eq!(roster[2].project_id, Identity::Unresolved);
        assert_eq!(roster[2].to_line(), "c,C,Failed,Failed");
        assert_eq!(roster[3].project_id, Identity::Resolved(4));
    }

    #[test]
    fn wrong_field_count_in_results_names_the_line() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "wang-1.csv", "a,A,1,2,100.0\nb,B,3\n");
        match read_results(&path).unwrap_err() {
            RosterError::FieldCount { line, found, .. } => {
                assert_eq!(line, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn result_rows_keep_score_text() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "wang-1.csv", "a,A,1,2,87.5*90%\nb,B,3,4,Failed");
        let rows = read_results(&path).unwrap();
        assert_eq!(rows[0].score, "87.5*90%");
        assert!(!rows[0].is_failed());
        assert!(rows[1].is_failed());
    }

    #[test]
    fn class_files_are_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        write(dir.path(), "zhao-2.csv", "");
        write(dir.path(), "li-1.csv", "");
        write(dir.path(), "zhao-1.csv", "");
        write(dir.path(), "notes.txt", "");
        write(dir.path(), "broken.csv", "");

        let all = list_class_files(dir.path(), None).unwrap();
        let names: Vec<_> = all.iter().map(ClassFile::file_name).collect();
        assert_eq!(names, ["li-1.csv", "zhao-1.csv", "zhao-2.csv"]);

        let zhao = list_class_files(dir.path(), Some("zhao")).unwrap();
        assert_eq!(zhao.len(), 2);
        assert!(zhao.iter().all(|c| c.teacher == "zhao"));
    }

    #[test]
    fn write_lines_overwrites_without_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("score").join("lab1").join("wang-1.csv");
        write_lines(&path, ["first", "second"]).unwrap();
        write_lines(&path, ["only"]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "only");
    }
}
