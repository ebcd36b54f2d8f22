//! Integrity Verifier
//!
//! Checks that the harness files in a submission are ones the course handed out.
//! A submission picks its track through the hash of one selector file; the remaining
//! files of that track are then compared against their allow-lists.
//!
//! The result is audit-only. Nothing here fails: remote errors become
//! [`ViolationKind::Unreadable`] entries and the caller decides what to log.

use gitlab_client::BuildFacade;
use tracing::debug;
use util::course::{IntegrityConfig, TrackConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The file exists but its hash is not on the allow-list.
    Modified,
    /// The selector file matched no track, so the first track was assumed.
    Unrecognized,
    /// The hash could not be fetched.
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
    pub observed: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// `None` only when the course defines no tracks.
    pub track: Option<String>,
    pub selector_matched: bool,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Verifies the submission at `git_ref` of `project`.
pub async fn verify(
    facade: &dyn BuildFacade,
    project: u64,
    git_ref: &str,
    config: &IntegrityConfig,
) -> IntegrityReport {
    let Some(first) = config.tracks.first() else {
        return IntegrityReport::default();
    };

    let mut violations = Vec::new();
    let selector = &config.selector;

    let observed = match facade.file_hash(project, selector, git_ref).await {
        Ok(hash) => Some(hash),
        Err(e) => {
            violations.push(Violation {
                path: selector.clone(),
                kind: ViolationKind::Unreadable,
                observed: None,
                detail: Some(e.to_string()),
            });
            None
        }
    };

    let matched = observed
        .as_deref()
        .and_then(|hash| select_track(&config.tracks, selector, hash));
    let track = matched.unwrap_or(first);

    if matched.is_none() && observed.is_some() {
        violations.push(Violation {
            path: selector.clone(),
            kind: ViolationKind::Unrecognized,
            observed,
            detail: Some(format!("no track accepts this file, assuming `{}`", track.name)),
        });
    }

    for (path, allowed) in &track.files {
        if path == selector {
            continue;
        }
        match facade.file_hash(project, path, git_ref).await {
            Ok(hash) if allowed.contains(&hash) => {}
            Ok(hash) => violations.push(Violation {
                path: path.clone(),
                kind: ViolationKind::Modified,
                observed: Some(hash),
                detail: None,
            }),
            Err(e) => violations.push(Violation {
                path: path.clone(),
                kind: ViolationKind::Unreadable,
                observed: None,
                detail: Some(e.to_string()),
            }),
        }
    }

    debug!(
        project,
        track = %track.name,
        violations = violations.len(),
        "Integrity check finished"
    );

    IntegrityReport {
        track: Some(track.name.clone()),
        selector_matched: matched.is_some(),
        violations,
    }
}

fn select_track<'a>(tracks: &'a [TrackConfig], selector: &str, hash: &str) -> Option<&'a TrackConfig> {
    tracks
        .iter()
        .find(|t| t.files.get(selector).is_some_and(|allowed| allowed.contains(hash)))
}
