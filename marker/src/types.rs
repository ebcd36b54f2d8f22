//! # Types Module
//!
//! Score values produced by the marker and consumed by the reporter.

use std::fmt;

use util::roster::FAILED;

/// Late-submission penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalty {
    /// Whole days late, any started day counting as a full one. Zero when on time.
    pub late_days: u32,
    /// Share of the raw score that is kept, 0..=100.
    pub percent: u8,
}

impl Penalty {
    pub const NONE: Penalty = Penalty {
        late_days: 0,
        percent: 100,
    };

    pub fn is_applied(&self) -> bool {
        self.percent < 100
    }

    /// Reconstructs a penalty from a percentage alone (e.g. read back from a result file).
    ///
    /// The day count is the smallest one consistent with the percentage.
    pub fn from_percent(percent: u8) -> Self {
        let percent = percent.min(100);
        let deducted = u32::from(100 - percent);
        Penalty {
            late_days: deducted.div_ceil(crate::penalty::DAILY_DEDUCTION),
            percent,
        }
    }
}

/// A raw score together with its penalty, kept apart so that "100 with a 20% penalty"
/// stays distinguishable from "80 on time".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatedScore {
    pub raw: f64,
    pub penalty: Penalty,
}

impl AnnotatedScore {
    pub fn on_time(raw: f64) -> Self {
        Self {
            raw,
            penalty: Penalty::NONE,
        }
    }

    /// Parses a label written by [`fmt::Display`]: `87.5` or `87.5*90%`.
    pub fn parse_label(label: &str) -> Option<Self> {
        let label = label.trim();
        match label.split_once('*') {
            Some((raw, pct)) => {
                let raw = raw.parse().ok()?;
                let pct: u8 = pct.strip_suffix('%')?.parse().ok()?;
                Some(Self {
                    raw,
                    penalty: Penalty::from_percent(pct),
                })
            }
            None => label.parse().ok().map(Self::on_time),
        }
    }
}

impl fmt::Display for AnnotatedScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.penalty.is_applied() {
            write!(f, "{}*{}%", format_score(self.raw), self.penalty.percent)
        } else {
            f.write_str(&format_score(self.raw))
        }
    }
}

/// Always keeps a decimal point (`100.0`, `87.5`) so result files read the same
/// whichever tool wrote them.
pub fn format_score(raw: f64) -> String {
    format!("{raw:?}")
}

/// The outcome of grading one roster entry, as it is written to the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub username: String,
    /// Present only when a score was extracted.
    pub raw_score: Option<f64>,
    pub penalty_percent: u8,
    pub late_days: u32,
    pub final_label: String,
}

impl ScoreRecord {
    pub fn scored(username: impl Into<String>, score: AnnotatedScore) -> Self {
        Self {
            username: username.into(),
            raw_score: Some(score.raw),
            penalty_percent: score.penalty.percent,
            late_days: score.penalty.late_days,
            final_label: score.to_string(),
        }
    }

    pub fn failed(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            raw_score: None,
            penalty_percent: Penalty::NONE.percent,
            late_days: 0,
            final_label: FAILED.to_string(),
        }
    }

    /// Rebuilds a record from a previously written label; unreadable labels count as failed.
    pub fn from_label(username: impl Into<String>, label: &str) -> Self {
        match AnnotatedScore::parse_label(label) {
            Some(score) => Self::scored(username, score),
            None => Self::failed(username),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.raw_score.is_none()
    }

    pub fn is_late(&self) -> bool {
        self.penalty_percent < 100
    }

    /// Full marks with no penalty applied.
    pub fn is_pass(&self) -> bool {
        self.raw_score == Some(100.0) && !self.is_late()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_keep_raw_and_penalty_apart() {
        let late = AnnotatedScore {
            raw: 100.0,
            penalty: Penalty {
                late_days: 2,
                percent: 80,
            },
        };
        let on_time = AnnotatedScore::on_time(80.0);
        assert_eq!(late.to_string(), "100.0*80%");
        assert_eq!(on_time.to_string(), "80.0");
        assert_ne!(late, on_time);
    }

    #[test]
    fn labels_parse_back() {
        let parsed = AnnotatedScore::parse_label("87.5*90%").unwrap();
        assert_eq!(parsed.raw, 87.5);
        assert_eq!(parsed.penalty, Penalty { late_days: 1, percent: 90 });
        assert_eq!(AnnotatedScore::parse_label("100.0").unwrap().penalty, Penalty::NONE);
        assert!(AnnotatedScore::parse_label("Failed").is_none());
        assert!(AnnotatedScore::parse_label("87.5*90").is_none());
    }

    #[test]
    fn zero_percent_maps_to_ten_days() {
        assert_eq!(Penalty::from_percent(0).late_days, 10);
        assert_eq!(Penalty::from_percent(100), Penalty::NONE);
    }

    #[test]
    fn pass_requires_full_marks_on_time() {
        assert!(ScoreRecord::scored("a", AnnotatedScore::on_time(100.0)).is_pass());
        assert!(!ScoreRecord::from_label("a", "100.0*90%").is_pass());
        assert!(!ScoreRecord::from_label("a", "99.5").is_pass());
        assert!(ScoreRecord::from_label("a", "Failed").is_failed());
    }

    #[test]
    fn failed_record_has_no_score_and_no_penalty() {
        let rec = ScoreRecord::failed("3210001");
        assert_eq!(rec.raw_score, None);
        assert_eq!(rec.penalty_percent, 100);
        assert_eq!(rec.final_label, "Failed");
    }
}
