//! Late-submission penalty.
//!
//! Both instants are compared on the absolute timeline, so a deadline written at
//! UTC+8 and a pipeline timestamp reported in UTC need no further normalisation.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::types::{AnnotatedScore, Penalty};

/// Percentage points deducted per started day.
pub const DAILY_DEDUCTION: u32 = 10;

/// Penalty for a submission made at `submitted` against `deadline`.
///
/// On time (including exactly at the deadline) keeps 100%. Otherwise every started
/// day late costs [`DAILY_DEDUCTION`] points, bottoming out at 0%.
pub fn assess(submitted: DateTime<Utc>, deadline: DateTime<FixedOffset>) -> Penalty {
    let late = submitted.signed_duration_since(deadline);
    if late <= TimeDelta::zero() {
        return Penalty::NONE;
    }

    let late_days = u32::try_from(late.num_days()).unwrap_or(u32::MAX).saturating_add(1);
    let percent = 100u32.saturating_sub(late_days.saturating_mul(DAILY_DEDUCTION));
    Penalty {
        late_days,
        // `percent` is at most 100.
        percent: percent as u8,
    }
}

/// Attaches the penalty to a raw score. No deadline means no penalty.
pub fn annotate(
    raw: f64,
    submitted: DateTime<Utc>,
    deadline: Option<DateTime<FixedOffset>>,
) -> AnnotatedScore {
    AnnotatedScore {
        raw,
        penalty: deadline.map_or(Penalty::NONE, |d| assess(submitted, d)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cst() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn deadline() -> DateTime<FixedOffset> {
        cst().with_ymd_and_hms(2025, 10, 1, 23, 59, 59).unwrap()
    }

    fn at(offset: TimeDelta) -> DateTime<Utc> {
        (deadline() + offset).with_timezone(&Utc)
    }

    #[test]
    fn exactly_at_deadline_is_on_time() {
        assert_eq!(assess(at(TimeDelta::zero()), deadline()), Penalty::NONE);
    }

    #[test]
    fn two_seconds_late_costs_one_day() {
        let submitted = cst()
            .with_ymd_and_hms(2025, 10, 2, 0, 0, 1)
            .unwrap()
            .with_timezone(&Utc);
        let p = assess(submitted, deadline());
        assert_eq!(p.late_days, 1);
        assert_eq!(p.percent, 90);
    }

    #[test]
    fn a_full_day_late_starts_the_second_day() {
        assert_eq!(assess(at(TimeDelta::days(1)), deadline()).late_days, 2);
        assert_eq!(
            assess(at(TimeDelta::days(1) - TimeDelta::seconds(1)), deadline()).late_days,
            1
        );
    }

    #[test]
    fn penalty_never_goes_negative() {
        let p = assess(at(TimeDelta::days(10) + TimeDelta::seconds(1)), deadline());
        assert_eq!(p.late_days, 11);
        assert_eq!(p.percent, 0);
        assert_eq!(assess(at(TimeDelta::days(400)), deadline()).percent, 0);
    }

    #[test]
    fn early_submission_is_on_time() {
        assert_eq!(assess(at(-TimeDelta::hours(5)), deadline()), Penalty::NONE);
    }

    #[test]
    fn utc_timestamps_compare_against_local_deadline() {
        // 16:00 UTC is midnight at UTC+8, one second after the deadline.
        let submitted = Utc.with_ymd_and_hms(2025, 10, 1, 16, 0, 0).unwrap();
        assert_eq!(assess(submitted, deadline()).percent, 90);
    }

    #[test]
    fn annotate_without_deadline_keeps_full_score() {
        let score = annotate(87.5, at(TimeDelta::days(3)), None);
        assert_eq!(score.penalty, Penalty::NONE);
        assert_eq!(score.to_string(), "87.5");
    }

    #[test]
    fn annotate_keeps_raw_score() {
        let score = annotate(100.0, at(TimeDelta::hours(30)), Some(deadline()));
        assert_eq!(score.raw, 100.0);
        assert_eq!(score.penalty.percent, 80);
        assert_eq!(score.to_string(), "100.0*80%");
    }
}
