//! Aggregates, computed in one sequential pass after a fan-out has finished.

use std::ops::AddAssign;

use serde::Serialize;

use crate::unit::{UnitResult, UnitStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Always the roster size.
    pub total: usize,
    /// Rows written as `Failed`, skipped ones included.
    pub failed: usize,
    /// Full marks with no late penalty.
    pub passed: usize,
    pub late: usize,
    pub cached: usize,
    pub parse_errors: usize,
    pub alternate_toolchain: usize,
}

impl Summary {
    pub fn of(results: &[UnitResult]) -> Self {
        results.iter().fold(Summary::default(), |mut s, r| {
            s.total += 1;
            s.failed += usize::from(r.record.is_failed());
            s.passed += usize::from(r.record.is_pass());
            s.late += usize::from(!r.record.is_failed() && r.record.is_late());
            s.cached += usize::from(r.status == UnitStatus::Cached);
            s.parse_errors += usize::from(r.audit.parse_error);
            s.alternate_toolchain += usize::from(r.audit.alternate_toolchain);
            s
        })
    }

    /// `Total: 40, Failed: 3 (7.50%), Pass: 30 (75.00%)`
    pub fn headline(&self) -> String {
        format!(
            "Total: {}, Failed: {} ({}), Pass: {} ({})",
            self.total,
            self.failed,
            percent(self.failed, self.total),
            self.passed,
            percent(self.passed, self.total)
        )
    }
}

impl AddAssign for Summary {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.failed += other.failed;
        self.passed += other.passed;
        self.late += other.late;
        self.cached += other.cached;
        self.parse_errors += other.parse_errors;
        self.alternate_toolchain += other.alternate_toolchain;
    }
}

/// `part / whole` as a percentage with two decimals; `0.00%` for an empty whole.
pub fn percent(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", part as f64 * 100.0 / whole as f64)
}
