//! Indian fiscal years (1 April – 31 March).
//!
//! Labels look like `FY - 2024-25`. Nothing here is cached: the current year
//! changes on 1 April, so callers resolve it from the clock every time.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

/// Number of fiscal years provisioned for a client, current one included
pub const WINDOW_SIZE: usize = 3;

/// A fiscal year identified by the calendar year it starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiscalYear {
    pub start_year: i32,
}

impl FiscalYear {
    pub fn starting(start_year: i32) -> Self {
        Self { start_year }
    }

    /// The fiscal year containing `date`. April (month index 3) or later
    /// belongs to the year starting this calendar year.
    pub fn containing<D: Datelike>(date: &D) -> Self {
        let start_year = if date.month0() >= 3 {
            date.year()
        } else {
            date.year() - 1
        };
        Self { start_year }
    }

    pub fn previous(&self) -> Self {
        Self::starting(self.start_year - 1)
    }

    pub fn label(&self) -> String {
        format!(
            "FY - {}-{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }

    /// Parse a label produced by [`FiscalYear::label`]
    pub fn parse(label: &str) -> Option<Self> {
        let rest = label.trim().strip_prefix("FY - ")?;
        let (start, end) = rest.split_once('-')?;
        let start_year: i32 = start.trim().parse().ok()?;
        let end_suffix: i32 = end.trim().parse().ok()?;
        if end.trim().len() != 2 || (start_year + 1).rem_euclid(100) != end_suffix {
            return None;
        }
        Some(Self { start_year })
    }
}

impl std::fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Label of the fiscal year containing `date`
pub fn current_fiscal_year<D: Datelike>(date: &D) -> String {
    FiscalYear::containing(date).label()
}

/// The two preceding fiscal years and the current one, oldest first
pub fn fiscal_year_window<D: Datelike>(date: &D) -> Vec<FiscalYear> {
    let current = FiscalYear::containing(date);
    (0..WINDOW_SIZE as i32)
        .rev()
        .map(|back| FiscalYear::starting(current.start_year - back))
        .collect()
}

/// Same as [`fiscal_year_window`] but as labels
pub fn fiscal_year_window_labels<D: Datelike>(date: &D) -> Vec<String> {
    fiscal_year_window(date).iter().map(FiscalYear::label).collect()
}

/// Calendar date of an instant in the practice's time zone
pub fn local_date<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    now.date_naive()
}
