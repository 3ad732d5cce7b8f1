//! An inclusive calendar date range with a validated ordering invariant.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid date range: start {start} is after end {end}")]
pub struct InvertedDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// An inclusive range of calendar dates.
///
/// The constructor enforces `start <= end`; an inverted range is rejected at
/// the boundary so every `DateRange` held by the pipeline is well-formed.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use climate_etl::DateRange;
///
/// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
/// let range = DateRange::new(start, end).unwrap();
/// assert_eq!(range.num_days(), 5);
/// assert!(DateRange::new(end, start).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvertedDateRange> {
        if start > end {
            return Err(InvertedDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both endpoints.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterates every date in the range, ascending.
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.num_days() as usize)
    }
}
