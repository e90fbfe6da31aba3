//! Inclusive calendar date range shared by events, participants and task types.

use super::ModelValidationError;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Builds a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ModelValidationError> {
        if start > end {
            return Err(ModelValidationError::InvertedDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Single-day range.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of dates in the range; always at least 1.
    pub fn num_days(&self) -> u64 {
        // start <= end is guaranteed by construction.
        (self.end - self.start).num_days().unsigned_abs() + 1
    }

    /// Iterates every date from `start` to `end`, inclusive.
    pub fn iter_dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |date| {
            date.checked_add_days(Days::new(1))
                .filter(|next| *next <= end)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::DateRange;
    use crate::model::ModelValidationError;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 8, d).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::new(day(5), day(1)).unwrap_err();
        assert!(matches!(err, ModelValidationError::InvertedDateRange { .. }));
    }

    #[test]
    fn iterates_inclusive_dates() {
        let range = DateRange::new(day(29), day(31)).unwrap();
        let dates: Vec<_> = range.iter_dates().collect();
        assert_eq!(dates, vec![day(29), day(30), day(31)]);
        assert_eq!(range.num_days(), 3);
    }

    #[test]
    fn iteration_crosses_month_boundary() {
        let range = DateRange::new(day(31), NaiveDate::from_ymd_opt(2016, 9, 2).unwrap()).unwrap();
        assert_eq!(range.iter_dates().count(), 3);
        assert_eq!(range.num_days(), 3);
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let range = DateRange::new(day(10), day(12)).unwrap();
        assert!(range.contains(day(10)));
        assert!(range.contains(day(12)));
        assert!(!range.contains(day(9)));
        assert!(!range.contains(day(13)));
    }

    #[test]
    fn single_day_range_yields_one_date() {
        let range = DateRange::single(day(3));
        assert_eq!(range.iter_dates().collect::<Vec<_>>(), vec![day(3)]);
    }
}
