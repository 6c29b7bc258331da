//! Partial-date resolution against the statement period.
//!
//! Statement lines carry day/month only (`20/06`); the enclosing period
//! supplies the year. Periods may span a calendar year boundary (a December
//! statement closing in January), so both boundary years are candidates.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::DateResolutionError;

/// Inclusive date range covered by one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatementPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Resolve a day/month (and optional year) to a full calendar date
    /// inside the period.
    ///
    /// Without a year, the period's start and end years are tried. When both
    /// produce an in-period date, the later year wins only if the month is
    /// chronologically after the period's start month.
    pub fn resolve(
        &self,
        day: u32,
        month: u32,
        year: Option<i32>,
    ) -> Result<NaiveDate, DateResolutionError> {
        if let Some(year) = year {
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or(DateResolutionError::InvalidDate { day, month })?;
            return if self.contains(date) {
                Ok(date)
            } else {
                Err(self.outside(date))
            };
        }

        let mut years = vec![self.start.year()];
        if self.end.year() != self.start.year() {
            years.push(self.end.year());
        }

        let valid: Vec<NaiveDate> = years
            .iter()
            .filter_map(|&y| NaiveDate::from_ymd_opt(y, month, day))
            .collect();
        if valid.is_empty() {
            // e.g. 29/02 when no candidate year is a leap year
            return Err(DateResolutionError::InvalidDate { day, month });
        }

        let in_period: Vec<NaiveDate> = valid
            .iter()
            .copied()
            .filter(|d| self.contains(*d))
            .collect();

        match in_period.as_slice() {
            [] => Err(self.outside(valid[0])),
            [only] => Ok(*only),
            [earlier, later, ..] => {
                if month > self.start.month() {
                    Ok(*later)
                } else {
                    Ok(*earlier)
                }
            }
        }
    }

    fn outside(&self, date: NaiveDate) -> DateResolutionError {
        DateResolutionError::OutsidePeriod {
            date,
            start: self.start,
            end: self.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(start: (i32, u32, u32), end: (i32, u32, u32)) -> StatementPeriod {
        StatementPeriod::new(date(start.0, start.1, start.2), date(end.0, end.1, end.2))
    }

    #[test]
    fn test_resolve_within_single_year() {
        let p = period((2019, 6, 4), (2019, 7, 3));
        assert_eq!(p.resolve(20, 6, None).unwrap(), date(2019, 6, 20));
        assert_eq!(p.resolve(1, 7, None).unwrap(), date(2019, 7, 1));
    }

    #[test]
    fn test_resolve_inclusive_bounds() {
        let p = period((2019, 6, 4), (2019, 7, 3));
        assert_eq!(p.resolve(4, 6, None).unwrap(), date(2019, 6, 4));
        assert_eq!(p.resolve(3, 7, None).unwrap(), date(2019, 7, 3));
    }

    #[test]
    fn test_resolve_year_rollover() {
        // December statement closing in January: 15/12 belongs to the old
        // year, 02/01 to the new one.
        let p = period((2019, 12, 3), (2020, 1, 3));
        assert_eq!(p.resolve(15, 12, None).unwrap(), date(2019, 12, 15));
        assert_eq!(p.resolve(2, 1, None).unwrap(), date(2020, 1, 2));
    }

    #[test]
    fn test_resolve_ambiguous_prefers_start_year_in_start_month() {
        // Both 04/01/2020 and 04/01/2021 fall inside this long period;
        // January is the period's start month, so the earlier year wins.
        let p = period((2020, 1, 2), (2021, 1, 5));
        assert_eq!(p.resolve(4, 1, None).unwrap(), date(2020, 1, 4));
    }

    #[test]
    fn test_resolve_ambiguous_prefers_later_year_after_start_month() {
        // Both 15/06/2020 and 15/06/2021 are in-period; June is after the
        // start month, so the later year wins.
        let p = period((2020, 1, 2), (2021, 6, 20));
        assert_eq!(p.resolve(15, 6, None).unwrap(), date(2021, 6, 15));
    }

    #[test]
    fn test_resolve_leap_day() {
        let p = period((2024, 2, 1), (2024, 3, 5));
        assert_eq!(p.resolve(29, 2, None).unwrap(), date(2024, 2, 29));
    }

    #[test]
    fn test_resolve_leap_day_non_leap_year_fails() {
        let p = period((2023, 2, 1), (2023, 3, 5));
        assert_eq!(
            p.resolve(29, 2, None),
            Err(DateResolutionError::InvalidDate { day: 29, month: 2 })
        );
    }

    #[test]
    fn test_resolve_outside_period_fails() {
        let p = period((2019, 6, 4), (2019, 7, 3));
        assert!(matches!(
            p.resolve(1, 9, None),
            Err(DateResolutionError::OutsidePeriod { .. })
        ));
    }

    #[test]
    fn test_resolve_explicit_year() {
        let p = period((2019, 6, 4), (2019, 7, 3));
        assert_eq!(p.resolve(20, 6, Some(2019)).unwrap(), date(2019, 6, 20));
        assert!(matches!(
            p.resolve(20, 6, Some(2020)),
            Err(DateResolutionError::OutsidePeriod { .. })
        ));
    }

    #[test]
    fn test_invalid_day_of_month() {
        let p = period((2019, 6, 4), (2019, 7, 3));
        assert_eq!(
            p.resolve(31, 6, None),
            Err(DateResolutionError::InvalidDate { day: 31, month: 6 })
        );
    }
}
