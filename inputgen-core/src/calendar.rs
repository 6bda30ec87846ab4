//! Monthly time axes on the 365-day (`noleap`) calendar.
//!
//! Times are expressed as `days since 0001-01-01 00:00:00` on that calendar.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days in each month of a no-leap year.
pub const EOM_DAY_NOLEAP: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub const DAYS_PER_YEAR: u32 = 365;

/// Days in the months before `month` (1-based).
fn days_before_month(month: u32) -> u32 {
    EOM_DAY_NOLEAP[..(month - 1) as usize].iter().sum()
}

/// A date and time of day on the no-leap calendar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoLeapDate {
    year: i32,
    month: u32,
    day: u32,
    hour: f64,
}

impl NoLeapDate {
    /// Returns `None` for a month outside `1..=12`, a day outside the month
    /// or an hour outside `0..24`.
    pub fn new(year: i32, month: u32, day: u32, hour: f64) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        if day == 0 || day > EOM_DAY_NOLEAP[(month - 1) as usize] {
            return None;
        }
        if !(0.0..24.0).contains(&hour) {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            hour,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn hour(&self) -> f64 {
        self.hour
    }

    pub fn days_since_0001(&self) -> f64 {
        f64::from(self.year - 1) * f64::from(DAYS_PER_YEAR)
            + f64::from(days_before_month(self.month))
            + f64::from(self.day - 1)
            + self.hour / 24.0
    }
}

impl fmt::Display for NoLeapDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole_hours = self.hour.floor();
        let minutes = ((self.hour - whole_hours) * 60.0).round();
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:00",
            self.year, self.month, self.day, whole_hours as u32, minutes as u32
        )
    }
}

/// The middle of every month of `years`, in order.
///
/// The midpoint is taken as day `eom / 2 + 1`, so January's is day 16 at
/// 12:00 and February's is day 15 at 00:00.
pub fn time_mid_month(years: &[i32]) -> Vec<NoLeapDate> {
    years
        .iter()
        .flat_map(|&year| {
            EOM_DAY_NOLEAP.iter().enumerate().map(move |(index, &eom)| {
                let mid = f64::from(eom) / 2.0 + 1.0;
                let day = mid.floor();
                NoLeapDate {
                    year,
                    month: index as u32 + 1,
                    day: day as u32,
                    hour: (mid - day) * 24.0,
                }
            })
        })
        .collect()
}

/// [`time_mid_month`] as days since 0001-01-01.
pub fn time_mid_month_days(years: &[i32]) -> Array1<f64> {
    time_mid_month(years)
        .iter()
        .map(NoLeapDate::days_since_0001)
        .collect()
}

/// Monthly bounds of shape `(12 * years.len(), 2)`.
///
/// Each row is `[first day of month - 1, last day of month]` in days since
/// 0001-01-01.
pub fn time_bounds_month(years: &[i32]) -> Array2<f64> {
    let mut bounds = Array2::zeros((12 * years.len(), 2));
    for (year_index, &year) in years.iter().enumerate() {
        for (month_index, &eom) in EOM_DAY_NOLEAP.iter().enumerate() {
            let month = month_index as u32 + 1;
            let first = NoLeapDate {
                year,
                month,
                day: 1,
                hour: 0.0,
            };
            let last = NoLeapDate { day: eom, ..first };
            let row = year_index * 12 + month_index;
            bounds[[row, 0]] = first.days_since_0001() - 1.0;
            bounds[[row, 1]] = last.days_since_0001();
        }
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_length() {
        assert_eq!(EOM_DAY_NOLEAP.iter().sum::<u32>(), DAYS_PER_YEAR);
    }

    #[test]
    fn test_days_since_0001() {
        assert_eq!(NoLeapDate::new(1, 1, 1, 0.0).unwrap().days_since_0001(), 0.0);
        assert_eq!(NoLeapDate::new(1, 3, 1, 0.0).unwrap().days_since_0001(), 59.0);
        assert_eq!(NoLeapDate::new(2, 1, 1, 12.0).unwrap().days_since_0001(), 365.5);
    }

    #[test]
    fn test_invalid_dates() {
        assert!(NoLeapDate::new(2000, 2, 29, 0.0).is_none());
        assert!(NoLeapDate::new(2000, 13, 1, 0.0).is_none());
        assert!(NoLeapDate::new(2000, 1, 0, 0.0).is_none());
        assert!(NoLeapDate::new(2000, 1, 1, 24.0).is_none());
    }

    #[test]
    fn test_mid_month() {
        let mids = time_mid_month(&[2000, 2001]);
        assert_eq!(mids.len(), 24);
        assert_eq!(mids[0], NoLeapDate::new(2000, 1, 16, 12.0).unwrap());
        assert_eq!(mids[1], NoLeapDate::new(2000, 2, 15, 0.0).unwrap());
        assert_eq!(mids[3], NoLeapDate::new(2000, 4, 16, 0.0).unwrap());
        assert_eq!(mids[12].year(), 2001);
        assert_eq!(mids[0].to_string(), "2000-01-16 12:00:00");
    }

    #[test]
    fn test_mid_month_days() {
        let days = time_mid_month_days(&[1]);
        assert_eq!(days[0], 15.5);
        assert_eq!(days[1], 31.0 + 14.0);
    }

    #[test]
    fn test_bounds_month() {
        let bounds = time_bounds_month(&[1, 2]);
        assert_eq!(bounds.dim(), (24, 2));
        assert_eq!(bounds.row(0).to_vec(), vec![-1.0, 30.0]);
        assert_eq!(bounds.row(1).to_vec(), vec![30.0, 58.0]);
        assert_eq!(bounds.row(12).to_vec(), vec![364.0, 395.0]);
        for row in 1..24 {
            assert_eq!(bounds[[row, 0]], bounds[[row - 1, 1]]);
        }
    }
}
