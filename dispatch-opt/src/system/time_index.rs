use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Number of hourly steps in a non-leap year
pub const HOURS_PER_YEAR: usize = 24 * 365;

/// Fixed hourly calendar the energy system is optimised over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeIndex {
    /// Timestamp of the first step
    pub start: NaiveDateTime,
    /// Number of hourly steps
    pub periods: usize,
}

impl Default for TimeIndex {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2016, 1, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            periods: HOURS_PER_YEAR,
        }
    }
}

impl TimeIndex {
    pub fn new(start: NaiveDateTime, periods: usize) -> Self {
        Self { start, periods }
    }

    pub fn len(&self) -> usize {
        self.periods
    }

    pub fn is_empty(&self) -> bool {
        self.periods == 0
    }

    /// Timestamp of step `t`. Steps past the end are extrapolated hourly.
    pub fn timestamp(&self, t: usize) -> NaiveDateTime {
        self.start + TimeDelta::hours(t as i64)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.periods).map(|t| self.timestamp(t))
    }

    /// Number of steps shown in the "January" plot: the first twelfth of the series.
    ///
    /// This only matches the calendar month when the index starts on January 1st
    /// and covers exactly one year.
    pub fn first_month_end(&self) -> usize {
        self.periods / 12
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_is_year_2016() {
        let index = TimeIndex::default();
        assert_eq!(index.len(), 8760);
        assert_eq!(index.timestamp(0).to_string(), "2016-01-01 00:00:00");
        // 2016 is a leap year, so 8760 hours end on December 30th
        assert_eq!(index.timestamp(8759).to_string(), "2016-12-30 23:00:00");
    }

    #[test]
    fn test_first_month_end() {
        assert_eq!(TimeIndex::default().first_month_end(), 730);
        let short = TimeIndex::new(TimeIndex::default().start, 48);
        assert_eq!(short.first_month_end(), 4);
    }

    #[test]
    fn test_timestamps_are_hourly() {
        let index = TimeIndex::new(TimeIndex::default().start, 3);
        let stamps: Vec<String> = index.timestamps().map(|ts| ts.to_string()).collect();
        assert_eq!(
            stamps,
            vec![
                "2016-01-01 00:00:00",
                "2016-01-01 01:00:00",
                "2016-01-01 02:00:00"
            ]
        );
    }
}
