//! Calendar-date collection windows.
//!
//! A window is given as two calendar dates and expands to
//! `start 00:00:00` through `end 23:59:00` UTC. Membership is strict on
//! both ends.

use crate::error::{CrawlError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `[year, month, day]` triple as accepted by crawl plans.
pub type DateTriple = [i32; 3];

/// Closed calendar range used to bound one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Build a window, rejecting `start > end`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidWindow`] when the start date is after the end date.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(CrawlError::InvalidWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Build a window from `[year, month, day]` triples.
    ///
    /// # Errors
    ///
    /// Returns an error for impossible calendar dates or a reversed window.
    pub fn from_triples(start: DateTriple, end: DateTriple) -> Result<Self> {
        Self::new(date_from_triple(start, "start date")?, date_from_triple(end, "end date")?)
    }

    /// First instant of the window (`start 00:00`).
    #[must_use]
    pub fn start_at(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last instant of the window (`end 23:59`).
    #[must_use]
    pub fn end_at(&self) -> DateTime<Utc> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN);
        self.end.and_time(end_of_day).and_utc()
    }

    /// Whether a post timestamp falls strictly inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start_at() < timestamp && timestamp < self.end_at()
    }

    /// Human-readable label, e.g. `2020-03-14_to_2020-03-21`.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{}_to_{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

/// Convert a `[year, month, day]` triple into a date.
///
/// # Errors
///
/// Returns [`CrawlError::InvalidDate`] if the triple is not a calendar date.
pub fn date_from_triple(triple: DateTriple, context: &str) -> Result<NaiveDate> {
    let [year, month, day] = triple;
    let invalid = || CrawlError::invalid_date(format!("{year}-{month}-{day}"), context);
    let month = u32::try_from(month).map_err(|_| invalid())?;
    let day = u32::try_from(day).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parse `YYYY-MM-DD` into a `[year, month, day]` triple.
///
/// # Errors
///
/// Returns [`CrawlError::InvalidDate`] if the input is not an ISO calendar date.
pub fn parse_date_triple(input: &str) -> Result<DateTriple> {
    let trimmed = input.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| CrawlError::invalid_date(trimmed, "date argument"))?;
    Ok(triple_from_date(date))
}

#[must_use]
pub fn triple_from_date(date: NaiveDate) -> DateTriple {
    use chrono::Datelike;
    // month and day always fit in i32
    [
        date.year(),
        i32::try_from(date.month()).unwrap_or_default(),
        i32::try_from(date.day()).unwrap_or_default(),
    ]
}
