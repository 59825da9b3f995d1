//! Reporting period: one calendar month, written `YYYY-MM`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use t212_api::ExportJobRequest;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeriodError {
    #[error("invalid reporting period '{0}'. Expected format: YYYY-MM (e.g., 2024-08)")]
    InvalidFormat(String),
    #[error("reporting period {0} is out of range")]
    OutOfRange(String),
    #[error("failed to build export request: {0}")]
    Request(#[from] t212_api::Error),
}

/// A calendar month the export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportingPeriod {
    first_day: NaiveDate,
}

impl ReportingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| PeriodError::OutOfRange(format!("{:04}-{:02}", year, month)))
    }

    /// The month that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    /// The month before the one containing `today`. Default for a run.
    pub fn previous_month(today: NaiveDate) -> Self {
        let this_month = Self::containing(today);
        let first_day = this_month
            .first_day
            .checked_sub_months(Months::new(1))
            .unwrap_or(this_month.first_day);
        Self { first_day }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    /// Midnight UTC on the first day of the month.
    pub fn first_day(&self) -> DateTime<Utc> {
        self.first_day.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Midnight UTC on the first day of the following month. December rolls
    /// into January of the next year.
    pub fn first_day_of_next_month(&self) -> Result<DateTime<Utc>, PeriodError> {
        self.first_day
            .checked_add_months(Months::new(1))
            .map(|next| next.and_time(chrono::NaiveTime::MIN).and_utc())
            .ok_or_else(|| PeriodError::OutOfRange(self.to_string()))
    }

    /// Export request for `[first_day, first_day_of_next_month)`, all
    /// categories included.
    pub fn export_request(&self) -> Result<ExportJobRequest, PeriodError> {
        Ok(ExportJobRequest::new(
            self.first_day(),
            self.first_day_of_next_month()?,
        )?)
    }

    /// `<YYYY-MM>.csv`, the file name shared by every stored artifact.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self)
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for ReportingPeriod {
    type Err = PeriodError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let invalid = || PeriodError::InvalidFormat(trimmed.to_string());

        let (year, month) = trimmed.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || !(1..=2).contains(&month.len()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Self::new(year, month)
    }
}
