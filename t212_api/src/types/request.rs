use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::Error;

/// Wire format for export window timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which transaction categories an export includes.
///
/// Every category defaults to included, both when constructed in code and
/// when a field is missing from an API response.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DataIncluded {
    pub include_dividends: bool,
    pub include_interest: bool,
    pub include_orders: bool,
    pub include_transactions: bool,
}

impl Default for DataIncluded {
    fn default() -> Self {
        Self {
            include_dividends: true,
            include_interest: true,
            include_orders: true,
            include_transactions: true,
        }
    }
}

/// Body of `POST /api/v0/history/exports`.
///
/// Covers the half-open window `[time_from, time_to)`. The constructors
/// guarantee `time_from < time_to`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobRequest {
    data_included: DataIncluded,
    #[serde(serialize_with = "serialize_timestamp")]
    time_from: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    time_to: DateTime<Utc>,
}

impl ExportJobRequest {
    /// Creates a request for all categories over `[time_from, time_to)`.
    pub fn new(time_from: DateTime<Utc>, time_to: DateTime<Utc>) -> Result<Self, Error> {
        if time_from >= time_to {
            return Err(Error::InvalidWindow {
                time_from: time_from.format(TIMESTAMP_FORMAT).to_string(),
                time_to: time_to.format(TIMESTAMP_FORMAT).to_string(),
            });
        }
        Ok(Self {
            data_included: DataIncluded::default(),
            time_from,
            time_to,
        })
    }

    /// Creates a request from timestamp strings (see [`parse_timestamp`]).
    pub fn from_strs(time_from: &str, time_to: &str) -> Result<Self, Error> {
        Self::new(parse_timestamp(time_from)?, parse_timestamp(time_to)?)
    }

    pub fn with_data_included(mut self, data_included: DataIncluded) -> Self {
        self.data_included = data_included;
        self
    }

    pub fn time_from(&self) -> DateTime<Utc> {
        self.time_from
    }

    pub fn time_to(&self) -> DateTime<Utc> {
        self.time_to
    }

    pub fn data_included(&self) -> DataIncluded {
        self.data_included
    }
}

/// Parses `YYYY-MM-DDTHH:MM:SSZ`, any RFC 3339 timestamp (normalized to UTC),
/// or a bare `YYYY-MM-DDTHH:MM:SS` taken as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, Error> {
    let trimmed = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::InvalidTimestamp(trimmed.to_string()))
}

fn serialize_timestamp<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
}
