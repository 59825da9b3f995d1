use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the API assigns to an export job at submission time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ReportId(pub i64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of an export job.
///
/// The set of values is defined by the remote system and open-ended. Only
/// `"Finished"` is terminal; every other value is kept verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ReportStatus {
    Finished,
    Other(String),
}

impl ReportStatus {
    pub const FINISHED: &'static str = "Finished";

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Finished => Self::FINISHED,
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ReportStatus {
    fn from(raw: String) -> Self {
        if raw == Self::FINISHED {
            Self::Finished
        } else {
            Self::Other(raw)
        }
    }
}

impl From<ReportStatus> for String {
    fn from(status: ReportStatus) -> Self {
        match status {
            ReportStatus::Finished => ReportStatus::FINISHED.to_string(),
            ReportStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `GET /api/v0/history/exports`.
///
/// `reportId` and `status` are required; the window echo and category map
/// are kept as returned and tolerated when absent. A listing entry missing a
/// required field is skipped by `Client::list_exports` rather than failing
/// the whole listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobRecord {
    pub report_id: ReportId,
    pub time_from: Option<String>,
    pub time_to: Option<String>,
    #[serde(default)]
    pub data_included: BTreeMap<String, bool>,
    pub status: ReportStatus,
    pub download_link: Option<String>,
}

/// Success body of `POST /api/v0/history/exports`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExportResponse {
    pub report_id: ReportId,
}
