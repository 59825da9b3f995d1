//! Typed client for the Trading 212 history export API.
//!
//! Covers the two export endpoints (submit a job, list jobs) plus the plain
//! download of a finished export file.

mod client;
mod errors;
pub mod types;
pub use self::client::{Client, DEFAULT_BASE_URL, DEMO_BASE_URL, EXPORTS_PATH};
pub use self::errors::Error;
pub use self::types::{
    DataIncluded, ExportJobRecord, ExportJobRequest, ReportId, ReportStatus, SubmitExportResponse,
};
