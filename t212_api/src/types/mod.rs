mod record;
mod request;

pub use record::{ExportJobRecord, ReportId, ReportStatus, SubmitExportResponse};
pub use request::{parse_timestamp, DataIncluded, ExportJobRequest, TIMESTAMP_FORMAT};
