//! Library layer for the Trading 212 to Digrin export job.
//!
//! Drives the asynchronous export through the report poller, then hands the
//! resolved download link to the artifact pipeline, which archives the raw
//! export, reshapes it for Digrin, and archives the result.

pub mod api;
pub mod clock;
pub mod config;
pub mod period;
pub mod pipeline;
pub mod poller;
pub mod storage;
pub mod transform;

pub use t212_api;
pub use t212_api::{ExportJobRecord, ExportJobRequest, ReportId, ReportStatus};

pub use api::ExportApi;
pub use clock::{Clock, TokioClock};
pub use config::{ConfigError, ExportConfig};
pub use period::{PeriodError, ReportingPeriod};
pub use pipeline::{ArtifactPipeline, ArtifactSummary, PipelineError};
pub use poller::{select_latest_record, PollError, PollFailure, PollState, PollerConfig, ReportPoller, ResolvedExport};
pub use storage::{ArtifactStore, LocalStore, S3Store, StorageError};
pub use transform::{transform_to_digrin, TickerRules, TransformError, TransformOutput};
