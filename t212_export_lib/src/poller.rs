//! Report poller: submits an export job and polls until it has a download link.
//!
//! The flow is an explicit state machine:
//!
//! ```text
//! Submitting --ok--> Submitted --settle delay--> Polling --Finished--> Resolved
//!     ^  |                                         ^  |
//!     +--+ submit failed, wait submit_interval     +--+ failed / missing / pending, wait poll_interval
//! ```
//!
//! Every failure loops back after a fixed wait. With the default
//! [`PollerConfig`] nothing is bounded, so a job that never finishes blocks
//! forever; callers that need a bound set `max_submit_attempts`,
//! `max_poll_attempts` or `deadline`.

use std::time::{Duration, Instant};

use t212_api::{Error as ApiError, ExportJobRecord, ExportJobRequest, ReportId, ReportStatus};
use thiserror::Error;

use crate::api::ExportApi;
use crate::clock::Clock;

/// Minimum spacing between export submissions (roughly one call per 30 s).
pub const DEFAULT_SUBMIT_INTERVAL: Duration = Duration::from_secs(30);

/// Wait between a successful submission and the first poll.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Minimum spacing between export listings (roughly one call per 60 s).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Timing and limits for [`ReportPoller`].
///
/// The intervals mirror the provider's rate limits as observed in practice;
/// they are not documented contractually, so all of them are overridable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub submit_interval: Duration,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    /// Give up after this many failed submissions. `None` retries forever.
    pub max_submit_attempts: Option<u32>,
    /// Give up after this many unresolved polls. `None` retries forever.
    pub max_poll_attempts: Option<u32>,
    /// Give up once a wait would push total elapsed time past this.
    pub deadline: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            submit_interval: DEFAULT_SUBMIT_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_submit_attempts: None,
            max_poll_attempts: None,
            deadline: None,
        }
    }
}

/// Where a poll run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// About to call `submit_export`; `attempt` starts at 1.
    Submitting { attempt: u32 },
    /// The job exists remotely; the settle delay comes next.
    Submitted(ReportId),
    /// About to call `list_exports`; `attempt` starts at 1.
    Polling { report_id: ReportId, attempt: u32 },
    /// Terminal.
    Resolved(ResolvedExport),
}

/// A finished export job and its short-lived download link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExport {
    pub report_id: ReportId,
    pub download_link: String,
}

/// Why a single poll did not resolve. Always transient.
#[derive(Error, Debug)]
pub enum PollFailure {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("report {0} is not in the export listing yet")]
    NoMatchingRecord(ReportId),
    #[error("report {report_id} is still {status}")]
    NotFinished {
        report_id: ReportId,
        status: ReportStatus,
    },
    #[error("report {0} is finished but has no download link")]
    MissingDownloadLink(ReportId),
}

/// Raised only when a caller-supplied limit in [`PollerConfig`] is reached.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("export submission failed {attempts} times, last error: {last_failure}")]
    SubmitAttemptsExhausted {
        attempts: u32,
        last_failure: ApiError,
    },
    #[error("report {report_id} unresolved after {attempts} polls, last result: {last_failure}")]
    PollAttemptsExhausted {
        report_id: ReportId,
        attempts: u32,
        last_failure: PollFailure,
    },
    #[error("deadline of {deadline:?} reached after {elapsed:?}")]
    DeadlineExceeded {
        deadline: Duration,
        elapsed: Duration,
        last_failure: Option<PollFailure>,
    },
}

/// Picks the record for `report_id` from a listing.
///
/// Scans from the last element backward and returns the first match. The API
/// appends re-submissions, so when an id is listed more than once this favours
/// the freshest entry.
pub fn select_latest_record(
    records: &[ExportJobRecord],
    report_id: ReportId,
) -> Option<&ExportJobRecord> {
    records.iter().rev().find(|record| record.report_id == report_id)
}

/// Drives one export job from submission to a resolved download link.
pub struct ReportPoller<'a, A, C> {
    api: &'a A,
    clock: &'a C,
    config: PollerConfig,
}

impl<'a, A, C> ReportPoller<'a, A, C>
where
    A: ExportApi,
    C: Clock,
{
    pub fn new(api: &'a A, clock: &'a C, config: PollerConfig) -> Self {
        Self { api, clock, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Runs the state machine until the job resolves or a limit is reached.
    pub async fn resolve(&self, request: &ExportJobRequest) -> Result<ResolvedExport, PollError> {
        let started = self.clock.now();
        let mut state = PollState::Submitting { attempt: 1 };
        loop {
            state = match state {
                PollState::Resolved(resolved) => return Ok(resolved),
                other => self.step(other, request, started).await?,
            };
        }
    }

    /// Performs the work of one state and returns the next one.
    ///
    /// `started` is the instant the run began and anchors the deadline.
    pub async fn step(
        &self,
        state: PollState,
        request: &ExportJobRequest,
        started: Instant,
    ) -> Result<PollState, PollError> {
        match state {
            PollState::Submitting { attempt } => match self.api.submit_export(request).await {
                Ok(report_id) => {
                    tracing::info!(%report_id, attempt, "Export job submitted");
                    Ok(PollState::Submitted(report_id))
                }
                Err(err) => {
                    if self
                        .config
                        .max_submit_attempts
                        .is_some_and(|max| attempt >= max)
                    {
                        return Err(PollError::SubmitAttemptsExhausted {
                            attempts: attempt,
                            last_failure: err,
                        });
                    }
                    tracing::warn!(
                        attempt,
                        "Export submission failed: {}; retrying in {:?}",
                        err,
                        self.config.submit_interval
                    );
                    self.wait(self.config.submit_interval, started, Some(PollFailure::Api(err)))
                        .await?;
                    Ok(PollState::Submitting {
                        attempt: attempt + 1,
                    })
                }
            },
            PollState::Submitted(report_id) => {
                tracing::debug!(%report_id, "Waiting {:?} before first poll", self.config.settle_delay);
                self.wait(self.config.settle_delay, started, None).await?;
                Ok(PollState::Polling {
                    report_id,
                    attempt: 1,
                })
            }
            PollState::Polling { report_id, attempt } => match self.poll_once(report_id).await {
                Ok(download_link) => {
                    tracing::info!(%report_id, attempt, "Export job finished");
                    Ok(PollState::Resolved(ResolvedExport {
                        report_id,
                        download_link,
                    }))
                }
                Err(failure) => {
                    if self
                        .config
                        .max_poll_attempts
                        .is_some_and(|max| attempt >= max)
                    {
                        return Err(PollError::PollAttemptsExhausted {
                            report_id,
                            attempts: attempt,
                            last_failure: failure,
                        });
                    }
                    match &failure {
                        PollFailure::NotFinished { .. } => tracing::info!(
                            attempt,
                            "{}; checking again in {:?}",
                            failure,
                            self.config.poll_interval
                        ),
                        _ => tracing::warn!(
                            attempt,
                            "Poll did not resolve: {}; retrying in {:?}",
                            failure,
                            self.config.poll_interval
                        ),
                    }
                    self.wait(self.config.poll_interval, started, Some(failure))
                        .await?;
                    Ok(PollState::Polling {
                        report_id,
                        attempt: attempt + 1,
                    })
                }
            },
            PollState::Resolved(_) => Ok(state),
        }
    }

    async fn poll_once(&self, report_id: ReportId) -> Result<String, PollFailure> {
        let records = self.api.list_exports().await?;
        let record = select_latest_record(&records, report_id)
            .ok_or(PollFailure::NoMatchingRecord(report_id))?;

        if !record.status.is_finished() {
            return Err(PollFailure::NotFinished {
                report_id,
                status: record.status.clone(),
            });
        }
        record
            .download_link
            .clone()
            .ok_or(PollFailure::MissingDownloadLink(report_id))
    }

    async fn wait(
        &self,
        duration: Duration,
        started: Instant,
        last_failure: Option<PollFailure>,
    ) -> Result<(), PollError> {
        if let Some(deadline) = self.config.deadline {
            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed + duration > deadline {
                return Err(PollError::DeadlineExceeded {
                    deadline,
                    elapsed,
                    last_failure,
                });
            }
        }
        self.clock.sleep(duration).await;
        Ok(())
    }
}
