use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

mod common;

use common::ManualClock;
use t212_export_lib::t212_api::Error as ApiError;
use t212_export_lib::{
    Clock, ExportApi, ExportJobRecord, ExportJobRequest, PollError, PollFailure, PollState,
    PollerConfig, ReportId, ReportPoller, ReportStatus, TokioClock,
};

// ============================================================================
// Scripted API
// ============================================================================

/// Replays queued responses in order. Running out of script is a test bug.
#[derive(Default)]
struct ScriptedApi {
    submits: Mutex<VecDeque<Result<ReportId, ApiError>>>,
    listings: Mutex<VecDeque<Result<Vec<ExportJobRecord>, ApiError>>>,
    submit_calls: AtomicU32,
    list_calls: AtomicU32,
}

impl ScriptedApi {
    fn submit(self, result: Result<ReportId, ApiError>) -> Self {
        self.submits.lock().unwrap().push_back(result);
        self
    }

    fn listing(self, result: Result<Vec<ExportJobRecord>, ApiError>) -> Self {
        self.listings.lock().unwrap().push_back(result);
        self
    }

    fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl ExportApi for ScriptedApi {
    async fn submit_export(&self, _request: &ExportJobRequest) -> Result<ReportId, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected submit_export call")
    }

    async fn list_exports(&self) -> Result<Vec<ExportJobRecord>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listings
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected list_exports call")
    }

    async fn download_export(&self, _download_link: &str) -> Result<Vec<u8>, ApiError> {
        unreachable!("the poller never downloads")
    }
}

/// Hands out a fresh id per submission, like the real API.
struct CountingApi {
    next_id: AtomicI64,
}

impl ExportApi for CountingApi {
    async fn submit_export(&self, _request: &ExportJobRequest) -> Result<ReportId, ApiError> {
        Ok(ReportId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn list_exports(&self) -> Result<Vec<ExportJobRecord>, ApiError> {
        let last = self.next_id.load(Ordering::SeqCst);
        Ok((1..last)
            .map(|id| finished(id, &format!("https://x/{}", id)))
            .collect())
    }

    async fn download_export(&self, _download_link: &str) -> Result<Vec<u8>, ApiError> {
        unreachable!("the poller never downloads")
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn record(id: i64, status: &str, link: Option<&str>) -> ExportJobRecord {
    ExportJobRecord {
        report_id: ReportId(id),
        time_from: Some("2024-08-01T00:00:00Z".to_string()),
        time_to: Some("2024-09-01T00:00:00Z".to_string()),
        data_included: Default::default(),
        status: ReportStatus::from(status.to_string()),
        download_link: link.map(str::to_string),
    }
}

fn finished(id: i64, link: &str) -> ExportJobRecord {
    record(id, "Finished", Some(link))
}

fn rejected(status: u16) -> ApiError {
    ApiError::RemoteRejected {
        status,
        body: String::new(),
    }
}

fn august_2024() -> ExportJobRequest {
    ExportJobRequest::from_strs("2024-08-01T00:00:00Z", "2024-09-01T00:00:00Z").unwrap()
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|&s| Duration::from_secs(s)).collect()
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn submit_retries_each_failure_with_submit_spacing() {
    let api = ScriptedApi::default()
        .submit(Err(rejected(429)))
        .submit(Err(rejected(500)))
        .submit(Err(ApiError::MalformedResponse("no reportId".to_string())))
        .submit(Ok(ReportId(42)))
        .listing(Ok(vec![finished(42, "https://x/42")]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let resolved = poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(resolved.report_id, ReportId(42));
    assert_eq!(api.submit_calls(), 4);
    assert_eq!(api.list_calls(), 1);
    // Three submit backoffs, then the settle delay before the first poll.
    assert_eq!(clock.sleeps(), secs(&[30, 30, 30, 10]));
}

#[tokio::test]
async fn repeated_runs_are_not_deduplicated() {
    let api = CountingApi {
        next_id: AtomicI64::new(1),
    };
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());
    let request = august_2024();

    let first = poller.resolve(&request).await.unwrap();
    let second = poller.resolve(&request).await.unwrap();

    assert_ne!(first.report_id, second.report_id);
    assert_eq!(first.download_link, "https://x/1");
    assert_eq!(second.download_link, "https://x/2");
}

#[tokio::test]
async fn submit_limit_surfaces_last_error() {
    let api = ScriptedApi::default()
        .submit(Err(rejected(429)))
        .submit(Err(rejected(429)))
        .submit(Err(rejected(401)));
    let clock = ManualClock::new();
    let config = PollerConfig {
        max_submit_attempts: Some(3),
        ..PollerConfig::default()
    };
    let poller = ReportPoller::new(&api, &clock, config);

    let err = poller.resolve(&august_2024()).await.unwrap_err();

    match err {
        PollError::SubmitAttemptsExhausted {
            attempts,
            last_failure,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_failure.status(), Some(401));
        }
        other => panic!("expected SubmitAttemptsExhausted, got {:?}", other),
    }
    assert_eq!(clock.sleeps(), secs(&[30, 30]));
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test]
async fn end_to_end_scenario_matches_by_id_not_position() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(42)))
        .listing(Ok(vec![record(42, "Processing", None)]))
        .listing(Ok(vec![
            finished(41, "https://x/41"),
            finished(42, "https://x/42"),
        ]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let resolved = poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(resolved.download_link, "https://x/42");
    assert_eq!(api.list_calls(), 2);
    assert_eq!(clock.sleeps(), secs(&[10, 60]));
}

#[tokio::test]
async fn duplicate_ids_resolve_from_the_last_record() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(42)))
        // Finished entry first, pending re-submission last: still pending.
        .listing(Ok(vec![
            finished(42, "https://x/stale"),
            record(42, "Processing", None),
        ]))
        // Reverse layout: the last record is the finished one.
        .listing(Ok(vec![
            record(42, "Processing", None),
            finished(41, "https://x/41"),
            finished(42, "https://x/fresh"),
        ]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let resolved = poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(resolved.download_link, "https://x/fresh");
    assert_eq!(api.list_calls(), 2);
}

#[tokio::test]
async fn missing_id_is_waited_out() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(42)))
        .listing(Ok(vec![finished(41, "https://x/41")]))
        .listing(Ok(vec![]))
        .listing(Ok(vec![
            finished(41, "https://x/41"),
            finished(42, "https://x/42"),
        ]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let resolved = poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(resolved.download_link, "https://x/42");
    assert_eq!(api.list_calls(), 3);
    assert_eq!(clock.sleeps(), secs(&[10, 60, 60]));
}

#[tokio::test]
async fn listing_errors_are_retried_with_poll_spacing() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(7)))
        .listing(Err(rejected(429)))
        .listing(Err(ApiError::MalformedResponse("not json".to_string())))
        .listing(Ok(vec![finished(7, "https://x/7")]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let resolved = poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(resolved.report_id, ReportId(7));
    assert_eq!(clock.sleeps(), secs(&[10, 60, 60]));
}

#[tokio::test]
async fn finished_without_link_keeps_polling() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(42)))
        .listing(Ok(vec![record(42, "Finished", None)]))
        .listing(Ok(vec![finished(42, "https://x/42")]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let resolved = poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(resolved.download_link, "https://x/42");
    assert_eq!(api.list_calls(), 2);
}

#[tokio::test]
async fn failed_status_is_not_terminal() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(42)))
        .listing(Ok(vec![record(42, "Failed", None)]))
        .listing(Ok(vec![finished(42, "https://x/42")]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let resolved = poller.resolve(&august_2024()).await.unwrap();
    assert_eq!(resolved.download_link, "https://x/42");
}

#[tokio::test]
async fn poll_limit_surfaces_last_status() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(42)))
        .listing(Ok(vec![record(42, "Queued", None)]))
        .listing(Ok(vec![record(42, "Processing", None)]));
    let clock = ManualClock::new();
    let config = PollerConfig {
        max_poll_attempts: Some(2),
        ..PollerConfig::default()
    };
    let poller = ReportPoller::new(&api, &clock, config);

    let err = poller.resolve(&august_2024()).await.unwrap_err();

    match err {
        PollError::PollAttemptsExhausted {
            report_id,
            attempts,
            last_failure: PollFailure::NotFinished { status, .. },
        } => {
            assert_eq!(report_id, ReportId(42));
            assert_eq!(attempts, 2);
            assert_eq!(status.as_str(), "Processing");
        }
        other => panic!("expected PollAttemptsExhausted, got {:?}", other),
    }
    assert_eq!(clock.sleeps(), secs(&[10, 60]));
}

#[tokio::test]
async fn deadline_stops_before_overrunning() {
    let api = ScriptedApi::default()
        .submit(Ok(ReportId(42)))
        .listing(Ok(vec![record(42, "Processing", None)]))
        .listing(Ok(vec![record(42, "Processing", None)]));
    let clock = ManualClock::new();
    let config = PollerConfig {
        deadline: Some(Duration::from_secs(100)),
        ..PollerConfig::default()
    };
    let poller = ReportPoller::new(&api, &clock, config);

    let err = poller.resolve(&august_2024()).await.unwrap_err();

    match err {
        PollError::DeadlineExceeded {
            deadline,
            elapsed,
            last_failure,
        } => {
            assert_eq!(deadline, Duration::from_secs(100));
            assert_eq!(elapsed, Duration::from_secs(70));
            assert!(matches!(last_failure, Some(PollFailure::NotFinished { .. })));
        }
        other => panic!("expected DeadlineExceeded, got {:?}", other),
    }
    // settle (10) + one poll wait (60); a second poll wait would reach 130.
    assert_eq!(clock.sleeps(), secs(&[10, 60]));
    assert_eq!(api.list_calls(), 2);
}

#[tokio::test]
async fn custom_intervals_are_used() {
    let api = ScriptedApi::default()
        .submit(Err(rejected(429)))
        .submit(Ok(ReportId(1)))
        .listing(Ok(vec![record(1, "Processing", None)]))
        .listing(Ok(vec![finished(1, "https://x/1")]));
    let clock = ManualClock::new();
    let config = PollerConfig {
        submit_interval: Duration::from_secs(45),
        settle_delay: Duration::from_secs(3),
        poll_interval: Duration::from_secs(90),
        ..PollerConfig::default()
    };
    let poller = ReportPoller::new(&api, &clock, config);

    poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(clock.sleeps(), secs(&[45, 3, 90]));
}

// ============================================================================
// State machine
// ============================================================================

#[tokio::test]
async fn step_walks_each_state() {
    let api = ScriptedApi::default()
        .submit(Err(rejected(503)))
        .submit(Ok(ReportId(5)))
        .listing(Ok(vec![record(5, "Running", None)]))
        .listing(Ok(vec![finished(5, "https://x/5")]));
    let clock = ManualClock::new();
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());
    let request = august_2024();
    let started = clock.now();

    let mut state = PollState::Submitting { attempt: 1 };
    let mut seen = vec![state.clone()];
    while !matches!(state, PollState::Resolved(_)) {
        state = poller.step(state, &request, started).await.unwrap();
        seen.push(state.clone());
    }

    assert_eq!(seen.len(), 6);
    assert_eq!(seen[1], PollState::Submitting { attempt: 2 });
    assert_eq!(seen[2], PollState::Submitted(ReportId(5)));
    assert_eq!(
        seen[3],
        PollState::Polling {
            report_id: ReportId(5),
            attempt: 1
        }
    );
    assert_eq!(
        seen[4],
        PollState::Polling {
            report_id: ReportId(5),
            attempt: 2
        }
    );
    match &seen[5] {
        PollState::Resolved(resolved) => assert_eq!(resolved.download_link, "https://x/5"),
        other => panic!("expected Resolved, got {:?}", other),
    }

    // Resolved is terminal: stepping again is a no-op.
    let again = poller.step(state.clone(), &request, started).await.unwrap();
    assert_eq!(again, state);
}

#[tokio::test(start_paused = true)]
async fn tokio_clock_waits_for_real() {
    let api = ScriptedApi::default()
        .submit(Err(rejected(429)))
        .submit(Ok(ReportId(9)))
        .listing(Ok(vec![record(9, "Processing", None)]))
        .listing(Ok(vec![finished(9, "https://x/9")]));
    let clock = TokioClock;
    let poller = ReportPoller::new(&api, &clock, PollerConfig::default());

    let start = tokio::time::Instant::now();
    let resolved = poller.resolve(&august_2024()).await.unwrap();

    assert_eq!(resolved.download_link, "https://x/9");
    assert!(start.elapsed() >= Duration::from_secs(30 + 10 + 60));
}
