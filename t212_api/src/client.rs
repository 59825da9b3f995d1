//! HTTP client for the Trading 212 history export API.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{
    types::{ExportJobRecord, ExportJobRequest, ReportId, SubmitExportResponse},
    Error,
};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://live.trading212.com";

/// Practice-account API host.
pub const DEMO_BASE_URL: &str = "https://demo.trading212.com";

/// Path shared by the submit and list operations.
pub const EXPORTS_PATH: &str = "/api/v0/history/exports";

/// Request timeout for export API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the history export endpoints.
///
/// Authenticates with the raw API key in the `Authorization` header (no
/// `Bearer` prefix). Every operation maps non-success statuses to
/// [`Error::RemoteRejected`] and unexpected bodies to
/// [`Error::MalformedResponse`]; the client never retries on its own.
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    /// Base URL for the API. Defaults to `https://live.trading212.com`.
    base_url: String,
}

impl Client {
    /// Creates a client pointing at the production API.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Creates a client with a custom base URL. Used for the demo host and for
    /// testing with wiremock.
    pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn exports_url(&self) -> String {
        format!("{}{}", self.base_url, EXPORTS_PATH)
    }

    /// Starts an asynchronous export job and returns its id.
    ///
    /// Not idempotent: every call creates a new job on the remote side.
    pub async fn submit_export(&self, request: &ExportJobRequest) -> Result<ReportId, Error> {
        tracing::debug!(
            time_from = %request.time_from(),
            time_to = %request.time_to(),
            "Submitting export job"
        );
        let response = self
            .http
            .post(self.exports_url())
            .header(AUTHORIZATION, self.api_key.as_str())
            .json(request)
            .send()
            .await?;

        let body = read_success_body(response).await?;
        let parsed: SubmitExportResponse = parse_body(&body)?;
        Ok(parsed.report_id)
    }

    /// Lists export jobs in the order the API returns them.
    ///
    /// The order is not guaranteed to be chronological. Entries that do not
    /// decode as an [`ExportJobRecord`] are skipped with a warning; only a body
    /// that is not a JSON array is malformed.
    pub async fn list_exports(&self) -> Result<Vec<ExportJobRecord>, Error> {
        let response = self
            .http
            .get(self.exports_url())
            .header(AUTHORIZATION, self.api_key.as_str())
            .send()
            .await?;

        let body = read_success_body(response).await?;
        parse_export_listing(&body)
    }

    /// Downloads a finished export from its (short-lived) download link.
    ///
    /// The link is pre-signed, so no `Authorization` header is sent. Anything
    /// other than HTTP 200 is a rejection.
    pub async fn download_export(&self, download_link: &str) -> Result<Vec<u8>, Error> {
        let response = self.http.get(download_link).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let snippet = truncate_body(&body);
            tracing::error!("Export download failed with status {}: {}", status, snippet);
            return Err(Error::RemoteRejected {
                status: status.as_u16(),
                body: snippet,
            });
        }
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, Error> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet = truncate_body(&body);
        tracing::warn!("Export API rejected request with status {}: {}", status, snippet);
        return Err(Error::RemoteRejected {
            status: status.as_u16(),
            body: snippet,
        });
    }
    Ok(response.text().await?)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str::<T>(body).map_err(|e| {
        let snippet = truncate_body(body);
        tracing::error!("Failed to parse export API response: {} | body: {}", e, snippet);
        Error::MalformedResponse(format!("{} | body: {}", e, snippet))
    })
}

fn parse_export_listing(body: &str) -> Result<Vec<ExportJobRecord>, Error> {
    let entries: Vec<serde_json::Value> = parse_body(body)?;
    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<ExportJobRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(index, "Skipping undecodable export record: {}", e),
        }
    }
    Ok(records)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}
