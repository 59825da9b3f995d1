//! Error types for the API client.

/// Errors that can occur when talking to the export API.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The API answered with a non-success status. Authentication failures,
    /// rate limiting and server errors all land here; the API gives no
    /// reliable way to tell them apart.
    #[error("Request rejected with status {status}")]
    RemoteRejected { status: u16, body: String },
    /// A success response whose body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// The request never produced a response (connect, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Export window where `time_from` is not strictly before `time_to`.
    #[error("Invalid export window: {time_from} is not before {time_to}")]
    InvalidWindow { time_from: String, time_to: String },
    /// A timestamp string that could not be parsed.
    #[error("Invalid timestamp '{0}'. Expected format: YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTimestamp(String),
}

impl Error {
    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
