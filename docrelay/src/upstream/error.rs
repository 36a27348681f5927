use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the document service
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("{endpoint} responded with {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned an invalid response: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("Document service did not return a session_id")]
    MissingSessionId,
}
