//! Client for the remote document question-answering service.
//!
//! Two calls are made, both `POST` with a bearer token and a fixed 60 second timeout:
//!
//! - the ingestion endpoint receives `{"document_url": ...}` and mints a session identifier
//! - the chat endpoint receives `{"session_id": ..., "questions": [...]}` and answers
//!
//! Failures are logged here and returned once. Nothing is retried; callers retry the whole
//! operation if they want to.

mod error;
pub mod models;

pub use error::UpstreamError;
pub use models::ChatPayload;

use crate::config::UpstreamConfig;
use anyhow::Context;
use bytes::Bytes;
use models::{IngestRequest, IngestResponse};
use reqwest::Client;
use serde::{Serialize, de::IgnoredAny};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

/// Upper bound on each outbound call, body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct DocumentServiceClient {
    client: Client,
    ingestion_url: Url,
    chat_url: Url,
    api_token: String,
    timeout: Duration,
}

impl DocumentServiceClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    pub(crate) fn with_timeout(config: &UpstreamConfig, timeout: Duration) -> anyhow::Result<Self> {
        let ingestion_url = config.ingestion_url.clone().context("upstream.ingestion_url is not configured")?;
        let chat_url = config.chat_url.clone().context("upstream.chat_url is not configured")?;
        let api_token = config.api_token.clone().context("upstream.api_token is not configured")?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            ingestion_url,
            chat_url,
            api_token,
            timeout,
        })
    }

    /// Hand a document URL to the ingestion endpoint and return the session it opened.
    #[instrument(skip(self), fields(endpoint = %self.ingestion_url))]
    pub async fn ingest(&self, document_url: &Url) -> Result<String, UpstreamError> {
        let request = IngestRequest {
            document_url: document_url.as_str(),
        };
        let body = self.post_json(&self.ingestion_url, &request).await?;

        let parsed: IngestResponse = serde_json::from_slice(&body).map_err(|e| {
            error!(error = %e, body = %String::from_utf8_lossy(&body), "Failed to parse ingestion response");
            UpstreamError::InvalidResponse {
                endpoint: self.ingestion_url.to_string(),
                message: e.to_string(),
            }
        })?;

        match parsed.session_id {
            Some(session_id) if !session_id.is_empty() => Ok(session_id),
            _ => {
                error!("Document service did not return a session_id");
                Err(UpstreamError::MissingSessionId)
            }
        }
    }

    /// Send questions for a session and return the response body exactly as received.
    ///
    /// The body is checked to be JSON but not otherwise interpreted.
    #[instrument(skip(self, payload), fields(endpoint = %self.chat_url, session_id = %payload.session_id))]
    pub async fn chat(&self, payload: &ChatPayload) -> Result<Bytes, UpstreamError> {
        let body = self.post_json(&self.chat_url, payload).await?;

        if let Err(e) = serde_json::from_slice::<IgnoredAny>(&body) {
            error!(error = %e, body = %String::from_utf8_lossy(&body), "Chat response is not valid JSON");
            return Err(UpstreamError::InvalidResponse {
                endpoint: self.chat_url.to_string(),
                message: e.to_string(),
            });
        }

        debug!("Chat response body: {}", String::from_utf8_lossy(&body));
        Ok(body)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, endpoint: &Url, body: &T) -> Result<Bytes, UpstreamError> {
        let response = self
            .client
            .post(endpoint.clone())
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_failed(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Document service returned an error status");
            return Err(UpstreamError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        response.bytes().await.map_err(|e| self.request_failed(endpoint, e))
    }

    fn request_failed(&self, endpoint: &Url, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            error!(timeout = ?self.timeout, "Request to document service timed out");
            UpstreamError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            error!(error = %e, "Request to document service failed");
            UpstreamError::Transport {
                endpoint: endpoint.to_string(),
                source: e,
            }
        }
    }
}
