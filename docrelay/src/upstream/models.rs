//! Wire formats of the document service.

use serde::{Deserialize, Serialize};

/// Body sent to the ingestion endpoint.
#[derive(Debug, Serialize)]
pub struct IngestRequest<'a> {
    pub document_url: &'a str,
}

/// The part of the ingestion response we rely on. Other fields are ignored.
#[derive(Debug, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub session_id: String,
    pub questions: Vec<String>,
}

impl ChatPayload {
    /// Wrap a single message the way the chat endpoint expects it.
    pub fn single(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            questions: vec![message.into()],
        }
    }
}
