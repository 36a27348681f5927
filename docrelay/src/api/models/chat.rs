use crate::upstream::ChatPayload;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single question about an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Identifier returned by the upload endpoints
    pub session_id: String,
    #[schema(example = "What is the deadline?")]
    pub message: String,
}

impl From<ChatRequest> for ChatPayload {
    fn from(request: ChatRequest) -> Self {
        ChatPayload::single(request.session_id, request.message)
    }
}
