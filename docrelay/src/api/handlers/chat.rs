//! HTTP handler relaying questions to the document service.

use crate::AppState;
use crate::api::models::chat::ChatRequest;
use crate::errors::{Error, ErrorDetail, Result};
use crate::upstream::ChatPayload;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tracing::info;

#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    summary = "Ask about a document",
    description = "Forward a question to the document service for the given session.

The document service's JSON response is returned exactly as received; its fields are not interpreted here. No conversation history is kept by this service.",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The document service's response, unmodified", content_type = "application/json"),
        (status = 422, description = "Malformed request body", body = ErrorDetail),
        (status = 500, description = "Document service failure", body = ErrorDetail),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn chat(State(state): State<AppState>, payload: std::result::Result<Json<ChatRequest>, JsonRejection>) -> Result<Response> {
    let Json(request) = payload.map_err(|e| Error::Unprocessable { message: e.body_text() })?;

    let payload = ChatPayload::from(request);
    let body = state.upstream.chat(&payload).await?;

    info!(session_id = %payload.session_id, "Chat response received");
    Ok(([(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))], body).into_response())
}
