//! HTTP handlers for registering documents with the document service.

use crate::AppState;
use crate::api::models::upload::{UploadForm, UploadResponse, UrlUploadRequest};
use crate::errors::{Error, ErrorDetail, Result};
use crate::storage::{ObjectStore, file_name_component, object_key};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
    },
};
use tracing::{debug, info};

/// Used when the file part carries no usable filename.
const DEFAULT_FILENAME: &str = "document";

struct StoredFile {
    filename: String,
    key: String,
    size: u64,
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "documents",
    summary = "Upload document",
    description = "Store a document in object storage and open a question-answering session for it.

The file is not inspected: any content type and size is accepted. The returned `session_id` must be sent with every chat request about this document.",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document stored and session opened", body = UploadResponse),
        (status = 422, description = "The request has no `file` part or is not multipart", body = ErrorDetail),
        (status = 500, description = "Storage or document service failure", body = ErrorDetail),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| Error::Unprocessable { message: e.body_text() })?;
    let file = store_file_part(&*state.storage, &mut multipart).await?;

    let public_url = state.storage.public_url(&file.key)?;

    let session_id = state.upstream.ingest(&public_url).await?;

    info!(session_id = %session_id, filename = %file.filename, size = file.size, "File upload successful");
    Ok(Json(UploadResponse {
        session_id,
        filename: file.filename,
    }))
}

#[utoipa::path(
    post,
    path = "/upload-url",
    tag = "documents",
    summary = "Register document by URL",
    description = "Open a question-answering session for a document that is already publicly reachable. Nothing is stored.",
    request_body = UrlUploadRequest,
    responses(
        (status = 200, description = "Session opened", body = UploadResponse),
        (status = 422, description = "Malformed request body", body = ErrorDetail),
        (status = 500, description = "Document service failure", body = ErrorDetail),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_url(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UrlUploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>> {
    let Json(request) = payload.map_err(|e| Error::Unprocessable { message: e.body_text() })?;
    let filename = request.display_name();

    let session_id = state.upstream.ingest(&request.url).await?;

    info!(session_id = %session_id, filename = %filename, url = %request.url, "URL upload successful");
    Ok(Json(UploadResponse { session_id, filename }))
}

/// Find the `file` part, skipping any other fields, and stream it into storage.
async fn store_file_part(storage: &dyn ObjectStore, multipart: &mut Multipart) -> Result<StoredFile> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::Unprocessable {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .and_then(file_name_component)
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let key = object_key(&filename);

        info!(object_key = %key, filename = %filename, "Storing uploaded document");
        let size = stream_to_storage(storage, &key, content_type.as_deref(), &mut field).await?;

        return Ok(StoredFile { filename, key, size });
    }

    Err(Error::Unprocessable {
        message: "Missing multipart field 'file'".to_string(),
    })
}

/// Copy the field into a new object chunk by chunk, aborting the object if anything fails.
async fn stream_to_storage(storage: &dyn ObjectStore, key: &str, content_type: Option<&str>, field: &mut Field<'_>) -> Result<u64> {
    let mut upload = storage.begin_upload(key, content_type).await?;
    let mut size = 0u64;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                upload.abort().await;
                return Err(Error::Unprocessable {
                    message: format!("Failed to read file chunk: {e}"),
                });
            }
        };

        size += chunk.len() as u64;
        debug!(chunk_size = chunk.len(), total_size = size, "Received chunk");

        if let Err(e) = upload.write(chunk).await {
            upload.abort().await;
            return Err(e.into());
        }
    }

    if let Err(e) = upload.finish().await {
        upload.abort().await;
        return Err(e.into());
    }

    Ok(size)
}
