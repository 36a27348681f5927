use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Returned once a document has been handed to the document service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Opaque identifier to send with every chat request about this document
    pub session_id: String,
    /// Name the document was uploaded under
    pub filename: String,
}

/// Multipart body of `POST /api/upload`. Documentation only; the handler streams the `file` part
/// into storage chunk by chunk.
#[derive(ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Register a document that is already publicly reachable.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UrlUploadRequest {
    #[schema(value_type = String, example = "https://example.com/handbook.pdf")]
    pub url: Url,
    /// Display name. Derived from the URL when absent or blank.
    #[serde(default)]
    pub title: Option<String>,
}

impl UrlUploadRequest {
    /// The name reported back to the caller for this document.
    pub fn display_name(&self) -> String {
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_string();
        }

        let last_segment = self
            .url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(str::to_string);

        last_segment
            .or_else(|| self.url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.to_string())
    }
}
