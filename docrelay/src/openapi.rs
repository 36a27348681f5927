//! OpenAPI documentation for the `/api` surface.
//!
//! The generated document is served at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::{Server, ServerBuilder},
};

use crate::api;
use crate::errors::ErrorDetail;

/// Handlers document paths relative to `/api`; this adds the prefix back.
struct ApiPrefix;

impl Modify for ApiPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let server: Server = ServerBuilder::new().url("/api").build();
        openapi.servers = Some(vec![server]);
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "docrelay",
        description = "Upload documents and ask questions about them through a remote document question-answering service."
    ),
    paths(
        api::handlers::upload::upload_document,
        api::handlers::upload::upload_url,
        api::handlers::chat::chat,
    ),
    components(schemas(
        api::models::upload::UploadResponse,
        api::models::upload::UrlUploadRequest,
        api::models::chat::ChatRequest,
        ErrorDetail,
    )),
    modifiers(&ApiPrefix),
    tags(
        (name = "documents", description = "Register documents with the document service"),
        (name = "chat", description = "Ask questions about a registered document"),
    )
)]
pub struct ApiDoc;
