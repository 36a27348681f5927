//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for the `/api` surface
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - `POST /api/upload`: multipart document upload, stored in S3 and handed to the document service
//! - `POST /api/upload-url`: hand an already public document URL to the document service
//! - `POST /api/chat`: ask a question about a previously uploaded document
//!
//! All failures answer with `{"detail": "..."}`. OpenAPI documentation is served at `/docs`.

pub mod handlers;
pub mod models;
