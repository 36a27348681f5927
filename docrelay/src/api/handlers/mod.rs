//! HTTP request handlers for the `/api` surface.
//!
//! - [`upload`]: document uploads (multipart and by URL)
//! - [`chat`]: questions about an uploaded document
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Result`], which renders every failure as
//! `{"detail": "..."}`. Request-shape problems are `422`; everything else is `500`.

pub mod chat;
pub mod upload;
