//! API request and response data models.
//!
//! These types define the public contract of the `/api` surface. The document service's own wire
//! formats live in [`crate::upstream::models`].

pub mod chat;
pub mod upload;
