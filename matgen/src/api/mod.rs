//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures, including the body extractor that resolves
//!   JSON vs. multipart requests
//!
//! The only business endpoint is `POST /api/projects/{project_id}/materials/generate`.

pub mod handlers;
pub mod models;
