//! REST surface for driving threads remotely.
//!
//! Axum routes under `/api/v1/` with enveloped responses, optional API key
//! authentication, and permissive CORS.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
