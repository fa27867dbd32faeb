//! Envelope format shared by every API response.
//!
//! Success and failure travel in the same shape, so clients parse one thing:
//! ```json
//! {
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 },
//!   "_links": { "self": "..." }
//! }
//! ```
//! with `data` swapped for a non-empty `errors` list on failure. Empty
//! sections are omitted entirely.
//!
//! The HTTP status rides on the envelope itself (not serialized), so handlers
//! return an [`ApiResponse`] directly and the error type funnels through the
//! same builder.

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

/// Envelope wrapping every API payload.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Status sent with the response; never part of the body.
    #[serde(skip)]
    status: StatusCode,

    /// The payload; absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Request metadata.
    pub meta: ApiMeta,

    /// Failure details; empty on success.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,

    /// Related endpoints, keyed by relation name.
    #[serde(rename = "_links", skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, String>,
}

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ApiMeta {
    /// Unique request identifier for tracing.
    pub request_id: String,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
    /// Response time in milliseconds.
    pub response_time_ms: u64,
}

/// Individual error detail.
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    /// A 200 envelope carrying `data`.
    pub fn success(data: T, request_id: String, response_time_ms: u64) -> Self {
        Self {
            status: StatusCode::OK,
            data: Some(data),
            meta: ApiMeta {
                request_id,
                timestamp: Utc::now().to_rfc3339(),
                response_time_ms,
            },
            errors: Vec::new(),
            links: HashMap::new(),
        }
    }

    /// Add a link for discoverability.
    pub fn with_link(mut self, rel: &str, href: &str) -> Self {
        self.links.insert(rel.to_string(), href.to_string());
        self
    }
}

impl ApiResponse<()> {
    /// A failure envelope with no payload.
    pub fn failure(
        status: StatusCode,
        code: &str,
        message: impl Into<String>,
        request_id: String,
    ) -> Self {
        Self {
            status,
            data: None,
            meta: ApiMeta {
                request_id,
                timestamp: Utc::now().to_rfc3339(),
                response_time_ms: 0,
            },
            errors: vec![ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            }],
            links: HashMap::new(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });

        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let resp = ApiResponse::success(
            serde_json::json!({"answer": 42}),
            "req-1".to_string(),
            7,
        )
        .with_link("self", "/api/v1/threads/abc");

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"data\":{\"answer\":42}"));
        assert!(json.contains("\"request_id\":\"req-1\""));
        assert!(json.contains("\"response_time_ms\":7"));
        assert!(json.contains("\"_links\":{\"self\":\"/api/v1/threads/abc\"}"));
        // Empty error list is omitted entirely.
        assert!(!json.contains("errors"));
        // The status is wire-level only.
        assert!(!json.contains("status"));
    }

    #[test]
    fn test_failure_envelope_carries_code_and_message() {
        let resp = ApiResponse::failure(
            StatusCode::NOT_FOUND,
            "THREAD_NOT_FOUND",
            "unknown thread 'abc'",
            "req-2".to_string(),
        );

        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"code\":\"THREAD_NOT_FOUND\""));
        assert!(json.contains("unknown thread 'abc'"));
        assert!(!json.contains("\"data\""));
    }

    #[tokio::test]
    async fn test_into_response_uses_envelope_status() {
        let ok = ApiResponse::success("fine", "req-3".to_string(), 1).into_response();
        assert_eq!(ok.status(), StatusCode::OK);

        let bad = ApiResponse::failure(
            StatusCode::CONFLICT,
            "THREAD_CONFLICT",
            "busy",
            "req-4".to_string(),
        )
        .into_response();
        assert_eq!(bad.status(), StatusCode::CONFLICT);
        let content_type = bad.headers().get(axum::http::header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, "application/json");
    }
}
