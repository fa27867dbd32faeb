//! API key authentication extractor.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! The expected key comes from the `QUERYLOOM_API_KEY` environment variable.
//! When the variable is unset, authentication is disabled and every request
//! is accepted -- the default for a single-user local deployment.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated request marker. Extracting this validates the API key.
pub struct Authenticated;

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = configured_api_key() else {
            return Ok(Authenticated);
        };

        let presented = extract_api_key(parts)?;
        if presented == expected {
            Ok(Authenticated)
        } else {
            Err(AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            ))
        }
    }
}

/// The key requests must present, or `None` when auth is disabled.
fn configured_api_key() -> Option<String> {
    std::env::var("QUERYLOOM_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Extract the API key from request headers.
fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    // Try Authorization: Bearer <key>
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    // Try X-API-Key header
    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with_header(name: &str, value: &str) -> Parts {
        let request = Request::builder()
            .header(name, value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    #[test]
    fn test_bearer_header_extracted() {
        let parts = parts_with_header("authorization", "Bearer qloom_secret");
        assert_eq!(extract_api_key(&parts).unwrap(), "qloom_secret");
    }

    #[test]
    fn test_x_api_key_header_extracted() {
        let parts = parts_with_header("x-api-key", "qloom_secret");
        assert_eq!(extract_api_key(&parts).unwrap(), "qloom_secret");
    }

    #[test]
    fn test_missing_key_rejected() {
        let request = Request::builder().body(()).unwrap();
        let (parts, _) = request.into_parts();
        assert!(matches!(
            extract_api_key(&parts),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_non_bearer_authorization_rejected() {
        let parts = parts_with_header("authorization", "Basic dXNlcjpwYXNz");
        assert!(matches!(
            extract_api_key(&parts),
            Err(AppError::Unauthorized(_))
        ));
    }
}
