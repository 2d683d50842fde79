//! HTTP basic auth in front of `/api`.
//!
//! When no credentials are configured the middleware passes everything
//! through.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::config::BasicCredentials;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_basic_auth(
    Extension(state): Extension<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.auth.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(decode_basic);

    match provided {
        Some(credentials) if credentials_match(&credentials, expected) => Ok(next.run(request).await),
        Some(credentials) => {
            debug!("Rejected basic auth for user {}", credentials.username);
            Err(ApiError::Unauthorized)
        }
        None => Err(ApiError::Unauthorized),
    }
}

/// Compare both fields in constant time, without short-circuiting on the
/// username.
pub fn credentials_match(provided: &BasicCredentials, expected: &BasicCredentials) -> bool {
    let username = provided.username.as_bytes().ct_eq(expected.username.as_bytes());
    let password = provided.password.as_bytes().ct_eq(expected.password.as_bytes());
    bool::from(username & password)
}

/// Decode an `Authorization: Basic <base64(user:password)>` header value.
pub fn decode_basic(header: &str) -> Option<BasicCredentials> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}
