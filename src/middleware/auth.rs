//! Static bearer-token gate.
//!
//! When a token is configured, every request must carry
//! `Authorization: Bearer <token>`. A mismatch answers
//! 511 Network Authentication Required with an empty body, the HTTP-level
//! stand-in for dropping the connection.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Middleware entry point; the expected token arrives as state.
pub async fn require_bearer(State(token): State<String>, request: Request, next: Next) -> Response {
    let expected = format!("Bearer {token}");
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected);

    if !authorized {
        warn!(path = %request.uri().path(), "rejected unauthenticated request");
        return StatusCode::NETWORK_AUTHENTICATION_REQUIRED.into_response();
    }

    next.run(request).await
}
