//! HTTP surface: route construction and handlers.
//!
//! The chat endpoint answers on `/` and on any path containing
//! `chat/completions`, so OpenAI-style clients can point their base URL at
//! the proxy unchanged. Everything except `/ping` sits behind the optional
//! bearer gate.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use hydra_llm::{Dispatcher, Error};

use crate::middleware::auth;

/// Build the application router.
pub fn routes(dispatcher: Arc<Dispatcher>, auth_token: Option<String>) -> Router {
    let mut app = Router::new()
        .route("/", any(chat))
        .route("/image", post(image))
        .route("/models", get(models))
        .fallback(fallback)
        .layer(Extension(dispatcher));

    if let Some(token) = auth_token {
        app = app.layer(axum::middleware::from_fn_with_state(token, auth::require_bearer));
    }

    // The liveness probe stays outside the auth gate.
    app.route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
}

async fn ping() -> &'static str {
    "OK"
}

async fn chat(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    method: Method,
    body: Bytes,
) -> Response {
    handle_chat(&dispatcher, method, body).await
}

/// Catch-all: serve chat completions on any path that mentions them,
/// 404 otherwise.
async fn fallback(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if uri.path().contains("chat/completions") {
        return handle_chat(&dispatcher, method, body).await;
    }
    StatusCode::NOT_FOUND.into_response()
}

async fn handle_chat(dispatcher: &Dispatcher, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return (StatusCode::SERVICE_UNAVAILABLE, "only POST is supported").into_response();
    }
    match dispatcher.chat(&body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            let status = match &error {
                Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                Error::NoEligibleModel => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, error.to_string()).into_response()
        }
    }
}

async fn image(Extension(dispatcher): Extension<Arc<Dispatcher>>, body: Bytes) -> Response {
    match dispatcher.image(&body).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(error) => {
            let status = match &error {
                Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, error.to_string()).into_response()
        }
    }
}

/// Model listing: every catalog entry plus the two size-class sentinels.
async fn models(Extension(dispatcher): Extension<Arc<Dispatcher>>) -> Json<serde_json::Value> {
    let mut data: Vec<serde_json::Value> = dispatcher
        .catalog()
        .iter()
        .map(|m| json!({"id": m.name}))
        .collect();
    data.push(json!({"id": "SMALL"}));
    data.push(json!({"id": "BIG"}));
    Json(json!({"object": "list", "data": data}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_config() -> hydra_llm::Config {
        hydra_llm::config::from_yaml(
            r#"
models:
  - name: mock/test-model-one
    provider: mock
    priority: 1
    requests_per_minute: 10
    requests_per_hour: 100
    requests_per_day: 1000
    url: http://127.0.0.1:9/unreachable
    max_request_length: 4096
"#,
        )
        .unwrap()
    }

    fn test_router(auth_token: Option<String>) -> Router {
        routes(Arc::new(Dispatcher::new(test_config()).unwrap()), auth_token)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_ping() {
        let response = test_router(None)
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }

    #[tokio::test]
    async fn test_models_listing_includes_sentinels() {
        let response = test_router(None)
            .oneshot(Request::get("/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let value: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["object"], "list");
        let ids: Vec<&str> = value["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["mock/test-model-one", "SMALL", "BIG"]);
    }

    #[tokio::test]
    async fn test_get_on_chat_endpoint_is_rejected() {
        let response = test_router(None)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_bad_json_is_bad_request() {
        let response = test_router(None)
            .oneshot(Request::post("/").body(Body::from("{nope")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_completions_path_is_routed() {
        // Oversized body relative to max_request_length: the selector comes
        // up empty and the route answers 503.
        let huge = "x".repeat(5000);
        let body = serde_json::json!({
            "model": "SMALL",
            "messages": [{"role": "user", "content": huge}],
        });
        let response = test_router(None)
            .oneshot(
                Request::post("/v1/chat/completions")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_bytes(response).await,
            b"No available models for this request length"
        );
    }

    #[tokio::test]
    async fn test_unrelated_path_is_not_found() {
        let response = test_router(None)
            .oneshot(Request::post("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_image_requires_prompt() {
        let response = test_router(None)
            .oneshot(Request::post("/image").body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_auth_gate_rejects_without_token() {
        let response = test_router(Some("sekrit".to_string()))
            .oneshot(Request::get("/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::NETWORK_AUTHENTICATION_REQUIRED
        );
    }

    #[tokio::test]
    async fn test_auth_gate_accepts_bearer() {
        let response = test_router(Some("sekrit".to_string()))
            .oneshot(
                Request::get("/models")
                    .header("Authorization", "Bearer sekrit")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ping_bypasses_auth_gate() {
        let response = test_router(Some("sekrit".to_string()))
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
