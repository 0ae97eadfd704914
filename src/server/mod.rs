//! HTTP relay server.
//!
//! Exposes one chat endpoint per provider plus a mock endpoint for local
//! development. Chat endpoints forward the pre-formatted vendor request to the
//! vendor API, injecting authentication server-side so keys never reach the
//! browser. Streamed vendor responses are re-framed onto a managed SSE
//! connection with event ids and heartbeats.

mod mock;
mod relay;

pub use relay::pump_vendor_stream;

use crate::config::{Config, TimeoutConfig};
use crate::provider::{ProviderId, ProviderRegistry};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared server state, built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub timeouts: TimeoutConfig,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            registry: Arc::new(ProviderRegistry::from_config(config)),
            timeouts: config.timeouts,
            client: reqwest::Client::new(),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat/openai", post(chat_openai))
        .route("/api/chat/anthropic", post(chat_anthropic))
        .route("/api/chat/mock", get(mock::mock_chat).post(mock::mock_chat))
        .route("/api/providers", get(list_providers))
        .route("/health", get(health))
        // Formatted requests carry whole conversations; the default body cap
        // would reject long ones before they reach the vendor.
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<_> = state
        .registry
        .descriptors()
        .iter()
        .map(|p| {
            json!({
                "id": p.id.as_str(),
                "name": p.name,
                "defaultModel": p.default_model,
                "models": p.models.iter().map(|m| &m.id).collect::<Vec<_>>(),
            })
        })
        .collect();
    Json(json!({"providers": providers}))
}

async fn chat_openai(State(state): State<AppState>, body: Bytes) -> Response {
    relay::handle_chat(state, ProviderId::OpenAi, body).await
}

async fn chat_anthropic(State(state): State<AppState>, body: Bytes) -> Response {
    relay::handle_chat(state, ProviderId::Anthropic, body).await
}

/// Uniform error body for relay failures.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::from_config(&Config::default())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_providers() {
        let app = app_router(test_state());
        let response = app
            .oneshot(Request::get("/api/providers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let ids: Vec<&str> = value["providers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&"openai"));
        assert!(ids.contains(&"anthropic"));
    }

    #[tokio::test]
    async fn test_unknown_chat_route_is_404() {
        let app = app_router(test_state());
        let response = app
            .oneshot(
                Request::post("/api/chat/mistral")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_rejects_invalid_json() {
        let app = app_router(test_state());
        let response = app
            .oneshot(
                Request::post("/api/chat/openai")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_large_body_reaches_handler() {
        // Without the body-limit override a multi-MiB conversation would be
        // rejected with 413 before the handler ever saw it.
        std::env::remove_var("OPENAI_API_KEY");
        let app = app_router(test_state());
        let padding = "x".repeat(3 * 1024 * 1024);
        let body = format!(r#"{{"model": "gpt-4o", "messages": [], "note": "{padding}"}}"#);
        let response = app
            .oneshot(Request::post("/api/chat/openai").body(Body::from(body)).unwrap())
            .await
            .unwrap();
        // The handler parsed the body and got as far as the key check.
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_streaming_request_timeout_emits_error_then_done() {
        use crate::config::ProviderSettings;

        // A vendor that accepts the connection but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            drop(socket);
        });

        let mut config = Config::default();
        config.provider.insert(
            "openai".to_string(),
            ProviderSettings {
                api_key: Some("sk-test".to_string()),
                base_url: Some(format!("http://{addr}")),
            },
        );
        config.timeouts.request_ms = 100;

        let app = app_router(AppState::from_config(&config));
        let response = app
            .oneshot(
                Request::post("/api/chat/openai")
                    .body(Body::from(r#"{"model": "gpt-4o", "stream": true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("event: error"));
        assert!(text.contains("timed out"));
        assert!(text.ends_with("event: done\ndata: \"[DONE]\"\n\n"));
    }

    #[tokio::test]
    async fn test_chat_requires_api_key() {
        // Default config carries no keys; env vars may, so scrub first.
        std::env::remove_var("OPENAI_API_KEY");
        let app = app_router(test_state());
        let response = app
            .oneshot(
                Request::post("/api/chat/openai")
                    .body(Body::from(r#"{"model": "gpt-4o", "messages": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
