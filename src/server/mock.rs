//! Mock streaming endpoint for local development.
//!
//! Streams a canned completion word by word in either vendor's wire shape so
//! the client pipeline can be exercised without credentials or network access.
//! Frames are raw `data:` frames (no event ids), terminated by the bare
//! `data: [DONE]` sentinel, matching what the OpenAI-compatible relay path
//! produces.

use super::AppState;
use crate::server::relay::sse_response;
use crate::sse::SseConnection;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

const MOCK_TEXT: &str = "This is a mock streaming response used for local \
development. It arrives one word at a time so the client can exercise \
incremental rendering, cancellation and completion handling without \
talking to a real model provider.";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MockParams {
    /// Delay between chunks in milliseconds
    pub delay: u64,
    /// Number of content chunks to emit
    pub messages: usize,
    /// Vendor wire shape to imitate
    pub provider: String,
}

impl Default for MockParams {
    fn default() -> Self {
        Self {
            delay: 200,
            messages: 50,
            provider: "anthropic".to_string(),
        }
    }
}

pub(crate) async fn mock_chat(
    State(_state): State<AppState>,
    Query(params): Query<MockParams>,
) -> Response {
    let (connection, rx) = SseConnection::new(KEEP_ALIVE_INTERVAL);

    tokio::spawn(async move {
        let words: Vec<&str> = MOCK_TEXT.split_whitespace().collect();
        let openai_shape = params.provider == "openai";

        for i in 0..params.messages {
            if connection.is_closed() {
                return;
            }

            let word = format!("{} ", words[i % words.len()]);
            let chunk = if openai_shape {
                json!({"choices": [{"delta": {"content": word}}]})
            } else {
                json!({
                    "type": "content_block_delta",
                    "index": 0,
                    "delta": {"type": "text_delta", "text": word},
                })
            };
            connection.send_data(&chunk.to_string());

            if params.delay > 0 {
                tokio::time::sleep(Duration::from_millis(params.delay)).await;
            }
        }

        connection.send_data("[DONE]");
        connection.handle_disconnect();
    });

    sse_response(rx)
}
