//! Vendor relay: authentication injection and stream re-framing.
//!
//! Accepts the formatted vendor request either flat (`{...request, apiKey}`)
//! or wrapped (`{"formattedRequest": {...}, "apiKey": ...}`). The key is
//! stripped before anything is forwarded upstream; it goes into the vendor's
//! auth header instead.

use super::{error_response, AppState};
use crate::provider::streaming::is_done_sentinel;
use crate::provider::{ProviderId, SseDecoder};
use crate::sse::{SseConnection, SSE_HEADERS};
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::UnboundedReceiverStream;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) async fn handle_chat(state: AppState, provider: ProviderId, body: Bytes) -> Response {
    let mut envelope: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid JSON: {e}")),
    };

    let descriptor = match state.registry.descriptor(provider) {
        Ok(descriptor) => descriptor,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e.to_string()),
    };

    // Key from the request body wins; config/env key is the fallback.
    let body_key = envelope
        .get("apiKey")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut payload = match envelope.get_mut("formattedRequest") {
        Some(inner) => inner.take(),
        None => envelope,
    };
    if let Some(object) = payload.as_object_mut() {
        object.remove("apiKey");
    }

    let Some(api_key) = body_key.or_else(|| descriptor.key.clone()) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            format!("no API key configured for {provider}"),
        );
    };

    let streaming = payload
        .get("stream")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let upstream = state.client.post(&descriptor.upstream_url);
    let upstream = match provider {
        ProviderId::OpenAi => upstream.bearer_auth(&api_key),
        ProviderId::Anthropic => upstream
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION),
    };
    let upstream = upstream.json(&payload);

    if streaming {
        stream_response(state, provider, upstream).await
    } else {
        forward_response(upstream.timeout(state.timeouts.request())).await
    }
}

/// Forward a non-streamed completion, passing the vendor's status and JSON
/// body through unchanged.
async fn forward_response(upstream: reqwest::RequestBuilder) -> Response {
    let response = match upstream.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "upstream request failed");
            return error_response(StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    match response.json::<serde_json::Value>().await {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

/// Open a managed SSE connection and re-frame the vendor byte stream onto it
/// from a background task.
async fn stream_response(
    state: AppState,
    provider: ProviderId,
    upstream: reqwest::RequestBuilder,
) -> Response {
    let (connection, rx) = SseConnection::new(state.timeouts.heartbeat());
    let request_timeout = state.timeouts.request();
    let ceiling = state.timeouts.completion_ceiling();

    let conn = connection.clone();
    tokio::spawn(async move {
        let work = async {
            // The request timeout bounds only the wait for the vendor's
            // response headers; the streamed body is bounded by the ceiling.
            let sent = match tokio::time::timeout(request_timeout, upstream.send()).await {
                Ok(sent) => sent,
                Err(_) => {
                    tracing::warn!(provider = %provider, "vendor request timed out");
                    conn.send_event("error", &json!({"error": "vendor request timed out"}));
                    return;
                }
            };
            match sent {
                Ok(response) if response.status().is_success() => {
                    pump_vendor_stream(&conn, response.bytes_stream()).await;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let detail = response.text().await.unwrap_or_default();
                    tracing::warn!(provider = %provider, status, "vendor rejected request");
                    conn.send_event(
                        "error",
                        &json!({"error": format!("vendor returned status {status}: {detail}")}),
                    );
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "vendor request failed");
                    conn.send_event("error", &json!({"error": e.to_string()}));
                }
            }
        };

        if tokio::time::timeout(ceiling, work).await.is_err() {
            conn.send_event("error", &json!({"error": "completion timed out"}));
        }
        conn.end();
    });

    sse_response(rx)
}

/// Decode vendor SSE bytes and forward each JSON payload as a `message` event.
///
/// Malformed payloads are skipped; the vendor's own `[DONE]` terminator (bare
/// or JSON-quoted) stops the pump without being forwarded, since the managed
/// connection emits its own `done` event.
pub async fn pump_vendor_stream<S, E>(connection: &SseConnection, mut stream: S)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "vendor stream failed mid-flight");
                connection.send_event("error", &json!({"error": e.to_string()}));
                return;
            }
        };

        for frame in decoder.push(&bytes) {
            if frame.is_comment() {
                continue;
            }
            for data in frame.data_lines() {
                if is_done_sentinel(data) {
                    return;
                }
                match serde_json::from_str::<serde_json::Value>(data) {
                    Ok(value) => connection.send_event("message", &value),
                    Err(_) => {
                        tracing::debug!("skipping malformed vendor frame");
                    }
                }
            }
        }
    }
}

/// Wrap the connection's frame channel in an SSE response with the required
/// headers.
pub(crate) fn sse_response(rx: tokio::sync::mpsc::UnboundedReceiver<Bytes>) -> Response {
    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    let mut response = Response::new(Body::from_stream(stream));
    for (name, value) in SSE_HEADERS {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn byte_stream(
        chunks: Vec<Result<Bytes, std::io::Error>>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(chunks)
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Bytes>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(bytes) = rx.try_recv() {
            frames.push(String::from_utf8(bytes.to_vec()).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn test_reframes_vendor_events_with_ids() {
        let (conn, mut rx) = SseConnection::new(Duration::from_secs(60));
        let stream = byte_stream(vec![
            Ok(Bytes::from("data: {\"a\":1}\n\ndata: {\"b\":2}\n\n")),
            Ok(Bytes::from("data: [DONE]\n\n")),
        ]);

        pump_vendor_stream(&conn, stream).await;
        conn.end();

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], "id: 1\nevent: message\ndata: {\"a\":1}\n\n");
        assert_eq!(frames[1], "id: 2\nevent: message\ndata: {\"b\":2}\n\n");
        assert_eq!(frames[2], "id: 3\nevent: done\ndata: \"[DONE]\"\n\n");
    }

    #[tokio::test]
    async fn test_done_sentinel_stops_pump_mid_chunk() {
        let (conn, mut rx) = SseConnection::new(Duration::from_secs(60));
        let stream = byte_stream(vec![Ok(Bytes::from(
            "data: {\"a\":1}\n\ndata: [DONE]\n\ndata: {\"b\":2}\n\n",
        ))]);

        pump_vendor_stream(&conn, stream).await;

        let frames = drain(&mut rx);
        // The frame after [DONE] must not be forwarded.
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_malformed_vendor_frame_is_skipped() {
        let (conn, mut rx) = SseConnection::new(Duration::from_secs(60));
        let stream = byte_stream(vec![Ok(Bytes::from(
            "data: {broken\n\ndata: {\"ok\":true}\n\n",
        ))]);

        pump_vendor_stream(&conn, stream).await;

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("{\"ok\":true}"));
    }

    #[tokio::test]
    async fn test_vendor_comments_are_not_forwarded() {
        let (conn, mut rx) = SseConnection::new(Duration::from_secs(60));
        let stream = byte_stream(vec![Ok(Bytes::from(
            ": keep-alive\n\ndata: {\"x\":1}\n\n",
        ))]);

        pump_vendor_stream(&conn, stream).await;

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with("id: 1\nevent: message\n"));
    }

    #[tokio::test]
    async fn test_stream_error_becomes_error_event() {
        let (conn, mut rx) = SseConnection::new(Duration::from_secs(60));
        let stream = byte_stream(vec![
            Ok(Bytes::from("data: {\"a\":1}\n\n")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        ]);

        pump_vendor_stream(&conn, stream).await;
        conn.end();

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 3);
        assert!(frames[1].contains("event: error"));
        assert!(frames[1].contains("connection reset"));
        assert!(frames[2].contains("event: done"));
    }

    #[tokio::test]
    async fn test_quoted_done_sentinel_also_stops_pump() {
        let (conn, mut rx) = SseConnection::new(Duration::from_secs(60));
        let stream = byte_stream(vec![Ok(Bytes::from("data: \"[DONE]\"\n\n"))]);

        pump_vendor_stream(&conn, stream).await;

        assert!(drain(&mut rx).is_empty());
    }
}
