//! End-to-end streaming pipeline tests: server-side framing consumed by the
//! client-side stream handler, without sockets.

use axum::body::Body;
use axum::http::Request;
use bytes::Bytes;
use http_body_util::BodyExt;
use openchat::config::Config;
use openchat::provider::{ChatStreamHandler, ProviderId, StreamOutcome};
use openchat::server::{app_router, pump_vendor_stream, AppState};
use openchat::sse::SseConnection;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn mock_body(query: &str) -> Bytes {
    let app = app_router(AppState::from_config(&Config::default()));
    let response = app
        .oneshot(
            Request::get(format!("/api/chat/mock?{query}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    response.into_body().collect().await.unwrap().to_bytes()
}

#[tokio::test]
async fn mock_stream_to_client_content_in_order() {
    let body = mock_body("messages=5&delay=0").await;

    let handler = ChatStreamHandler::new(ProviderId::Anthropic, CancellationToken::new());
    let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(body)]);

    let mut content = String::new();
    let outcome = handler
        .process_stream(stream, |delta| content.push_str(delta))
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(content, "This is a mock streaming ");
}

#[tokio::test]
async fn mock_stream_openai_shape_round_trips() {
    let body = mock_body("messages=3&delay=0&provider=openai").await;

    let handler = ChatStreamHandler::new(ProviderId::OpenAi, CancellationToken::new());
    let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(body)]);

    let mut content = String::new();
    let outcome = handler
        .process_stream(stream, |delta| content.push_str(delta))
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(content, "This is a ");
}

#[tokio::test]
async fn relay_reframed_stream_is_consumable_by_client() {
    // Vendor bytes, as Anthropic would stream them.
    let vendor = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello \"}}\n\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"world\"}}\n\n\
data: {\"type\":\"message_stop\"}\n\n";

    // Server side: re-frame onto a managed connection.
    let (connection, mut rx) = SseConnection::new(Duration::from_secs(60));
    let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(vendor))]);
    pump_vendor_stream(&connection, stream).await;
    connection.end();

    // Collect the framed bytes the HTTP layer would send.
    let mut wire = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        wire.extend_from_slice(&frame);
    }
    let wire = String::from_utf8(wire).unwrap();
    assert!(wire.starts_with("id: 1\nevent: message\n"));
    assert!(wire.ends_with("event: done\ndata: \"[DONE]\"\n\n"));

    // Client side: consume the framed stream, splitting on an awkward byte
    // boundary to exercise buffering.
    let bytes = wire.into_bytes();
    let mid = bytes.len() / 2;
    let chunks = vec![
        Ok::<_, std::io::Error>(Bytes::copy_from_slice(&bytes[..mid])),
        Ok(Bytes::copy_from_slice(&bytes[mid..])),
    ];

    let handler = ChatStreamHandler::new(ProviderId::Anthropic, CancellationToken::new());
    let mut content = String::new();
    let outcome = handler
        .process_stream(futures::stream::iter(chunks), |delta| {
            content.push_str(delta)
        })
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(content, "Hello world");
}

#[tokio::test]
async fn cancellation_stops_delivery_between_chunks() {
    let cancel = CancellationToken::new();
    let handler = ChatStreamHandler::new(ProviderId::Anthropic, cancel.clone());

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Bytes, std::io::Error>>();
    let stream = tokio_stream::wrappers::UnboundedReceiverStream::new(rx);

    tx.send(Ok(Bytes::from(
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"partial\"}}\n\n",
    )))
    .unwrap();

    let consumer = tokio::spawn(async move {
        let mut content = String::new();
        let outcome = handler
            .process_stream(stream, |delta| content.push_str(delta))
            .await
            .unwrap();
        (content, outcome)
    });

    // Give the consumer a moment to drain the first chunk, then abort.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let (content, outcome) = consumer.await.unwrap();
    assert_eq!(outcome, StreamOutcome::Aborted);
    assert_eq!(content, "partial");

    // Later sends are never observed; the channel is simply dropped.
    let _ = tx.send(Ok(Bytes::from(
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"late\"}}\n\n",
    )));
}
