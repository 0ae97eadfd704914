//! Server-side SSE connection.
//!
//! Owns one server-to-client event stream: header set, monotonic event ids,
//! byte-exact frame encoding, periodic heartbeat comments, and an idempotent
//! termination path. The connection goes `OPEN -> CLOSED` exactly once;
//! every write after close is a no-op.
//!
//! Frames are written into an unbounded channel; the HTTP layer turns the
//! receiving half into the response body. Client disconnects show up as send
//! failures (the receiver is gone) and trigger the same teardown as `end()`.

use bytes::Bytes;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(15_000);

/// Response headers every SSE stream carries.
pub const SSE_HEADERS: [(&str, &str); 4] = [
    ("content-type", "text/event-stream"),
    ("cache-control", "no-cache"),
    ("connection", "keep-alive"),
    ("x-accel-buffering", "no"),
];

struct Inner {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    last_event_id: u64,
    closed: bool,
    last_write: Instant,
}

/// One open SSE stream towards a client.
pub struct SseConnection {
    inner: Mutex<Inner>,
    heartbeat: CancellationToken,
}

impl SseConnection {
    /// Open a connection and start its heartbeat timer. The returned receiver
    /// yields the raw frames to be written to the transport.
    pub fn new(heartbeat_interval: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            inner: Mutex::new(Inner {
                tx: Some(tx),
                last_event_id: 0,
                closed: false,
                last_write: Instant::now(),
            }),
            heartbeat: CancellationToken::new(),
        });

        Self::spawn_heartbeat(Arc::clone(&connection), heartbeat_interval);
        (connection, rx)
    }

    fn spawn_heartbeat(connection: Arc<Self>, interval: Duration) {
        let cancelled = connection.heartbeat.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                // Only fill silence: skip the beat when something was written
                // within the last interval.
                let idle = {
                    let inner = connection.inner.lock().expect("sse connection poisoned");
                    if inner.closed {
                        return;
                    }
                    inner.last_write.elapsed() >= interval
                };
                if idle {
                    connection.send_comment("heartbeat");
                }
            }
        });
    }

    /// Write an event frame. Event ids start at 1 and increase by one per
    /// event. No-op once closed.
    pub fn send_event(&self, event: &str, data: &serde_json::Value) {
        let mut inner = self.inner.lock().expect("sse connection poisoned");
        if inner.closed {
            return;
        }
        inner.last_event_id += 1;
        let frame = format!("id: {}\nevent: {}\ndata: {}\n\n", inner.last_event_id, event, data);
        Self::write(&mut inner, frame);
    }

    /// Write a bare `data:` frame (OpenAI-compatible raw variant, used by the
    /// mock stream). No id or event field. No-op once closed.
    pub fn send_data(&self, payload: &str) {
        let mut inner = self.inner.lock().expect("sse connection poisoned");
        if inner.closed {
            return;
        }
        let frame = format!("data: {}\n\n", payload);
        Self::write(&mut inner, frame);
    }

    /// Write a comment frame. No-op once closed.
    pub fn send_comment(&self, text: &str) {
        let mut inner = self.inner.lock().expect("sse connection poisoned");
        if inner.closed {
            return;
        }
        let frame = format!(": {}\n\n", text);
        Self::write(&mut inner, frame);
    }

    /// Terminate the stream: emit the final `done` event carrying the
    /// JSON-quoted `"[DONE]"` sentinel, stop the heartbeat and close the
    /// transport. Safe to call more than once.
    pub fn end(&self) {
        {
            let inner = self.inner.lock().expect("sse connection poisoned");
            if inner.closed {
                return;
            }
        }
        self.send_event("done", &json!("[DONE]"));
        self.teardown();
    }

    /// React to a transport close signal. Safe to call more than once.
    pub fn handle_disconnect(&self) {
        self.teardown();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("sse connection poisoned").closed
    }

    pub fn last_event_id(&self) -> u64 {
        self.inner
            .lock()
            .expect("sse connection poisoned")
            .last_event_id
    }

    fn teardown(&self) {
        let mut inner = self.inner.lock().expect("sse connection poisoned");
        inner.closed = true;
        inner.tx = None;
        self.heartbeat.cancel();
    }

    fn write(inner: &mut Inner, frame: String) {
        inner.last_write = Instant::now();
        if let Some(tx) = &inner.tx {
            if tx.send(Bytes::from(frame)).is_err() {
                // Receiver gone: the client disconnected mid-stream.
                tracing::debug!("sse client disconnected");
                inner.closed = true;
                inner.tx = None;
            }
        }
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        self.heartbeat.cancel();
    }
}
