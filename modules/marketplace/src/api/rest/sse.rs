use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Small typed SSE broadcaster built on `tokio::sync::broadcast`.
/// - T must be `Clone` so multiple subscribers can receive the same payload.
/// - Bounded channel drops oldest events when subscribers lag.
#[derive(Clone)]
pub struct SseBroadcaster<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> SseBroadcaster<T> {
    /// Create a broadcaster with bounded buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast a single message to current subscribers.
    /// Errors are ignored to keep the hot path cheap (e.g., no active subscribers).
    pub fn send(&self, value: T) {
        let _ = self.tx.send(value);
    }

    /// Subscribe to a typed stream of messages; lag/drop errors are filtered out.
    pub fn subscribe_stream(&self) -> impl Stream<Item = T> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|res| async move { res.ok() })
    }

    /// SSE response carrying only the messages that pass `keep`, with
    /// periodic keepalive pings to avoid idle timeouts.
    pub fn sse_response_filtered<F>(
        &self,
        keep: F,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
    where
        T: Serialize,
        F: Fn(&T) -> bool + Send + 'static,
    {
        let stream = self
            .subscribe_stream()
            .filter_map(move |msg| {
                let keep_it = keep(&msg);
                async move { keep_it.then_some(msg) }
            })
            .map(|msg| {
                let ev = Event::default().json_data(&msg).unwrap_or_else(|_| {
                    // Fallback to a tiny text marker instead of breaking the stream.
                    Event::default().data("serialization_error")
                });
                Ok(ev)
            });
        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keepalive"),
        )
    }
}
