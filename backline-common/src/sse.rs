//! Server-Sent Events (SSE) utilities
//!
//! Converts a broadcast receiver on the event bus into an SSE response
//! stream. Clients reconnecting get a fresh subscription with no backlog;
//! events delivered while disconnected are lost by design.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::events::AppEvent;
use crate::realtime::SubscriptionSpec;

/// Build an SSE stream over the event bus.
///
/// With a `spec`, only change events inside the subscription's scope are
/// sent (one channel per table+event+filter tuple). Without one, every bus
/// event is sent, toast lifecycle included.
pub fn event_stream(
    rx: broadcast::Receiver<AppEvent>,
    spec: Option<SubscriptionSpec>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let channel = spec.as_ref().map(|s| s.channel());
    debug!(channel = ?channel, "SSE client connected");

    let stream = async_stream::stream! {
        // Initial connected status so clients can show connection state
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        let mut events = BroadcastStream::new(rx);
        while let Some(result) = events.next().await {
            match result {
                Ok(event) => {
                    let in_scope = match (&spec, &event) {
                        (Some(spec), AppEvent::Change(change)) => spec.matches(change),
                        (Some(_), _) => false,
                        (None, _) => true,
                    };
                    if !in_scope {
                        continue;
                    }

                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            yield Ok(Event::default().event(event.event_name()).data(json));
                        }
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                        }
                    }
                }
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(dropped)) => {
                    // No replay: a lagged client just misses events
                    warn!(dropped, "SSE stream lagged");
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
