//! Server-Sent Events endpoint
//!
//! Streams event-bus traffic to connected clients. With a `table` query
//! parameter the stream is a realtime channel scoped to that table (plus
//! optional event kind and row filter); without one it carries every bus
//! event, toast lifecycle included, for the notification overlay.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use serde::Deserialize;

use backline_common::realtime::{EventFilter, RowFilter, SubscriptionSpec};
use backline_common::{sse, Error};

use crate::error::ApiError;
use crate::state::AppContext;

#[derive(Debug, Deserialize)]
pub struct EventStreamQuery {
    pub table: Option<String>,
    pub event: Option<String>,
    pub filter: Option<String>,
}

/// GET /api/events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Query(query): Query<EventStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let spec = match query.table {
        Some(table) => {
            let event = match query.event.as_deref() {
                Some(raw) => raw.parse::<EventFilter>()?,
                None => EventFilter::Any,
            };
            let mut spec = SubscriptionSpec::new(table).with_event(event);
            if let Some(raw) = query.filter.as_deref() {
                spec = spec.with_filter(RowFilter::parse(raw)?);
            }
            Some(spec)
        }
        None => {
            if query.event.is_some() || query.filter.is_some() {
                return Err(Error::Validation(
                    "'table' is required when 'event' or 'filter' is given".to_string(),
                )
                .into());
            }
            None
        }
    };

    Ok(sse::event_stream(ctx.subscribe(), spec))
}
