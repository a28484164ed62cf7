//! Realtime change subscriptions
//!
//! Wraps the process event bus so a client-facing component can watch one
//! table for row changes. A subscription is scoped to a (table, event kind,
//! optional row filter) tuple and invokes its callback with the new row
//! state on every matching event. There is no buffering or replay: events
//! delivered while unsubscribed are lost, and a fresh subscription starts
//! with no backlog.

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::{channel_name, AppEvent, ChangeEvent, ChangeKind};
use crate::{Error, Result};

/// Which change kinds a subscription is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    Insert,
    Update,
    Delete,
    #[default]
    Any,
}

impl EventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::Insert => kind == ChangeKind::Insert,
            EventFilter::Update => kind == ChangeKind::Update,
            EventFilter::Delete => kind == ChangeKind::Delete,
            EventFilter::Any => true,
        }
    }
}

impl std::str::FromStr for EventFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(EventFilter::Insert),
            "UPDATE" => Ok(EventFilter::Update),
            "DELETE" => Ok(EventFilter::Delete),
            "*" | "ANY" => Ok(EventFilter::Any),
            other => Err(Error::Validation(format!(
                "unknown event filter '{other}' (expected INSERT, UPDATE, DELETE or *)"
            ))),
        }
    }
}

/// Equality filter on one row column, parsed from `"column=eq.value"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    /// Parse a filter expression of the form `column=eq.value`.
    pub fn parse(expr: &str) -> Result<Self> {
        let (column, rest) = expr.split_once('=').ok_or_else(|| {
            Error::Validation(format!("invalid row filter '{expr}' (expected column=eq.value)"))
        })?;
        let value = rest.strip_prefix("eq.").ok_or_else(|| {
            Error::Validation(format!(
                "invalid row filter '{expr}' (only eq. comparisons are supported)"
            ))
        })?;
        if column.is_empty() || value.is_empty() {
            return Err(Error::Validation(format!(
                "invalid row filter '{expr}' (empty column or value)"
            )));
        }
        Ok(Self {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    /// Whether a row matches this filter. Non-string columns compare by
    /// their JSON text representation.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(other) => other.to_string() == self.value,
            None => false,
        }
    }
}

/// What a subscription watches: table + event kind + optional row filter
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSpec {
    pub table: String,
    pub event: EventFilter,
    pub filter: Option<RowFilter>,
}

impl SubscriptionSpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            event: EventFilter::Any,
            filter: None,
        }
    }

    pub fn with_event(mut self, event: EventFilter) -> Self {
        self.event = event;
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Channel name for this subscription: `"<table>-changes"`
    pub fn channel(&self) -> String {
        channel_name(&self.table)
    }

    /// Whether a change event falls inside this subscription's scope
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        if !self.event.matches(event.kind) {
            return false;
        }
        match &self.filter {
            Some(filter) => filter.matches(&event.row),
            None => true,
        }
    }
}

/// One live change-subscription channel.
///
/// Holds the listener task; dropping the subscription (or calling
/// `unsubscribe`) tears the channel down and guarantees no further callback
/// invocations for later events.
pub struct RealtimeSubscription {
    channel: String,
    listener: JoinHandle<()>,
}

impl RealtimeSubscription {
    /// Establish a subscription on the event bus.
    ///
    /// The callback runs on a dedicated task for every matching change
    /// event. Lagged receivers drop events rather than block the bus.
    pub fn subscribe<F>(
        bus: &broadcast::Sender<AppEvent>,
        spec: SubscriptionSpec,
        mut callback: F,
    ) -> Self
    where
        F: FnMut(ChangeEvent) + Send + 'static,
    {
        let mut rx = bus.subscribe();
        let channel = spec.channel();
        debug!(channel = %channel, "realtime subscription established");

        let listener = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(AppEvent::Change(event)) if spec.matches(&event) => callback(event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(dropped)) => {
                        warn!(dropped, "realtime subscription lagged; events lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { channel, listener }
    }

    /// Channel this subscription listens on
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Tear the subscription down. After this returns the callback is never
    /// invoked again.
    pub fn unsubscribe(self) {
        debug!(channel = %self.channel, "realtime subscription removed");
        self.listener.abort();
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Owns at most one live subscription for a UI element.
///
/// `bind` replaces the active subscription when the spec changes and is a
/// no-op when it does not; `unbind` mirrors component unmount.
#[derive(Default)]
pub struct RealtimeBinding {
    active: Option<(SubscriptionSpec, RealtimeSubscription)>,
}

impl RealtimeBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Subscribe, replacing any previous subscription whose spec differs.
    pub fn bind<F>(&mut self, bus: &broadcast::Sender<AppEvent>, spec: SubscriptionSpec, callback: F)
    where
        F: FnMut(ChangeEvent) + Send + 'static,
    {
        if let Some((active_spec, _)) = &self.active {
            if *active_spec == spec {
                return;
            }
        }
        self.unbind();
        let subscription = RealtimeSubscription::subscribe(bus, spec.clone(), callback);
        self.active = Some((spec, subscription));
    }

    /// Tear down the active subscription, if any.
    pub fn unbind(&mut self) {
        if let Some((_, subscription)) = self.active.take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn insert_event(table: &str, row: serde_json::Value) -> AppEvent {
        AppEvent::Change(ChangeEvent::new(table, ChangeKind::Insert, &row))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn callback_sees_only_matching_events() {
        let (bus, _keep) = broadcast::channel(64);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let spec = SubscriptionSpec::new("tickets").with_event(EventFilter::Insert);
        let _sub = RealtimeSubscription::subscribe(&bus, spec, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.send(insert_event("tickets", json!({"id": "t1"}))).unwrap();
        bus.send(insert_event("crew_assignments", json!({"id": "c1"}))).unwrap();
        bus.send(AppEvent::Change(ChangeEvent::new(
            "tickets",
            ChangeKind::Delete,
            &json!({"id": "t1"}),
        )))
        .unwrap();

        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn row_filter_scopes_events() {
        let (bus, _keep) = broadcast::channel(64);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let spec = SubscriptionSpec::new("tickets")
            .with_filter(RowFilter::parse("event_id=eq.e1").unwrap());
        let _sub = RealtimeSubscription::subscribe(&bus, spec, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.send(insert_event("tickets", json!({"id": "a", "event_id": "e1"}))).unwrap();
        bus.send(insert_event("tickets", json!({"id": "b", "event_id": "e2"}))).unwrap();

        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_callbacks() {
        let (bus, _keep) = broadcast::channel(64);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let sub = RealtimeSubscription::subscribe(&bus, SubscriptionSpec::new("tickets"), move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.send(insert_event("tickets", json!({"id": "t1"}))).unwrap();
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sub.unsubscribe();

        bus.send(insert_event("tickets", json!({"id": "t2"}))).unwrap();
        bus.send(insert_event("tickets", json!({"id": "t3"}))).unwrap();
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1, "no callbacks after unsubscribe");
    }

    #[tokio::test]
    async fn binding_holds_one_subscription() {
        let (bus, _keep) = broadcast::channel(64);
        let tickets_seen = Arc::new(AtomicUsize::new(0));
        let crew_seen = Arc::new(AtomicUsize::new(0));

        let mut binding = RealtimeBinding::new();

        let counter = Arc::clone(&tickets_seen);
        binding.bind(&bus, SubscriptionSpec::new("tickets"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(binding.is_active());

        // Rebinding with the same spec keeps the existing subscription
        let counter = Arc::clone(&tickets_seen);
        binding.bind(&bus, SubscriptionSpec::new("tickets"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.send(insert_event("tickets", json!({"id": "t1"}))).unwrap();
        settle().await;
        assert_eq!(tickets_seen.load(Ordering::SeqCst), 1);

        // Changing the table tears the old subscription down first
        let counter = Arc::clone(&crew_seen);
        binding.bind(&bus, SubscriptionSpec::new("crew_assignments"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.send(insert_event("tickets", json!({"id": "t2"}))).unwrap();
        bus.send(insert_event("crew_assignments", json!({"id": "c1"}))).unwrap();
        settle().await;
        assert_eq!(tickets_seen.load(Ordering::SeqCst), 1);
        assert_eq!(crew_seen.load(Ordering::SeqCst), 1);

        binding.unbind();
        assert!(!binding.is_active());
    }

    #[test]
    fn row_filter_parsing() {
        let filter = RowFilter::parse("event_id=eq.abc123").unwrap();
        assert_eq!(filter.column, "event_id");
        assert_eq!(filter.value, "abc123");

        assert!(RowFilter::parse("event_id").is_err());
        assert!(RowFilter::parse("event_id=gt.5").is_err());
        assert!(RowFilter::parse("=eq.x").is_err());
    }

    #[test]
    fn channel_names() {
        let spec = SubscriptionSpec::new("tickets");
        assert_eq!(spec.channel(), "tickets-changes");
    }
}
