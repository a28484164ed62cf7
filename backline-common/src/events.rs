//! Event types for the backline event bus
//!
//! Every process hosts one `tokio::sync::broadcast` bus carrying `AppEvent`.
//! Row-change events mirror what the database just committed; toast lifecycle
//! events drive the client-side notification overlay. The SSE endpoint
//! streams both to connected clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notify::Toast;

/// Kind of row-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A committed row-level change on a named table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the change applies to
    pub table: String,
    pub kind: ChangeKind,
    /// New row state (last known state for deletes)
    pub row: Value,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Build a change event from any serializable row.
    pub fn new(table: impl Into<String>, kind: ChangeKind, row: &impl Serialize) -> Self {
        Self {
            table: table.into(),
            kind,
            // Serialization of our own row types cannot fail in practice
            row: serde_json::to_value(row).unwrap_or(Value::Null),
            timestamp: Utc::now(),
        }
    }

    /// Realtime channel name for this event's table: `"<table>-changes"`
    pub fn channel(&self) -> String {
        channel_name(&self.table)
    }
}

/// Realtime channel name for a table: `"<table>-changes"`
pub fn channel_name(table: &str) -> String {
    format!("{table}-changes")
}

/// backline event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// A row-level change was committed
    Change(ChangeEvent),

    /// A toast became visible
    ToastCreated { toast: Toast },

    /// A toast was explicitly dismissed
    ToastDismissed { id: String },

    /// A toast reached its auto-expiry deadline
    ToastExpired { id: String },
}

impl AppEvent {
    /// SSE event name for this event
    pub fn event_name(&self) -> &'static str {
        match self {
            AppEvent::Change(ev) => match ev.kind {
                ChangeKind::Insert => "RowInserted",
                ChangeKind::Update => "RowUpdated",
                ChangeKind::Delete => "RowDeleted",
            },
            AppEvent::ToastCreated { .. } => "ToastCreated",
            AppEvent::ToastDismissed { .. } => "ToastDismissed",
            AppEvent::ToastExpired { .. } => "ToastExpired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_name_follows_convention() {
        let ev = ChangeEvent::new("tickets", ChangeKind::Insert, &json!({"id": "t1"}));
        assert_eq!(ev.channel(), "tickets-changes");
        assert_eq!(channel_name("crew_assignments"), "crew_assignments-changes");
    }

    #[test]
    fn event_names_follow_change_kind() {
        let insert = AppEvent::Change(ChangeEvent::new("tickets", ChangeKind::Insert, &json!({})));
        let delete = AppEvent::Change(ChangeEvent::new("tickets", ChangeKind::Delete, &json!({})));
        assert_eq!(insert.event_name(), "RowInserted");
        assert_eq!(delete.event_name(), "RowDeleted");
    }

    #[test]
    fn change_event_serializes_tagged() {
        let ev = AppEvent::Change(ChangeEvent::new("tickets", ChangeKind::Update, &json!({"id": 1})));
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["type"], "Change");
        assert_eq!(value["kind"], "UPDATE");
        assert_eq!(value["table"], "tickets");
    }
}
