//! Notification center (toast queue)
//!
//! A process-wide, dependency-injected queue of transient UI notifications.
//! Each toast moves through `created -> visible -> (dismissed | expired)`
//! and is terminal on either exit. Auto-expiry runs on a cancellable tokio
//! timer task; explicit dismissal aborts the timer so a toast is removed at
//! most once. Lifecycle transitions are broadcast on the event bus for SSE
//! clients rendering the overlay stack.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::AppEvent;

/// Default auto-dismiss timeout in milliseconds
pub const DEFAULT_TOAST_MS: u64 = 5000;

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

/// A transient, dismissible notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toast {
    /// Opaque id, unique per instance. Duplicate ids are not de-duplicated;
    /// `Toast::new` generates a unique one.
    pub id: String,
    pub kind: ToastKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Auto-dismiss timeout; 0 persists until explicitly dismissed
    pub duration_ms: u64,
}

impl Toast {
    pub fn new(kind: ToastKind, title: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            kind,
            title: title.into(),
            message: None,
            duration_ms: DEFAULT_TOAST_MS,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Persist until explicit dismissal
    pub fn sticky(self) -> Self {
        self.with_duration_ms(0)
    }
}

/// Time-based component plus random suffix, unique enough per process
fn generate_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("{millis}-{suffix}")
}

/// A visible toast with its pending expiry timer, if any
struct ActiveToast {
    toast: Toast,
    expiry: Option<JoinHandle<()>>,
}

/// Process-wide notification queue.
///
/// Constructed explicitly and shared via `Arc`; there is no module-level
/// singleton. Insertion order is preserved for stacked rendering.
pub struct NotificationCenter {
    inner: Mutex<Vec<ActiveToast>>,
    event_tx: broadcast::Sender<AppEvent>,
}

impl NotificationCenter {
    pub fn new(event_tx: broadcast::Sender<AppEvent>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Vec::new()),
            event_tx,
        })
    }

    /// Make a toast visible and schedule its auto-expiry.
    ///
    /// Returns the toast id for later dismissal.
    pub fn push(self: &Arc<Self>, toast: Toast) -> String {
        let id = toast.id.clone();
        let duration_ms = toast.duration_ms;
        debug!(id = %id, kind = ?toast.kind, "toast created");

        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(AppEvent::ToastCreated {
            toast: toast.clone(),
        });

        // Store first, then start the timer: expiry must always find the
        // toast it was scheduled for, however short the duration.
        {
            let mut inner = self.inner.lock().unwrap();
            inner.push(ActiveToast {
                toast,
                expiry: None,
            });
        }

        if duration_ms > 0 {
            let center = Arc::clone(self);
            let expire_id = id.clone();
            let delay = Duration::from_millis(duration_ms);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                center.expire(&expire_id);
            });

            let mut inner = self.inner.lock().unwrap();
            match inner.iter_mut().find(|active| active.toast.id == id) {
                Some(active) => active.expiry = Some(handle),
                // Already expired or dismissed; nothing left to time out
                None => handle.abort(),
            }
        }

        id
    }

    /// Explicitly dismiss a toast, cancelling any pending expiry timer.
    ///
    /// Idempotent: dismissing an unknown or already-removed id is a no-op.
    pub fn dismiss(&self, id: &str) {
        let removed = self.remove(id);
        if let Some(active) = removed {
            if let Some(timer) = active.expiry {
                timer.abort();
            }
            debug!(id = %id, "toast dismissed");
            let _ = self.event_tx.send(AppEvent::ToastDismissed { id: id.to_string() });
        }
    }

    /// Timer-driven removal. A toast dismissed in the meantime is gone
    /// already, so expiry finds nothing and does nothing.
    fn expire(&self, id: &str) {
        if self.remove(id).is_some() {
            debug!(id = %id, "toast expired");
            let _ = self.event_tx.send(AppEvent::ToastExpired { id: id.to_string() });
        }
    }

    fn remove(&self, id: &str) -> Option<ActiveToast> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.iter().position(|active| active.toast.id == id)?;
        Some(inner.remove(index))
    }

    /// Currently visible toasts in insertion order
    pub fn active(&self) -> Vec<Toast> {
        let inner = self.inner.lock().unwrap();
        inner.iter().map(|active| active.toast.clone()).collect()
    }

    /// Convenience: push a success toast
    pub fn success(self: &Arc<Self>, title: impl Into<String>, message: impl Into<String>) -> String {
        self.push(Toast::new(ToastKind::Success, title).with_message(message))
    }

    /// Convenience: push an error toast
    pub fn error(self: &Arc<Self>, title: impl Into<String>, message: impl Into<String>) -> String {
        self.push(Toast::new(ToastKind::Error, title).with_message(message))
    }
}
