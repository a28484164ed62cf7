//! Shared application context
//!
//! One explicitly constructed context object owns the database pool, the
//! event bus, the notification center and the auth-flow rate limiter, and
//! is cloned into every handler. Nothing here is a module-level singleton;
//! tests build their own context against an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::broadcast;

use backline_common::events::AppEvent;
use backline_common::notify::NotificationCenter;
use backline_common::Config;

use crate::api::auth::RateLimiter;

/// Magic-link requests allowed per address per window
const MAGIC_LINK_LIMIT: usize = 3;
const MAGIC_LINK_WINDOW: Duration = Duration::from_secs(60);

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub notifier: Arc<NotificationCenter>,
    pub magic_link_limiter: Arc<RateLimiter>,
    /// Event broadcaster for SSE clients and realtime subscriptions
    event_tx: broadcast::Sender<AppEvent>,
}

impl AppContext {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        // Buffer up to 256 events; lagged SSE clients drop rather than block
        let (event_tx, _) = broadcast::channel(256);
        let notifier = NotificationCenter::new(event_tx.clone());
        Self {
            db,
            config: Arc::new(config),
            notifier,
            magic_link_limiter: Arc::new(RateLimiter::new(MAGIC_LINK_LIMIT, MAGIC_LINK_WINDOW)),
            event_tx,
        }
    }

    /// Broadcast an event to all listeners. No receivers is OK.
    pub fn broadcast(&self, event: AppEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event bus (SSE streams, realtime wrappers, tests)
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    /// The bus sender, for establishing realtime subscriptions
    pub fn event_bus(&self) -> &broadcast::Sender<AppEvent> {
        &self.event_tx
    }
}
