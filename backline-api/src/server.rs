//! HTTP server setup and routing
//!
//! Builds the axum router over the shared application context and runs it
//! with graceful shutdown. The auth layer wraps everything; public routes
//! are excluded inside the layer itself.

use std::net::SocketAddr;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use backline_common::{Error, Result};

use crate::api::{auth, auth_middleware::AuthLayer, handlers, sse};
use crate::state::AppContext;

/// Build the application router with all routes and layers.
pub fn create_router(ctx: AppContext) -> Router {
    let auth_layer = AuthLayer::new(&ctx.config.service_key);

    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Batch creation
        .route("/api/batch", post(handlers::create_crew_batch))
        .route("/api/batch/tickets", post(handlers::create_ticket_batch))
        // Tickets
        .route("/api/tickets", get(handlers::list_tickets))
        .route("/api/tickets/:id", delete(handlers::delete_ticket))
        .route("/api/tickets/:id/status", post(handlers::update_ticket_status))
        // Crew assignments
        .route("/api/crew", get(handlers::list_crew))
        .route("/api/crew/:id", delete(handlers::delete_crew_assignment))
        .route("/api/crew/:id/status", post(handlers::update_crew_status))
        // Notifications (toast overlay)
        .route("/api/notifications", get(handlers::list_notifications))
        .route("/api/notifications/:id", delete(handlers::dismiss_notification))
        // SSE event stream / realtime channels
        .route("/api/events", get(sse::event_stream))
        // Pre-identity auth flows
        .route("/api/auth/password-reset", post(auth::password_reset))
        .route("/api/auth/magic-link", post(auth::magic_link))
        // Attach application context
        .with_state(ctx)
        // Bearer authentication for API routes
        .layer(auth_layer)
        // Enable CORS for browser clients
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP API server until shutdown.
pub async fn run(ctx: AppContext) -> Result<()> {
    if !ctx.config.auth_enabled() {
        warn!("API authentication disabled (empty service key)");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.port));
    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

    Ok(())
}

/// Graceful shutdown on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!("Failed to install signal handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
