//! HTTP request handlers
//!
//! CRUD glue: validate input, expand and persist via the gateway, broadcast
//! the change, surface the result as a toast. Errors translate to the HTTP
//! taxonomy in `crate::error`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use backline_common::batch::{self, BatchRequest, LineItem};
use backline_common::events::{AppEvent, ChangeEvent, ChangeKind};
use backline_common::Error;

use crate::error::ApiResult;
use crate::gateway::{
    CrewFilter, CrewRepo, Page, TicketFilter, TicketRepo, CREW_STATUSES, TICKET_STATUSES,
};
use crate::state::AppContext;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchPayload {
    pub parent_id: Uuid,
    pub items: Vec<LineItemPayload>,
}

#[derive(Debug, Deserialize)]
pub struct LineItemPayload {
    pub reference_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl BatchPayload {
    fn into_request(self) -> BatchRequest {
        BatchRequest {
            parent_id: self.parent_id,
            items: self
                .items
                .into_iter()
                .map(|item| LineItem {
                    reference_id: item.reference_id,
                    quantity: item.quantity,
                    attributes: item.attributes,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse<T> {
    pub success: bool,
    pub count: usize,
    pub records: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub parent_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status: String,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "backline-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Batch Endpoints
// ============================================================================

/// POST /api/batch - Batch crew assignment
///
/// Expands each line item into `quantity` assignments and writes them as
/// one batched insert. Concurrent submissions against the same project are
/// not serialized.
pub async fn create_crew_batch(
    State(ctx): State<AppContext>,
    Json(payload): Json<BatchPayload>,
) -> ApiResult<(StatusCode, Json<BatchResponse<crate::gateway::CrewRow>>)> {
    let request = payload.into_request();
    let records = batch::expand(&request, &batch::CREW_PROFILE)?;

    match CrewRepo::new(&ctx.db).insert_batch(&records).await {
        Ok(rows) => {
            info!(parent_id = %request.parent_id, count = rows.len(), "crew batch created");
            for row in &rows {
                ctx.broadcast(AppEvent::Change(ChangeEvent::new(
                    "crew_assignments",
                    ChangeKind::Insert,
                    row,
                )));
            }
            ctx.notifier.success(
                "Crew assigned",
                format!("{} assignment(s) created", rows.len()),
            );
            Ok((
                StatusCode::CREATED,
                Json(BatchResponse {
                    success: true,
                    count: rows.len(),
                    records: rows,
                }),
            ))
        }
        Err(e) => {
            ctx.notifier.error("Crew assignment failed", e.to_string());
            Err(e.into())
        }
    }
}

/// POST /api/batch/tickets - Batch ticket generation
///
/// One ticket per unit of quantity, each with a fresh `TIX-` code unique
/// within the event.
pub async fn create_ticket_batch(
    State(ctx): State<AppContext>,
    Json(payload): Json<BatchPayload>,
) -> ApiResult<(StatusCode, Json<BatchResponse<crate::gateway::TicketRow>>)> {
    let request = payload.into_request();
    let records = batch::expand(&request, &batch::TICKET_PROFILE)?;

    match TicketRepo::new(&ctx.db).insert_batch(&records).await {
        Ok(rows) => {
            info!(parent_id = %request.parent_id, count = rows.len(), "ticket batch created");
            for row in &rows {
                ctx.broadcast(AppEvent::Change(ChangeEvent::new(
                    "tickets",
                    ChangeKind::Insert,
                    row,
                )));
            }
            ctx.notifier.success(
                "Tickets generated",
                format!("{} ticket(s) created", rows.len()),
            );
            Ok((
                StatusCode::CREATED,
                Json(BatchResponse {
                    success: true,
                    count: rows.len(),
                    records: rows,
                }),
            ))
        }
        Err(e) => {
            ctx.notifier.error("Ticket generation failed", e.to_string());
            Err(e.into())
        }
    }
}

// ============================================================================
// Ticket Endpoints
// ============================================================================

/// GET /api/tickets - List tickets
pub async fn list_tickets(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = TicketFilter {
        event_id: query.parent_id.clone(),
        status: query.status.clone(),
    };
    let rows = TicketRepo::new(&ctx.db).list(&filter, query.page()).await?;
    Ok(Json(serde_json::json!({ "tickets": rows })))
}

/// POST /api/tickets/:id/status - Update one ticket's status
pub async fn update_ticket_status(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> ApiResult<Json<crate::gateway::TicketRow>> {
    if !TICKET_STATUSES.contains(&payload.status.as_str()) {
        return Err(Error::Validation(format!(
            "unknown ticket status '{}' (expected one of {})",
            payload.status,
            TICKET_STATUSES.join(", ")
        ))
        .into());
    }

    let row = TicketRepo::new(&ctx.db)
        .update_status(&id, &payload.status)
        .await?;

    ctx.broadcast(AppEvent::Change(ChangeEvent::new(
        "tickets",
        ChangeKind::Update,
        &row,
    )));
    Ok(Json(row))
}

/// DELETE /api/tickets/:id - Remove one ticket
pub async fn delete_ticket(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let row = TicketRepo::new(&ctx.db).delete(&id).await?;

    ctx.broadcast(AppEvent::Change(ChangeEvent::new(
        "tickets",
        ChangeKind::Delete,
        &row,
    )));
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Crew Endpoints
// ============================================================================

/// GET /api/crew - List crew assignments
pub async fn list_crew(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = CrewFilter {
        project_id: query.parent_id.clone(),
        status: query.status.clone(),
    };
    let rows = CrewRepo::new(&ctx.db).list(&filter, query.page()).await?;
    Ok(Json(serde_json::json!({ "crew": rows })))
}

/// POST /api/crew/:id/status - Update one assignment's status
pub async fn update_crew_status(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> ApiResult<Json<crate::gateway::CrewRow>> {
    if !CREW_STATUSES.contains(&payload.status.as_str()) {
        return Err(Error::Validation(format!(
            "unknown assignment status '{}' (expected one of {})",
            payload.status,
            CREW_STATUSES.join(", ")
        ))
        .into());
    }

    let row = CrewRepo::new(&ctx.db)
        .update_status(&id, &payload.status)
        .await?;

    ctx.broadcast(AppEvent::Change(ChangeEvent::new(
        "crew_assignments",
        ChangeKind::Update,
        &row,
    )));
    Ok(Json(row))
}

/// DELETE /api/crew/:id - Remove one crew assignment
pub async fn delete_crew_assignment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let row = CrewRepo::new(&ctx.db).delete(&id).await?;

    ctx.broadcast(AppEvent::Change(ChangeEvent::new(
        "crew_assignments",
        ChangeKind::Delete,
        &row,
    )));
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Notification Endpoints
// ============================================================================

/// GET /api/notifications - Currently visible toasts, insertion order
pub async fn list_notifications(State(ctx): State<AppContext>) -> Json<Value> {
    Json(serde_json::json!({ "notifications": ctx.notifier.active() }))
}

/// DELETE /api/notifications/:id - Dismiss a toast (idempotent)
pub async fn dismiss_notification(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> StatusCode {
    ctx.notifier.dismiss(&id);
    StatusCode::NO_CONTENT
}
