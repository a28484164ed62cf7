//! Integration tests for the backline API
//!
//! Drives the full router (auth layer included) against an in-memory
//! database: batch creation, gateway reads and writes, notification
//! lifecycle, auth flows, and event broadcasting.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use backline_api::server::create_router;
use backline_api::state::AppContext;
use backline_common::events::AppEvent;
use backline_common::{db, Config};

const TEST_KEY: &str = "test-service-key";

async fn setup() -> (Router, AppContext) {
    let pool = db::init_database("sqlite::memory:").await.unwrap();
    let config = Config::new(5780, "sqlite::memory:".to_string(), TEST_KEY.to_string()).unwrap();
    let ctx = AppContext::new(pool, config);
    (create_router(ctx.clone()), ctx)
}

async fn request(
    app: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(json_body) => builder
            .header("content-type", "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

fn ticket_batch(parent_id: Uuid, quantities: &[u32]) -> Value {
    let items: Vec<Value> = quantities
        .iter()
        .map(|q| {
            json!({
                "reference_id": Uuid::new_v4(),
                "quantity": q,
                "attributes": { "price": 45.0 }
            })
        })
        .collect();
    json!({ "parent_id": parent_id, "items": items })
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_needs_no_auth() {
    let (app, _ctx) = setup().await;

    let (status, body) = request(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "backline-api");
    assert!(body["version"].is_string());
}

// ============================================================================
// Batch ticket generation
// ============================================================================

#[tokio::test]
async fn ticket_batch_expands_quantities_exactly() {
    let (app, _ctx) = setup().await;
    let parent_id = Uuid::new_v4();

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(parent_id, &[2, 1, 3])),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 6);

    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 6);

    // Each code is distinct and matches TIX-<digits>-<alnum>
    let mut codes = std::collections::HashSet::new();
    for record in records {
        let code = record["code"].as_str().unwrap();
        assert!(codes.insert(code.to_string()), "duplicate code {code}");
        let parts: Vec<&str> = code.splitn(3, '-').collect();
        assert_eq!(parts[0], "TIX");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(record["status"], "available");
        assert_eq!(record["event_id"], parent_id.to_string());
    }

    // The rows landed in the database
    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/api/tickets?parent_id={parent_id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tickets"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn ticket_batch_rejects_zero_quantity() {
    let (app, _ctx) = setup().await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(Uuid::new_v4(), &[1, 0])),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("quantity"));
}

#[tokio::test]
async fn ticket_batch_rejects_missing_price() {
    let (app, _ctx) = setup().await;

    let payload = json!({
        "parent_id": Uuid::new_v4(),
        "items": [{ "reference_id": Uuid::new_v4(), "quantity": 2 }]
    });
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(payload),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("price"));
}

#[tokio::test]
async fn ticket_batch_rejects_string_price() {
    // "45.0" is not a price; accepting it and persisting NULL would lose
    // data behind a success response
    let (app, _ctx) = setup().await;

    let payload = json!({
        "parent_id": Uuid::new_v4(),
        "items": [{
            "reference_id": Uuid::new_v4(),
            "quantity": 1,
            "attributes": { "price": "45.0" }
        }]
    });
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(payload),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("must be a number"));
}

#[tokio::test]
async fn ticket_batch_keeps_extra_attributes() {
    let (app, _ctx) = setup().await;
    let parent_id = Uuid::new_v4();

    let payload = json!({
        "parent_id": parent_id,
        "items": [{
            "reference_id": Uuid::new_v4(),
            "quantity": 1,
            "attributes": { "price": 45.0, "seat": "A1" }
        }]
    });
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(payload),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["records"][0]["price"], 45.0);
    assert_eq!(body["records"][0]["attributes"]["seat"], "A1");

    // The seat survives the round trip through the database
    let (_, body) = request(
        &app,
        Method::GET,
        &format!("/api/tickets?parent_id={parent_id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(body["tickets"][0]["attributes"]["seat"], "A1");
    assert_eq!(body["tickets"][0]["price"], 45.0);
}

#[tokio::test]
async fn ticket_batch_rejects_empty_items() {
    let (app, _ctx) = setup().await;

    let payload = json!({ "parent_id": Uuid::new_v4(), "items": [] });
    let (status, _body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(payload),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn batch_broadcasts_inserts_and_toast() {
    let (app, ctx) = setup().await;
    let mut rx = ctx.subscribe();

    let (status, _body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(Uuid::new_v4(), &[2, 1])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut inserts = 0;
    let mut toasts = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            AppEvent::Change(change) => {
                assert_eq!(change.table, "tickets");
                assert_eq!(change.channel(), "tickets-changes");
                inserts += 1;
            }
            AppEvent::ToastCreated { toast } => {
                toasts += 1;
                assert_eq!(toast.title, "Tickets generated");
            }
            _ => {}
        }
    }
    assert_eq!(inserts, 3);
    assert_eq!(toasts, 1);
}

#[tokio::test]
async fn concurrent_batches_both_complete() {
    // The application does not serialize concurrent submissions against the
    // same parent; both calls land and the totals add up. Capacity
    // enforcement across calls is a known gap, not a tested guarantee.
    let (app, _ctx) = setup().await;
    let parent_id = Uuid::new_v4();

    let first = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(parent_id, &[2])),
    );
    let second = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(parent_id, &[3])),
    );

    let ((status_a, _), (status_b, _)) = tokio::join!(first, second);
    assert_eq!(status_a, StatusCode::CREATED);
    assert_eq!(status_b, StatusCode::CREATED);

    let (_, body) = request(
        &app,
        Method::GET,
        &format!("/api/tickets?parent_id={parent_id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(body["tickets"].as_array().unwrap().len(), 5);
}

// ============================================================================
// Authentication layer
// ============================================================================

#[tokio::test]
async fn batch_requires_bearer_token() {
    let (app, _ctx) = setup().await;
    let payload = ticket_batch(Uuid::new_v4(), &[1]);

    let (status, body) = request(&app, Method::POST, "/api/batch/tickets", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some("wrong-key"),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_service_key_disables_auth() {
    let pool = db::init_database("sqlite::memory:").await.unwrap();
    let config = Config::new(5780, "sqlite::memory:".to_string(), String::new()).unwrap();
    let app = create_router(AppContext::new(pool, config));

    let (status, _body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        None,
        Some(ticket_batch(Uuid::new_v4(), &[1])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

// ============================================================================
// Crew assignments
// ============================================================================

#[tokio::test]
async fn crew_batch_and_delete_flow() {
    let (app, _ctx) = setup().await;
    let parent_id = Uuid::new_v4();

    let payload = json!({
        "parent_id": parent_id,
        "items": [
            { "reference_id": Uuid::new_v4(), "quantity": 1,
              "attributes": { "role": "rigger", "call_time": "2026-09-01T08:00:00Z" } },
            { "reference_id": Uuid::new_v4(), "quantity": 1,
              "attributes": { "role": "audio tech" } }
        ]
    });

    let (status, body) = request(&app, Method::POST, "/api/batch", Some(TEST_KEY), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["count"], 2);
    let first_id = body["records"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["records"][0]["role"], "rigger");
    assert_eq!(body["records"][0]["status"], "pending");
    assert_eq!(
        body["records"][0]["call_time"],
        "2026-09-01T08:00:00Z"
    );

    // Delete one assignment
    let (status, _body) = request(
        &app,
        Method::DELETE,
        &format!("/api/crew/{first_id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Deleting again is a 404, not a silent success
    let (status, _body) = request(
        &app,
        Method::DELETE,
        &format!("/api/crew/{first_id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = request(
        &app,
        Method::GET,
        &format!("/api/crew?parent_id={parent_id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(body["crew"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn crew_status_update_flow() {
    let (app, _ctx) = setup().await;

    let payload = json!({
        "parent_id": Uuid::new_v4(),
        "items": [{ "reference_id": Uuid::new_v4(), "quantity": 1,
                    "attributes": { "role": "stagehand" } }]
    });
    let (_, body) = request(&app, Method::POST, "/api/batch", Some(TEST_KEY), Some(payload)).await;
    let id = body["records"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        Method::POST,
        &format!("/api/crew/{id}/status"),
        Some(TEST_KEY),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    // Unknown status is a validation error
    let (status, _body) = request(
        &app,
        Method::POST,
        &format!("/api/crew/{id}/status"),
        Some(TEST_KEY),
        Some(json!({ "status": "vanished" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Unknown id is a 404
    let (status, _body) = request(
        &app,
        Method::POST,
        &format!("/api/crew/{}/status", Uuid::new_v4()),
        Some(TEST_KEY),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn crew_batch_requires_role() {
    let (app, _ctx) = setup().await;

    let payload = json!({
        "parent_id": Uuid::new_v4(),
        "items": [{ "reference_id": Uuid::new_v4(), "quantity": 1 }]
    });
    let (status, body) = request(&app, Method::POST, "/api/batch", Some(TEST_KEY), Some(payload)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("role"));
}

// ============================================================================
// Ticket status updates
// ============================================================================

#[tokio::test]
async fn ticket_status_update_flow() {
    let (app, _ctx) = setup().await;

    let (_, body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(Uuid::new_v4(), &[1])),
    )
    .await;
    let id = body["records"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        Method::POST,
        &format!("/api/tickets/{id}/status"),
        Some(TEST_KEY),
        Some(json!({ "status": "sold" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sold");

    // Unknown status is a validation error
    let (status, _body) = request(
        &app,
        Method::POST,
        &format!("/api/tickets/{id}/status"),
        Some(TEST_KEY),
        Some(json!({ "status": "teleported" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Unknown id is a 404
    let (status, _body) = request(
        &app,
        Method::POST,
        &format!("/api/tickets/{}/status", Uuid::new_v4()),
        Some(TEST_KEY),
        Some(json!({ "status": "sold" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ticket_delete_flow() {
    let (app, _ctx) = setup().await;
    let parent_id = Uuid::new_v4();

    let (_, body) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(parent_id, &[2])),
    )
    .await;
    let id = body["records"][0]["id"].as_str().unwrap().to_string();

    let (status, _body) = request(
        &app,
        Method::DELETE,
        &format!("/api/tickets/{id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Deleting again is a 404, not a silent success
    let (status, _body) = request(
        &app,
        Method::DELETE,
        &format!("/api/tickets/{id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = request(
        &app,
        Method::GET,
        &format!("/api/tickets?parent_id={parent_id}"),
        Some(TEST_KEY),
        None,
    )
    .await;
    assert_eq!(body["tickets"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn notification_dismissal_is_idempotent() {
    let (app, _ctx) = setup().await;

    let (_, _) = request(
        &app,
        Method::POST,
        "/api/batch/tickets",
        Some(TEST_KEY),
        Some(ticket_batch(Uuid::new_v4(), &[1])),
    )
    .await;

    let (status, body) = request(&app, Method::GET, "/api/notifications", Some(TEST_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    let notifications = body["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    let toast_id = notifications[0]["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, _body) = request(
            &app,
            Method::DELETE,
            &format!("/api/notifications/{toast_id}"),
            Some(TEST_KEY),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (_, body) = request(&app, Method::GET, "/api/notifications", Some(TEST_KEY), None).await;
    assert!(body["notifications"].as_array().unwrap().is_empty());
}

// ============================================================================
// Auth flows
// ============================================================================

#[tokio::test]
async fn password_reset_is_uniform_for_unknown_accounts() {
    let (app, _ctx) = setup().await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/password-reset",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().starts_with("If an account exists"));
}

#[tokio::test]
async fn password_reset_rejects_malformed_email() {
    let (app, _ctx) = setup().await;

    let (status, _body) = request(
        &app,
        Method::POST,
        "/api/auth/password-reset",
        None,
        Some(json!({ "email": "not-an-email" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn magic_link_rate_limit_returns_429() {
    let (app, _ctx) = setup().await;
    let payload = json!({ "email": "fan@example.com" });

    for _ in 0..3 {
        let (status, _body) = request(
            &app,
            Method::POST,
            "/api/auth/magic-link",
            None,
            Some(payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/magic-link",
        None,
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("Too many attempts"));
}
