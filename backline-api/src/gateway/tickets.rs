//! Tickets repository
//!
//! Batch inserts are one multi-row statement: the whole call commits or
//! fails in a single round trip. Concurrent independent calls are not
//! coordinated here.

use backline_common::batch::GeneratedRecord;
use backline_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{QueryBuilder, SqlitePool};

use super::Page;

/// Statuses a ticket may move through after generation
pub const TICKET_STATUSES: &[&str] = &["available", "reserved", "sold", "checked_in", "void"];

const SELECT_COLUMNS: &str =
    "id, event_id, ticket_type_id, code, status, price, attributes, created_at";

/// One persisted ticket
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketRow {
    pub id: String,
    pub event_id: String,
    pub ticket_type_id: String,
    pub code: String,
    pub status: String,
    pub price: Option<f64>,
    /// Full attribute map as submitted; keys without a dedicated column
    /// (seat, section, ...) live only here
    pub attributes: Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

impl TicketRow {
    fn from_record(record: &GeneratedRecord) -> Self {
        Self {
            id: record.id.to_string(),
            event_id: record.parent_id.to_string(),
            ticket_type_id: record.reference_id.to_string(),
            code: record.token.clone(),
            status: record.status.clone(),
            // Validation has already required a numeric price
            price: record.attributes.get("price").and_then(Value::as_f64),
            attributes: Json(record.attributes.clone()),
            created_at: record.created_at,
        }
    }
}

/// Equality filters for ticket selects
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub event_id: Option<String>,
    pub status: Option<String>,
}

/// Typed access to the `tickets` table
pub struct TicketRepo<'a> {
    db: &'a SqlitePool,
}

impl<'a> TicketRepo<'a> {
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// Insert generated records as one multi-row statement.
    ///
    /// Returns the rows as written, in record order.
    pub async fn insert_batch(&self, records: &[GeneratedRecord]) -> Result<Vec<TicketRow>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<TicketRow> = records.iter().map(TicketRow::from_record).collect();

        let mut query = QueryBuilder::new(
            "INSERT INTO tickets (id, event_id, ticket_type_id, code, status, price, attributes, created_at) ",
        );
        query.push_values(&rows, |mut binder, row| {
            binder
                .push_bind(&row.id)
                .push_bind(&row.event_id)
                .push_bind(&row.ticket_type_id)
                .push_bind(&row.code)
                .push_bind(&row.status)
                .push_bind(row.price)
                .push_bind(&row.attributes)
                .push_bind(row.created_at);
        });
        query.build().execute(self.db).await?;

        Ok(rows)
    }

    /// Select with equality filters, creation order, and pagination.
    pub async fn list(&self, filter: &TicketFilter, page: Page) -> Result<Vec<TicketRow>> {
        let mut query =
            QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM tickets WHERE 1 = 1"));
        if let Some(event_id) = &filter.event_id {
            query.push(" AND event_id = ");
            query.push_bind(event_id);
        }
        if let Some(status) = &filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        query.push(" ORDER BY created_at, code");
        query.push(" LIMIT ");
        query.push_bind(page.limit.unwrap_or(-1));
        if let Some(offset) = page.offset {
            query.push(" OFFSET ");
            query.push_bind(offset);
        }

        let rows = query
            .build_query_as::<TicketRow>()
            .fetch_all(self.db)
            .await?;
        Ok(rows)
    }

    /// Fetch one ticket by id.
    pub async fn get(&self, id: &str) -> Result<Option<TicketRow>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM tickets WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db)
        .await?;
        Ok(row)
    }

    /// Update a ticket's status, returning the new row state.
    pub async fn update_status(&self, id: &str, status: &str) -> Result<TicketRow> {
        let result = sqlx::query("UPDATE tickets SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("ticket {id}")));
        }

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {id}")))
    }

    /// Delete one ticket, returning its last known state.
    pub async fn delete(&self, id: &str) -> Result<TicketRow> {
        let row = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {id}")))?;

        sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id)
            .execute(self.db)
            .await?;

        Ok(row)
    }
}
