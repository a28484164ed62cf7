//! Crew assignments repository

use backline_common::batch::GeneratedRecord;
use backline_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{QueryBuilder, SqlitePool};

use super::{attr_string, Page};

/// Statuses an assignment may move through after generation
pub const CREW_STATUSES: &[&str] = &["pending", "confirmed", "declined", "released"];

const SELECT_COLUMNS: &str =
    "id, project_id, member_id, role, call_time, status, code, attributes, created_at";

/// One persisted crew assignment
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CrewRow {
    pub id: String,
    pub project_id: String,
    pub member_id: String,
    pub role: String,
    pub call_time: Option<String>,
    pub status: String,
    pub code: String,
    /// Full attribute map as submitted; keys without a dedicated column
    /// live only here
    pub attributes: Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

impl CrewRow {
    fn from_record(record: &GeneratedRecord) -> Self {
        Self {
            id: record.id.to_string(),
            project_id: record.parent_id.to_string(),
            member_id: record.reference_id.to_string(),
            // Presence and string-ness are checked by batch validation
            role: attr_string(&record.attributes, "role").unwrap_or_default(),
            call_time: attr_string(&record.attributes, "call_time"),
            status: record.status.clone(),
            code: record.token.clone(),
            attributes: Json(record.attributes.clone()),
            created_at: record.created_at,
        }
    }
}

/// Equality filters for crew selects
#[derive(Debug, Clone, Default)]
pub struct CrewFilter {
    pub project_id: Option<String>,
    pub status: Option<String>,
}

/// Typed access to the `crew_assignments` table
pub struct CrewRepo<'a> {
    db: &'a SqlitePool,
}

impl<'a> CrewRepo<'a> {
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// Insert generated records as one multi-row statement.
    pub async fn insert_batch(&self, records: &[GeneratedRecord]) -> Result<Vec<CrewRow>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<CrewRow> = records.iter().map(CrewRow::from_record).collect();

        let mut query = QueryBuilder::new(
            "INSERT INTO crew_assignments (id, project_id, member_id, role, call_time, status, code, attributes, created_at) ",
        );
        query.push_values(&rows, |mut binder, row| {
            binder
                .push_bind(&row.id)
                .push_bind(&row.project_id)
                .push_bind(&row.member_id)
                .push_bind(&row.role)
                .push_bind(&row.call_time)
                .push_bind(&row.status)
                .push_bind(&row.code)
                .push_bind(&row.attributes)
                .push_bind(row.created_at);
        });
        query.build().execute(self.db).await?;

        Ok(rows)
    }

    /// Select with equality filters, creation order, and pagination.
    pub async fn list(&self, filter: &CrewFilter, page: Page) -> Result<Vec<CrewRow>> {
        let mut query = QueryBuilder::new(format!(
            "SELECT {SELECT_COLUMNS} FROM crew_assignments WHERE 1 = 1"
        ));
        if let Some(project_id) = &filter.project_id {
            query.push(" AND project_id = ");
            query.push_bind(project_id);
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

        let rows = query.build_query_as::<CrewRow>().fetch_all(self.db).await?;
        Ok(rows)
    }

    /// Fetch one assignment by id.
    pub async fn get(&self, id: &str) -> Result<Option<CrewRow>> {
        let row = sqlx::query_as::<_, CrewRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM crew_assignments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db)
        .await?;
        Ok(row)
    }

    /// Update an assignment's status, returning the new row state.
    pub async fn update_status(&self, id: &str, status: &str) -> Result<CrewRow> {
        let result = sqlx::query("UPDATE crew_assignments SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("crew assignment {id}")));
        }

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("crew assignment {id}")))
    }

    /// Delete one assignment, returning its last known state.
    pub async fn delete(&self, id: &str) -> Result<CrewRow> {
        let row = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("crew assignment {id}")))?;

        sqlx::query("DELETE FROM crew_assignments WHERE id = ?")
            .bind(id)
            .execute(self.db)
            .await?;

        Ok(row)
    }
}
