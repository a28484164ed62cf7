//! Database initialization
//!
//! Creates the connection pool and the application tables on first run.
//! Schema creation is idempotent (CREATE TABLE IF NOT EXISTS), so startup
//! against an existing database is a no-op.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::Result;

/// Initialize the database pool and create tables if needed.
///
/// Accepts any sqlx SQLite URL, e.g. `sqlite://backline.db?mode=rwc` or
/// `sqlite::memory:`. In-memory databases are pinned to a single connection
/// so every query sees the same database.
pub async fn init_database(database_url: &str) -> Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:");

    let options = if in_memory {
        SqlitePoolOptions::new().max_connections(1).min_connections(1)
    } else {
        SqlitePoolOptions::new().max_connections(20).min_connections(5)
    };

    let pool = options.connect(database_url).await?;
    info!("Database connected: {}", database_url);

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    if !in_memory {
        // WAL allows concurrent readers with one writer
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    }

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tickets_table(&pool).await?;
    create_crew_assignments_table(&pool).await?;

    Ok(pool)
}

/// Tickets: one row per unit of quantity per generated line item.
/// The code is unique within its parent event.
async fn create_tickets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tickets (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL,
            ticket_type_id TEXT NOT NULL,
            code TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'available',
            price REAL,
            attributes TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            UNIQUE (event_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tickets_event ON tickets(event_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Crew assignments: one row per member per unit of quantity.
async fn create_crew_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crew_assignments (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            role TEXT NOT NULL,
            call_time TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            code TEXT NOT NULL,
            attributes TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            UNIQUE (project_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_crew_project ON crew_assignments(project_id)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_creates_schema() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('tickets', 'crew_assignments')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count.0, 2);
    }

    #[tokio::test]
    async fn init_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/backline.db?mode=rwc", dir.path().display());

        let pool = init_database(&url).await.unwrap();
        drop(pool);

        // Second init against the same file succeeds
        let pool = init_database(&url).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
