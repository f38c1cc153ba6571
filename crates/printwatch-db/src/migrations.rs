//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use printwatch_common::{Error, Result};

/// V1: image records and processing runs.
const V1_INITIAL: &str = r#"
-- One row per distinct path ever seen by the monitor
CREATE TABLE images (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    path         TEXT NOT NULL UNIQUE,
    content_hash TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'processing',
    message      TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- One row per processing attempt
CREATE TABLE runs (
    id                  TEXT PRIMARY KEY,
    image_path          TEXT NOT NULL,
    content_hash        TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'queued',
    success             INTEGER NOT NULL DEFAULT 0,
    analysis_payload    TEXT,
    listing_payload     TEXT,
    external_upload_id  TEXT,
    external_product_id TEXT,
    error_message       TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX idx_images_content_hash ON images(content_hash);
CREATE INDEX idx_runs_content_hash   ON runs(content_hash);
CREATE INDEX idx_runs_status         ON runs(status);
"#;

/// V2: processing log surfaced through the API.
const V2_PROCESSING_LOGS: &str = r#"
CREATE TABLE processing_logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    image_path TEXT,
    level      TEXT NOT NULL DEFAULT 'INFO',
    message    TEXT NOT NULL,
    details    TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX idx_processing_logs_level ON processing_logs(level);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL), (2, V2_PROCESSING_LOGS)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    let mut applied = 0;
    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        applied += 1;
    }

    Ok(applied)
}

/// Get the latest available migration version.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0)
}
