//! Image record operations.
//!
//! The `images` table is the source of idempotence for the monitor: a content
//! hash that appears here (under any path, with any status) is never processed
//! again.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use printwatch_common::{Error, Result};

use crate::models::{ImageRecord, ImageStatus};

const COLS: &str = "id, path, content_hash, status, message, created_at, updated_at";

/// Message stored on baseline records.
pub const BASELINE_MESSAGE: &str = "Existing before monitoring started";

/// Record a file that existed before monitoring started.
///
/// Returns `true` if a new baseline record was written, `false` if the path
/// was already known (its record is left untouched).
pub fn insert_baseline(conn: &Connection, path: &str, content_hash: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO images (path, content_hash, status, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                path,
                content_hash,
                ImageStatus::Baseline.to_string(),
                BASELINE_MESSAGE,
                &now
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Create an image record with the given status.
pub fn create_image(
    conn: &Connection,
    path: &str,
    content_hash: &str,
    status: ImageStatus,
) -> Result<ImageRecord> {
    let now = Utc::now();
    let now_str = now.to_rfc3339();

    conn.execute(
        "INSERT INTO images (path, content_hash, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![path, content_hash, status.to_string(), &now_str],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(ImageRecord {
        id: conn.last_insert_rowid(),
        path: path.to_string(),
        content_hash: content_hash.to_string(),
        status,
        message: None,
        created_at: now,
        updated_at: now,
    })
}

/// Get the record for a path.
pub fn get_by_path(conn: &Connection, path: &str) -> Result<Option<ImageRecord>> {
    let q = format!("SELECT {COLS} FROM images WHERE path = ?1");
    conn.query_row(&q, [path], ImageRecord::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Find the oldest record carrying a content hash.
pub fn find_by_hash(conn: &Connection, content_hash: &str) -> Result<Option<ImageRecord>> {
    let q = format!("SELECT {COLS} FROM images WHERE content_hash = ?1 ORDER BY id ASC LIMIT 1");
    conn.query_row(&q, [content_hash], ImageRecord::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Update the status and message of the record for a path.
///
/// Baseline records are never transitioned; the update matches no rows for
/// them and `false` is returned.
pub fn update_status(
    conn: &Connection,
    path: &str,
    status: ImageStatus,
    message: Option<&str>,
) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE images SET status = ?1, message = ?2, updated_at = ?3
             WHERE path = ?4 AND status != 'baseline'",
            params![status.to_string(), message, now, path],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Count records with a given status.
pub fn count_by_status(conn: &Connection, status: ImageStatus) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM images WHERE status = ?1",
        [status.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}
