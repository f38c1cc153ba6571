//! Processing run operations.
//!
//! Runs are append-only: one row is created per deduplicated attempt and it
//! is finalised exactly once, to `done` or `error`.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use printwatch_common::{Error, Result, RunId};

use crate::models::{ProcessingRun, RunStatus};

const COLS: &str = "id, image_path, content_hash, status, success, analysis_payload,
    listing_payload, external_upload_id, external_product_id, error_message,
    created_at, updated_at";

/// Result fields copied onto a run when it completes successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome<'a> {
    pub analysis_payload: Option<&'a str>,
    pub listing_payload: Option<&'a str>,
    pub external_upload_id: Option<&'a str>,
    pub external_product_id: Option<&'a str>,
}

/// Create a run in `processing` state.
pub fn create_run(conn: &Connection, image_path: &str, content_hash: &str) -> Result<ProcessingRun> {
    let id = RunId::new();
    let now = Utc::now();
    let now_str = now.to_rfc3339();

    conn.execute(
        "INSERT INTO runs (id, image_path, content_hash, status, success, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'processing', 0, ?4, ?4)",
        params![id.to_string(), image_path, content_hash, &now_str],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(ProcessingRun {
        id,
        image_path: image_path.to_string(),
        content_hash: content_hash.to_string(),
        status: RunStatus::Processing,
        success: false,
        analysis_payload: None,
        listing_payload: None,
        external_upload_id: None,
        external_product_id: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    })
}

/// Get a run by ID.
pub fn get_run(conn: &Connection, id: RunId) -> Result<Option<ProcessingRun>> {
    let q = format!("SELECT {COLS} FROM runs WHERE id = ?1");
    conn.query_row(&q, [id.to_string()], ProcessingRun::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Mark a run as successfully completed.
///
/// Only non-terminal runs are updated; returns `false` otherwise.
pub fn complete_run(conn: &Connection, id: RunId, outcome: &RunOutcome<'_>) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE runs SET status = 'done', success = 1, analysis_payload = ?1,
                listing_payload = ?2, external_upload_id = ?3, external_product_id = ?4,
                error_message = NULL, updated_at = ?5
             WHERE id = ?6 AND status IN ('queued', 'processing')",
            params![
                outcome.analysis_payload,
                outcome.listing_payload,
                outcome.external_upload_id,
                outcome.external_product_id,
                now,
                id.to_string()
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Mark a run as failed.
pub fn fail_run(conn: &Connection, id: RunId, error: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE runs SET status = 'error', success = 0, error_message = ?1, updated_at = ?2
             WHERE id = ?3 AND status IN ('queued', 'processing')",
            params![error, now, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// List the most recent runs, newest first.
pub fn list_recent_runs(conn: &Connection, limit: i64) -> Result<Vec<ProcessingRun>> {
    let q = format!("SELECT {COLS} FROM runs ORDER BY created_at DESC, rowid DESC LIMIT ?1");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([limit], ProcessingRun::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// List all runs for a content hash, oldest first.
pub fn list_runs_for_hash(conn: &Connection, content_hash: &str) -> Result<Vec<ProcessingRun>> {
    let q = format!("SELECT {COLS} FROM runs WHERE content_hash = ?1 ORDER BY created_at ASC, rowid ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([content_hash], ProcessingRun::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Count all runs.
pub fn count_runs(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Count runs that produced a draft product.
pub fn count_successful_runs(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM runs WHERE success = 1", [], |row| {
        row.get(0)
    })
    .map_err(|e| Error::database(e.to_string()))
}
