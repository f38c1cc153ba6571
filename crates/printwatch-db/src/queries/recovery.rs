//! Cleanup of work interrupted by a previous crash.
//!
//! A run left in `processing` means the process died while the external
//! processor was running. The draft may or may not exist remotely, so the
//! attempt is closed as an error rather than retried.

use chrono::Utc;
use rusqlite::{params, Connection};
use printwatch_common::{Error, Result};

/// Message stored on runs and images closed by [`fail_orphaned`].
pub const INTERRUPTED_MESSAGE: &str = "Interrupted before completion";

/// Mark runs and image records stuck in a non-terminal state as errors.
///
/// Returns the number of runs that were closed.
pub fn fail_orphaned(conn: &Connection) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let runs = tx
        .execute(
            "UPDATE runs SET status = 'error', success = 0, error_message = ?1, updated_at = ?2
             WHERE status IN ('queued', 'processing')",
            params![INTERRUPTED_MESSAGE, &now],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    tx.execute(
        "UPDATE images SET status = 'error', message = ?1, updated_at = ?2
         WHERE status = 'processing'",
        params![INTERRUPTED_MESSAGE, &now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(runs)
}
