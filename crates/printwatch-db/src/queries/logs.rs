//! Processing log operations.

use chrono::Utc;
use rusqlite::{params, Connection};
use printwatch_common::{Error, Result};

use crate::models::{LogLevel, ProcessingLog};

const COLS: &str = "id, image_path, level, message, details, created_at";

/// Append a log entry.
pub fn insert_log(
    conn: &Connection,
    level: LogLevel,
    message: &str,
    image_path: Option<&str>,
    details: Option<&str>,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO processing_logs (image_path, level, message, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![image_path, level.to_string(), message, details, now],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(conn.last_insert_rowid())
}

/// List the most recent log entries, newest first.
pub fn list_recent_logs(conn: &Connection, limit: i64) -> Result<Vec<ProcessingLog>> {
    let q = format!("SELECT {COLS} FROM processing_logs ORDER BY id DESC LIMIT ?1");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([limit], ProcessingLog::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Count all log entries.
pub fn count_logs(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM processing_logs", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Count log entries at a level.
pub fn count_by_level(conn: &Connection, level: LogLevel) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM processing_logs WHERE level = ?1",
        [level.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn insert_and_list() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        insert_log(&conn, LogLevel::Info, "Monitoring started", None, None).unwrap();
        insert_log(
            &conn,
            LogLevel::Error,
            "Processing failed: timeout",
            Some("/art/a.png"),
            Some(r#"{"attempt":1}"#),
        )
        .unwrap();

        let logs = list_recent_logs(&conn, 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].level, LogLevel::Error);
        assert_eq!(logs[0].image_path.as_deref(), Some("/art/a.png"));
        assert_eq!(logs[1].message, "Monitoring started");

        assert_eq!(count_logs(&conn).unwrap(), 2);
        assert_eq!(count_by_level(&conn, LogLevel::Error).unwrap(), 1);
        assert_eq!(count_by_level(&conn, LogLevel::Warn).unwrap(), 0);
    }

    #[test]
    fn list_respects_limit() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        for i in 0..5 {
            insert_log(&conn, LogLevel::Info, &format!("event {i}"), None, None).unwrap();
        }
        let logs = list_recent_logs(&conn, 3).unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].message, "event 4");
    }
}
