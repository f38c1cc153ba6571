//! Pipeline event recording.
//!
//! Every event goes to `tracing` and is also appended to the
//! `processing_logs` table so the dashboard can show it. A failure to persist
//! the row is only logged.

use printwatch_db::models::LogLevel;
use printwatch_db::pool::DbPool;
use printwatch_db::queries::logs;
use serde_json::Value;

/// Record a pipeline event.
pub fn record(
    pool: &DbPool,
    level: LogLevel,
    message: &str,
    image_path: Option<&str>,
    details: Option<&Value>,
) {
    match level {
        LogLevel::Info => tracing::info!(image = image_path, "{}", message),
        LogLevel::Warn => tracing::warn!(image = image_path, "{}", message),
        LogLevel::Error => tracing::error!(image = image_path, "{}", message),
    }

    let details = details.map(Value::to_string);
    let result = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|conn| {
            logs::insert_log(&conn, level, message, image_path, details.as_deref())
                .map_err(|e| e.to_string())
        });

    if let Err(e) = result {
        tracing::warn!("Failed to persist processing log: {}", e);
    }
}

pub fn info(pool: &DbPool, message: &str, image_path: Option<&str>) {
    record(pool, LogLevel::Info, message, image_path, None);
}

pub fn warn(pool: &DbPool, message: &str, image_path: Option<&str>) {
    record(pool, LogLevel::Warn, message, image_path, None);
}

pub fn error(pool: &DbPool, message: &str, image_path: Option<&str>) {
    record(pool, LogLevel::Error, message, image_path, None);
}
