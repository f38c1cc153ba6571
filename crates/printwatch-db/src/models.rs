//! Internal Rust models matching the database schema.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row` selected with the column list of its query module.

use chrono::{DateTime, Utc};
use printwatch_common::RunId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Parse an RFC 3339 timestamp column.
fn parse_time(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

/// Parse a text column through `FromStr`.
fn parse_text<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_err(idx, e))
}

/// Error returned when a status/level column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

// ---------------------------------------------------------------------------
// ImageRecord
// ---------------------------------------------------------------------------

/// Processing state of a path seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// Present before monitoring started; never processed.
    Baseline,
    Processing,
    Done,
    Error,
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Processing => write!(f, "processing"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ImageStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(Self::Baseline),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            _ => Err(UnknownVariant {
                kind: "image status",
                value: s.to_string(),
            }),
        }
    }
}

/// One record per distinct filesystem path ever seen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub path: String,
    pub content_hash: String,
    pub status: ImageStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            content_hash: row.get(2)?,
            status: parse_text(row, 3)?,
            message: row.get(4)?,
            created_at: parse_time(row, 5)?,
            updated_at: parse_time(row, 6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ProcessingRun
// ---------------------------------------------------------------------------

/// Status of a single processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl RunStatus {
    /// Terminal runs are never modified again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            _ => Err(UnknownVariant {
                kind: "run status",
                value: s.to_string(),
            }),
        }
    }
}

/// One processing attempt for a distinct image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingRun {
    pub id: RunId,
    pub image_path: String,
    pub content_hash: String,
    pub status: RunStatus,
    pub success: bool,
    /// JSON-encoded image analysis.
    pub analysis_payload: Option<String>,
    /// JSON-encoded generated listing.
    pub listing_payload: Option<String>,
    pub external_upload_id: Option<String>,
    pub external_product_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRun {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        let id = Uuid::parse_str(&id).map_err(|e| conversion_err(0, e))?;
        Ok(Self {
            id: RunId::from(id),
            image_path: row.get(1)?,
            content_hash: row.get(2)?,
            status: parse_text(row, 3)?,
            success: row.get(4)?,
            analysis_payload: row.get(5)?,
            listing_payload: row.get(6)?,
            external_upload_id: row.get(7)?,
            external_product_id: row.get(8)?,
            error_message: row.get(9)?,
            created_at: parse_time(row, 10)?,
            updated_at: parse_time(row, 11)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ProcessingLog
// ---------------------------------------------------------------------------

/// Severity of a processing log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            _ => Err(UnknownVariant {
                kind: "log level",
                value: s.to_string(),
            }),
        }
    }
}

/// Persisted pipeline event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingLog {
    pub id: i64,
    pub image_path: Option<String>,
    pub level: LogLevel,
    pub message: String,
    /// JSON-encoded extra context.
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProcessingLog {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            image_path: row.get(1)?,
            level: parse_text(row, 2)?,
            message: row.get(3)?,
            details: row.get(4)?,
            created_at: parse_time(row, 5)?,
        })
    }
}
