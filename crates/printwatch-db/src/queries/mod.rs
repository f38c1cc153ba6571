//! Database query modules.
//!
//! - images: per-path image records keyed by content hash
//! - runs: append-only processing attempts
//! - logs: processing log entries
//! - recovery: cleanup of work interrupted by a crash

pub mod images;
pub mod logs;
pub mod recovery;
pub mod runs;
