//! Printwatch-DB: Database schema, migrations, and query operations
//!
//! This crate provides durable storage for the ingestion pipeline using
//! SQLite with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Embedded schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the database schema
//! - `queries` - Query operations for image records, runs and logs
//!
//! # Example
//!
//! ```no_run
//! use printwatch_db::pool::{init_pool, get_conn};
//! use printwatch_db::queries::images;
//!
//! let pool = init_pool("./data/printwatch.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let known = images::find_by_hash(&conn, "e3b0c442...").unwrap();
//! println!("Already processed: {}", known.is_some());
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
