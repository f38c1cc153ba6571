//! Printwatch-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across printwatch:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for processing runs
//! - **Path Utilities**: Detection of eligible artwork files by extension
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use printwatch_common::{RunId, Error, Result};
//! use printwatch_common::paths::is_eligible_image;
//! use std::path::Path;
//!
//! let run_id = RunId::new();
//!
//! assert!(is_eligible_image(Path::new("design.PNG")));
//! assert!(!is_eligible_image(Path::new("notes.txt")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("run"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
