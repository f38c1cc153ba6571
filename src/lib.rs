//! Printwatch - turns new artwork dropped into a folder into draft
//! print-on-demand products.
//!
//! This library crate exposes the core functionality for integration testing.

pub mod activity;
pub mod ai;
pub mod config;
pub mod monitor;
pub mod printify;
pub mod processor;
pub mod server;
