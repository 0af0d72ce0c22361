//! # Judicial Monitor Common Library
//!
//! Shared code for the judicial monitor crates:
//! - Error type
//! - Configuration loading
//! - Persisted entity models
//! - SQLite schema creation
//! - Date parsing for registry payloads

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
