//! jmon-ingest library interface
//!
//! Exposes the registry client, the engines, the ingestion coordinator and the
//! monitoring workflow for the `jmon` binary and integration tests.

pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{WorkflowError, WorkflowResult};
