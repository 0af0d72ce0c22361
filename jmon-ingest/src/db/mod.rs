//! Per-entity database operations
//!
//! Every function takes a generic SQLite executor, so the ingestion coordinator
//! can run several of them inside one transaction.

pub mod actions;
pub mod documents;
pub mod parties;
pub mod processes;
