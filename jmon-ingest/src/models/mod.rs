//! Data models for the ingest crate

pub mod registry;

pub use registry::*;
