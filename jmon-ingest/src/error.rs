//! Orchestration error type

use thiserror::Error;

use crate::services::registry_client::RegistryError;

/// Failure of one workflow request
///
/// Registry failures keep their user-facing text; engine failures never get here.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] jmon_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
