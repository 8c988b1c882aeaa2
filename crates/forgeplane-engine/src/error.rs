// Error type for C6/C7. Wraps the lower layers' errors rather than
// reinventing their categories; see `ErrorKind` in forgeplane-contracts for
// the shared taxonomy every crate's error maps onto.

use forgeplane_contracts::ErrorKind;
use forgeplane_core::{ResolverError, ValidationError};
use forgeplane_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to load workflow file {path}: {reason}")]
    WorkflowLoad { path: String, reason: String },

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Storage(e) => e.kind(),
            EngineError::Resolver(e) => e.kind(),
            EngineError::Validation(e) => e.kind(),
            EngineError::WorkflowLoad { .. } => ErrorKind::Io,
            EngineError::Internal(_) => ErrorKind::Io,
        }
    }
}
