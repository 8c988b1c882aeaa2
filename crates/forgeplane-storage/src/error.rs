use forgeplane_contracts::ErrorKind;
use thiserror::Error;

/// Error kinds C1 distinguishes (§4.1, §7). No retries happen inside this
/// crate; callers decide whether and how to retry.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// An optimistic `UPDATE ... WHERE state = $expected` touched zero rows:
    /// another writer already moved the row, or it was never in a startable
    /// state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("storage io error: {0}")]
    Io(#[from] sqlx::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound => ErrorKind::NotFound,
            StorageError::StateConflict(_) => ErrorKind::StateConflict,
            StorageError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
