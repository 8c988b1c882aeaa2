use forgeplane_contracts::ErrorKind;
use thiserror::Error;

/// Errors raised while loading a provider from disk or git (C3).
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("invalid provider manifest at {path}: {reason}")]
    InvalidProvider { path: String, reason: String },

    #[error("provider {name:?} requires core {min}..={max}, but this core is {actual}")]
    IncompatibleVersion {
        name: String,
        min: String,
        max: String,
        actual: String,
    },

    #[error("a provider named {0:?} is already registered")]
    DuplicateName(String),

    #[error("capability conflict while registering {0:?}: {1}")]
    CapabilityConflict(String, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(String),
}

impl LoaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoaderError::InvalidProvider { .. } => ErrorKind::InvalidProvider,
            LoaderError::IncompatibleVersion { .. } => ErrorKind::IncompatibleVersion,
            LoaderError::DuplicateName(_) => ErrorKind::DuplicateName,
            LoaderError::CapabilityConflict(..) => ErrorKind::CapabilityConflict,
            LoaderError::Io(_) => ErrorKind::Io,
            LoaderError::Git(_) => ErrorKind::Io,
        }
    }
}
