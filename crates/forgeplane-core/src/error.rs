use forgeplane_contracts::ErrorKind;
use thiserror::Error;

/// Errors raised while resolving a provider + workflow for a resource claim (C4).
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no provider claims resource type {0:?}")]
    NoProvider(String),

    #[error("{count} providers claim resource type {resource_type:?}: {names:?}")]
    AmbiguousProvider {
        resource_type: String,
        count: usize,
        names: Vec<String>,
    },

    #[error("provider {provider:?} does not support operation {operation:?} for type {resource_type:?}")]
    OpUnsupported {
        provider: String,
        resource_type: String,
        operation: String,
    },

    #[error("workflow {workflow:?} is not present on provider {provider:?}")]
    WorkflowMissing { provider: String, workflow: String },
}

impl ResolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolverError::NoProvider(_) => ErrorKind::NoProvider,
            ResolverError::AmbiguousProvider { .. } => ErrorKind::AmbiguousProvider,
            ResolverError::OpUnsupported { .. } => ErrorKind::OpUnsupported,
            ResolverError::WorkflowMissing { .. } => ErrorKind::WorkflowMissing,
        }
    }
}

/// Errors raised while statically validating a workflow (C5).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("workflow is invalid: {0:?}")]
    WorkflowInvalid(Vec<String>),

    #[error("step graph contains a cycle: {0:?}")]
    Cycle(Vec<String>),

    #[error("interpolation error: {0}")]
    InterpolationError(String),

    #[error("expression error: {0}")]
    ExprError(String),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::WorkflowInvalid(_) => ErrorKind::WorkflowInvalid,
            ValidationError::Cycle(_) => ErrorKind::WorkflowInvalid,
            ValidationError::InterpolationError(_) => ErrorKind::InterpolationError,
            ValidationError::ExprError(_) => ErrorKind::ExprError,
        }
    }
}

/// Errors raised by the in-process provider registry (C2).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a provider named {0:?} is already registered")]
    DuplicateName(String),

    #[error("no provider named {0:?} is registered")]
    NotFound(String),

    #[error("capability conflict: providers {0:?} all claim resource type {1:?}")]
    CapabilityConflict(Vec<String>, String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::DuplicateName(_) => ErrorKind::DuplicateName,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::CapabilityConflict(..) => ErrorKind::CapabilityConflict,
        }
    }
}
