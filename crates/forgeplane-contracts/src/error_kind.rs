use serde::{Deserialize, Serialize};

/// Semantic error category, shared across crate-local `thiserror` enums so
/// that a resource's recorded failure reason can be matched on without
/// depending on which crate raised it. See §7 of the design doc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Configuration — surfaced at load time, never retried.
    InvalidProvider,
    IncompatibleVersion,
    DuplicateName,
    CapabilityConflict,

    // Resolution — resource goes straight to `failed`.
    NoProvider,
    AmbiguousProvider,
    OpUnsupported,
    WorkflowMissing,

    // Validation — fatal for the step.
    WorkflowInvalid,
    InterpolationError,
    ExprError,

    // Execution/backend.
    Retryable,
    Permanent,

    // Concurrency — benign, loser backs off.
    StateConflict,

    // Infrastructure.
    Io,
    DbUnavailable,

    NotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
