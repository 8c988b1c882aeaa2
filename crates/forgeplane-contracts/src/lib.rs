// Shared wire/DB types for the orchestrator core.
//
// This crate has no behavior of its own: it is the vocabulary that
// forgeplane-storage, forgeplane-core, forgeplane-providers and forgeplane-engine
// all agree on, so that a `ResourceInstance` built by one crate means the same
// thing when read by another.

pub mod error_kind;
pub mod event;
pub mod execution;
pub mod provider;
pub mod resource;
pub mod workflow;

pub use error_kind::ErrorKind;
pub use event::{EventData, EventPayload, EventType};
pub use execution::{StepExecution, StepStatus, WorkflowExecution, WorkflowExecutionStatus};
pub use provider::{OperationEntry, OperationKey, Provider, ResourceTypeCapability, WorkflowCategory, WorkflowRef};
pub use resource::{AuditEntry, Operation, ResourceInstance, ResourceState};
pub use workflow::{Backoff, RetryPolicy, Step, StepWhen, Workflow};
