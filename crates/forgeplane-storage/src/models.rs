// Database row shapes (internal) and the Create*/Update* input structs used
// to build queries. These intentionally stay separate from the domain types
// in forgeplane-contracts; conversions live in `convert.rs`.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub application_name: String,
    pub resource_name: String,
    pub resource_type: String,
    pub state: String,
    pub desired_operation: String,
    pub workflow_tags: Vec<String>,
    pub workflow_override: Option<String>,
    pub configuration: JsonValue,
    pub provider_id: Option<String>,
    pub workflow_execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateResource {
    pub application_name: String,
    pub resource_name: String,
    pub resource_type: String,
    pub desired_operation: String,
    pub workflow_tags: Vec<String>,
    pub workflow_override: Option<String>,
    pub configuration: JsonValue,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditEntryRow {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub from_state: Option<String>,
    pub to_state: String,
    pub reason: String,
    pub actor: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub application_name: String,
    pub workflow_name: String,
    pub status: String,
    pub error_message: Option<String>,
    pub inputs: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateExecution {
    pub application_name: String,
    pub workflow_name: String,
    pub inputs: JsonValue,
}

#[derive(Debug, Clone, FromRow)]
pub struct StepExecutionRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_number: i32,
    pub step_name: String,
    pub step_type: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub outputs: JsonValue,
    pub attempt: i32,
}

#[derive(Debug, Clone)]
pub struct CreateStep {
    pub execution_id: Uuid,
    pub step_number: i32,
    pub step_name: String,
    pub step_type: String,
}

/// A resource row joined with its execution's terminal status, the shape
/// `ListCompletedProvisioning` returns.
#[derive(Debug, Clone, FromRow)]
pub struct CompletedProvisioningRow {
    pub resource_id: Uuid,
    pub application_name: String,
    pub resource_name: String,
    pub execution_id: Uuid,
    pub execution_status: String,
    pub execution_error_message: Option<String>,
}
