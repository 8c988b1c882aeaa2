use crate::models::{AuditEntryRow, ExecutionRow, ResourceRow, StepExecutionRow};
use forgeplane_contracts::{
    AuditEntry, Operation, ResourceInstance, ResourceState, StepExecution, StepStatus, WorkflowExecution,
    WorkflowExecutionStatus,
};
use std::collections::HashMap;
use std::str::FromStr;

impl From<ResourceRow> for ResourceInstance {
    fn from(row: ResourceRow) -> Self {
        ResourceInstance {
            id: row.id,
            application_name: row.application_name,
            resource_name: row.resource_name,
            resource_type: row.resource_type,
            state: ResourceState::from_str(&row.state).expect("DB-stored state is always valid"),
            desired_operation: Operation::from_str(&row.desired_operation)
                .expect("DB-stored operation is always valid"),
            workflow_tags: row.workflow_tags,
            workflow_override: row.workflow_override,
            configuration: row.configuration,
            provider_id: row.provider_id,
            workflow_execution_id: row.workflow_execution_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<AuditEntryRow> for AuditEntry {
    fn from(row: AuditEntryRow) -> Self {
        AuditEntry {
            id: row.id,
            resource_id: row.resource_id,
            from_state: row
                .from_state
                .map(|s| ResourceState::from_str(&s).expect("DB-stored state is always valid")),
            to_state: ResourceState::from_str(&row.to_state).expect("DB-stored state is always valid"),
            reason: row.reason,
            actor: row.actor,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

impl From<ExecutionRow> for WorkflowExecution {
    fn from(row: ExecutionRow) -> Self {
        let inputs: HashMap<String, serde_json::Value> =
            serde_json::from_value(row.inputs).unwrap_or_default();
        WorkflowExecution {
            id: row.id,
            application_name: row.application_name,
            workflow_name: row.workflow_name,
            status: execution_status_from_str(&row.status),
            error_message: row.error_message,
            inputs,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<StepExecutionRow> for StepExecution {
    fn from(row: StepExecutionRow) -> Self {
        let outputs: HashMap<String, serde_json::Value> =
            serde_json::from_value(row.outputs).unwrap_or_default();
        StepExecution {
            id: row.id,
            execution_id: row.execution_id,
            step_number: row.step_number,
            step_name: row.step_name,
            step_type: row.step_type,
            status: step_status_from_str(&row.status),
            started_at: row.started_at,
            completed_at: row.completed_at,
            duration_ms: row.duration_ms,
            error_message: row.error_message,
            outputs,
            attempt: row.attempt,
        }
    }
}

fn execution_status_from_str(s: &str) -> WorkflowExecutionStatus {
    match s {
        "pending" => WorkflowExecutionStatus::Pending,
        "running" => WorkflowExecutionStatus::Running,
        "completed" => WorkflowExecutionStatus::Completed,
        "failed" => WorkflowExecutionStatus::Failed,
        "cancelled" => WorkflowExecutionStatus::Cancelled,
        other => panic!("DB-stored execution status is always valid, got {other:?}"),
    }
}

fn step_status_from_str(s: &str) -> StepStatus {
    match s {
        "pending" => StepStatus::Pending,
        "running" => StepStatus::Running,
        "completed" => StepStatus::Completed,
        "failed" => StepStatus::Failed,
        "skipped" => StepStatus::Skipped,
        other => panic!("DB-stored step status is always valid, got {other:?}"),
    }
}
