use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a `ResourceInstance`.
///
/// `Provisioning` is the only state that must carry a `workflow_execution_id`;
/// `Active` and `Failed` are terminal for the current `desired_operation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Requested,
    Pending,
    Provisioning,
    Active,
    Failed,
    Terminating,
    Terminated,
}

impl ResourceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ResourceState::Active | ResourceState::Failed)
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceState::Requested => "requested",
            ResourceState::Pending => "pending",
            ResourceState::Provisioning => "provisioning",
            ResourceState::Active => "active",
            ResourceState::Failed => "failed",
            ResourceState::Terminating => "terminating",
            ResourceState::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ResourceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "requested" => ResourceState::Requested,
            "pending" => ResourceState::Pending,
            "provisioning" => ResourceState::Provisioning,
            "active" => ResourceState::Active,
            "failed" => ResourceState::Failed,
            "terminating" => ResourceState::Terminating,
            "terminated" => ResourceState::Terminated,
            other => return Err(format!("unknown resource state: {other}")),
        })
    }
}

/// Lifecycle intent applied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create" => Operation::Create,
            "update" => Operation::Update,
            "delete" => Operation::Delete,
            other => return Err(format!("unknown operation: {other}")),
        })
    }
}

/// One logical resource claim belonging to a deployed application.
///
/// `(application_name, resource_name)` is unique. `state = Provisioning`
/// implies `workflow_execution_id` is set; this is enforced by
/// `AttachWorkflow` in forgeplane-storage, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: Uuid,
    pub application_name: String,
    pub resource_name: String,
    pub resource_type: String,
    pub state: ResourceState,
    pub desired_operation: Operation,
    pub workflow_tags: Vec<String>,
    pub workflow_override: Option<String>,
    pub configuration: Value,
    pub provider_id: Option<String>,
    pub workflow_execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceInstance {
    /// Reset a terminal resource to `requested` after a new `desired_operation`
    /// is recorded for it. Clears provider/workflow linkage so C7 resolves fresh.
    pub fn requeue(&mut self, operation: Operation) {
        self.desired_operation = operation;
        self.state = ResourceState::Requested;
        self.provider_id = None;
        self.workflow_execution_id = None;
    }
}

/// A single audit trail entry recorded alongside every `UpdateResourceState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub from_state: Option<ResourceState>,
    pub to_state: ResourceState,
    pub reason: String,
    pub actor: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
