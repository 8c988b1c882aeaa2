use serde::{Deserialize, Serialize};

pub use crate::resource::Operation;

/// Category a workflow is published under; only `Goldenpath` is policy-promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowCategory {
    Provisioner,
    Goldenpath,
    Other(String),
}

/// `{name, file, category}` entry from a provider manifest's `workflows` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRef {
    pub name: String,
    pub file: String,
    pub category: WorkflowCategory,
}

/// A single `create`/`update`/`delete` entry under a resource type's `operations` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub workflow: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One entry of `capabilities.resourceTypeCapabilities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeCapability {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(rename = "aliasFor", default, skip_serializing_if = "Option::is_none")]
    pub alias_for: Option<String>,
    #[serde(default)]
    pub operations: std::collections::BTreeMap<OperationKey, OperationEntry>,
}

/// Newtype so `Operation` can key a `BTreeMap` deserialized from YAML's
/// lowercase operation names (`create`, `update`, `delete`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKey {
    Create,
    Update,
    Delete,
}

impl From<OperationKey> for Operation {
    fn from(k: OperationKey) -> Self {
        match k {
            OperationKey::Create => Operation::Create,
            OperationKey::Update => Operation::Update,
            OperationKey::Delete => Operation::Delete,
        }
    }
}

/// Catalog entry loaded from a provider manifest.
///
/// `name` is the registry key. Two providers may not claim the same primary
/// `resource_type` (aliases via `alias_for` are exempt) — enforced by the
/// resolver's `ValidateProviders`, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub version: String,
    pub category: String,
    pub min_core_version: String,
    pub max_core_version: String,
    pub resource_types: Vec<String>,
    pub resource_type_capabilities: Vec<ResourceTypeCapability>,
    pub workflows: Vec<WorkflowRef>,
    /// Absolute path to the directory the manifest was loaded from; workflow
    /// `file` entries are resolved relative to this.
    pub source_dir: std::path::PathBuf,
}

impl Provider {
    /// All resource types this provider claims, including alias entries.
    pub fn claimed_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.resource_types.iter().map(String::as_str).collect();
        types.extend(
            self.resource_type_capabilities
                .iter()
                .map(|c| c.resource_type.as_str()),
        );
        types.sort_unstable();
        types.dedup();
        types
    }

    /// Resource types this provider claims as *primary* (non-alias) owner.
    pub fn primary_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.resource_types.iter().map(String::as_str).collect();
        types.extend(
            self.resource_type_capabilities
                .iter()
                .filter(|c| c.alias_for.is_none())
                .map(|c| c.resource_type.as_str()),
        );
        types.sort_unstable();
        types.dedup();
        types
    }

    pub fn workflow_ref(&self, name: &str) -> Option<&WorkflowRef> {
        self.workflows.iter().find(|w| w.name == name)
    }
}
