// On-disk provider manifest shape (§6) and its conversion into the runtime
// `forgeplane_contracts::Provider` the registry stores.

use forgeplane_contracts::{
    OperationEntry, OperationKey, Provider, ResourceTypeCapability, WorkflowCategory, WorkflowRef,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
    pub version: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestCompatibility {
    #[serde(rename = "minCoreVersion")]
    pub min_core_version: String,
    #[serde(rename = "maxCoreVersion")]
    pub max_core_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ManifestCapabilities {
    #[serde(rename = "resourceTypes", default)]
    pub resource_types: Vec<String>,
    #[serde(rename = "resourceTypeCapabilities", default)]
    pub resource_type_capabilities: Vec<ManifestResourceTypeCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestResourceTypeCapability {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(rename = "aliasFor", default)]
    pub alias_for: Option<String>,
    #[serde(default)]
    pub operations: BTreeMap<OperationKey, OperationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestWorkflowRef {
    pub name: String,
    pub file: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "provisioner".to_string()
}

/// Top-level shape of a provider manifest YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ManifestMetadata,
    pub compatibility: ManifestCompatibility,
    #[serde(default)]
    pub capabilities: ManifestCapabilities,
    pub workflows: Vec<ManifestWorkflowRef>,
}

impl ProviderManifest {
    pub fn into_provider(self, source_dir: &Path) -> Provider {
        let resource_type_capabilities = self
            .capabilities
            .resource_type_capabilities
            .into_iter()
            .map(|c| ResourceTypeCapability {
                resource_type: c.resource_type,
                alias_for: c.alias_for,
                operations: c.operations,
            })
            .collect();

        let workflows = self
            .workflows
            .into_iter()
            .map(|w| WorkflowRef {
                name: w.name,
                file: w.file,
                category: match w.category.as_str() {
                    "provisioner" => WorkflowCategory::Provisioner,
                    "goldenpath" => WorkflowCategory::Goldenpath,
                    other => WorkflowCategory::Other(other.to_string()),
                },
            })
            .collect();

        Provider {
            name: self.metadata.name,
            version: self.metadata.version,
            category: self.metadata.category,
            min_core_version: self.compatibility.min_core_version,
            max_core_version: self.compatibility.max_core_version,
            resource_types: self.capabilities.resource_types,
            resource_type_capabilities,
            workflows,
            source_dir: source_dir.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_form_manifest() {
        let yaml = r#"
apiVersion: forgeplane/v1
kind: Provider
metadata: { name: database-team, version: "1.0.0", category: infra }
compatibility: { minCoreVersion: "0.1.0", maxCoreVersion: "99.0.0" }
capabilities:
  resourceTypes: [postgres]
workflows:
  - { name: provision-postgres, file: provision-postgres.yaml, category: provisioner }
"#;
        let manifest: ProviderManifest = serde_yaml::from_str(yaml).unwrap();
        let provider = manifest.into_provider(Path::new("/providers/database-team"));
        assert_eq!(provider.name, "database-team");
        assert_eq!(provider.resource_types, vec!["postgres"]);
        assert_eq!(provider.workflows.len(), 1);
    }

    #[test]
    fn parses_advanced_form_manifest_with_operations() {
        let yaml = r#"
apiVersion: forgeplane/v1
kind: Provider
metadata: { name: database-team, version: "1.0.0", category: infra }
compatibility: { minCoreVersion: "0.1.0", maxCoreVersion: "99.0.0" }
capabilities:
  resourceTypeCapabilities:
    - type: postgres
      operations:
        create: { workflow: provision-postgres, tags: [] }
        delete: { workflow: deprovision-postgres, tags: [] }
workflows:
  - { name: provision-postgres, file: provision-postgres.yaml, category: provisioner }
  - { name: deprovision-postgres, file: deprovision-postgres.yaml, category: provisioner }
"#;
        let manifest: ProviderManifest = serde_yaml::from_str(yaml).unwrap();
        let provider = manifest.into_provider(Path::new("/providers/database-team"));
        assert_eq!(provider.resource_type_capabilities.len(), 1);
        assert_eq!(provider.resource_type_capabilities[0].operations.len(), 2);
    }
}
