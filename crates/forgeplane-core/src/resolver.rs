// Resolver (C4): given (resource-type, operation, tags, override?) returns
// the unique provider + workflow metadata, or a precise error. Also owns the
// whole-registry uniqueness check that C3 runs after every registration.

use crate::error::ResolverError;
use crate::registry::ProviderRegistry;
use forgeplane_contracts::{Operation, OperationEntry, Provider, WorkflowRef};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of resolving a resource claim to a concrete provider + workflow.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub provider: Arc<Provider>,
    pub workflow: WorkflowRef,
}

pub struct Resolver {
    registry: Arc<ProviderRegistry>,
}

impl Resolver {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve `(provider, workflow)` for `resource_type`/`operation`, given
    /// the resource's `workflow_tags`. Aliases resolve to their primary type
    /// before matching, per §4.4.
    pub async fn resolve_workflow_for_operation(
        &self,
        resource_type: &str,
        operation: Operation,
        tags: &[String],
    ) -> Result<Resolution, ResolverError> {
        let providers = self.registry.list().await;
        let matches: Vec<Arc<Provider>> = providers
            .into_iter()
            .filter(|p| p.claimed_types().contains(&resource_type))
            .collect();

        match matches.len() {
            0 => return Err(ResolverError::NoProvider(resource_type.to_string())),
            1 => {}
            _ => {
                return Err(ResolverError::AmbiguousProvider {
                    resource_type: resource_type.to_string(),
                    count: matches.len(),
                    names: matches.iter().map(|p| p.name.clone()).collect(),
                })
            }
        }

        let provider = matches.into_iter().next().unwrap();
        let entry = operation_entry_for(&provider, resource_type, operation).ok_or_else(|| {
            ResolverError::OpUnsupported {
                provider: provider.name.clone(),
                resource_type: resource_type.to_string(),
                operation: operation.to_string(),
            }
        })?;

        let workflow_name = select_workflow(&entry, tags).ok_or_else(|| ResolverError::WorkflowMissing {
            provider: provider.name.clone(),
            workflow: String::new(),
        })?;

        let workflow = provider
            .workflow_ref(&workflow_name)
            .cloned()
            .ok_or_else(|| ResolverError::WorkflowMissing {
                provider: provider.name.clone(),
                workflow: workflow_name.clone(),
            })?;

        Ok(Resolution { provider, workflow })
    }

    /// Apply a `workflow_override`: still resolve the provider via
    /// `resource_type` for routing, but replace the selected workflow with
    /// the named one, which must exist on that provider. Per Open Question
    /// 2, the override always wins over the operation-derived workflow, even
    /// if the override is declared under a different operation.
    pub async fn resolve_with_override(
        &self,
        resource_type: &str,
        operation: Operation,
        tags: &[String],
        override_workflow: &str,
    ) -> Result<Resolution, ResolverError> {
        let providers = self.registry.list().await;
        let matches: Vec<Arc<Provider>> = providers
            .into_iter()
            .filter(|p| p.claimed_types().contains(&resource_type))
            .collect();

        let provider = match matches.len() {
            0 => return Err(ResolverError::NoProvider(resource_type.to_string())),
            1 => matches.into_iter().next().unwrap(),
            _ => {
                return Err(ResolverError::AmbiguousProvider {
                    resource_type: resource_type.to_string(),
                    count: matches.len(),
                    names: matches.iter().map(|p| p.name.clone()).collect(),
                })
            }
        };

        let _ = (operation, tags);

        let workflow = provider
            .workflow_ref(override_workflow)
            .cloned()
            .ok_or_else(|| ResolverError::WorkflowMissing {
                provider: provider.name.clone(),
                workflow: override_workflow.to_string(),
            })?;

        Ok(Resolution { provider, workflow })
    }

    /// Scan the registry; for each primary resource type, assert exactly one
    /// provider claims it. Aliases do not count toward the uniqueness check.
    pub async fn validate_providers(&self) -> Result<(), ResolverError> {
        let providers = self.registry.list().await;
        let mut owners: HashMap<String, Vec<String>> = HashMap::new();

        for provider in &providers {
            for resource_type in provider.primary_types() {
                owners
                    .entry(resource_type.to_string())
                    .or_default()
                    .push(provider.name.clone());
            }
        }

        for (resource_type, names) in owners {
            if names.len() > 1 {
                return Err(ResolverError::AmbiguousProvider {
                    resource_type,
                    count: names.len(),
                    names,
                });
            }
        }

        Ok(())
    }
}

fn operation_entry_for(provider: &Provider, resource_type: &str, operation: Operation) -> Option<OperationEntry> {
    let capability = provider
        .resource_type_capabilities
        .iter()
        .find(|c| c.resource_type == resource_type || c.alias_for.as_deref() == Some(resource_type))?;

    capability
        .operations
        .iter()
        .find(|(op, _)| Operation::from(**op) == operation)
        .map(|(_, entry)| entry.clone())
}

/// If a provider declares multiple workflows per op, select the first whose
/// `tags` are a subset of the requested `tags`; else the one with no tag
/// filter; else `None` (→ `WORKFLOW_MISSING`).
///
/// The simple-form `resourceTypes` list has no per-op entries at all; in that
/// case the operation entry lookup above returns `None` before we get here,
/// which is itself folded into `OP_UNSUPPORTED` by the caller — simple-form
/// providers are expected to only ever be asked for `create`.
fn select_workflow(entry: &OperationEntry, tags: &[String]) -> Option<String> {
    if entry.tags.is_empty() {
        return Some(entry.workflow.clone());
    }
    if entry.tags.iter().all(|t| tags.contains(t)) {
        return Some(entry.workflow.clone());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeplane_contracts::{OperationEntry, OperationKey, ResourceTypeCapability, WorkflowCategory};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn provider_with_capability(name: &str, resource_type: &str, workflow: &str) -> Provider {
        let mut operations = BTreeMap::new();
        operations.insert(
            OperationKey::Create,
            OperationEntry {
                workflow: workflow.to_string(),
                tags: Vec::new(),
            },
        );
        Provider {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            category: "infra".to_string(),
            min_core_version: "0.1.0".to_string(),
            max_core_version: "99.0.0".to_string(),
            resource_types: Vec::new(),
            resource_type_capabilities: vec![ResourceTypeCapability {
                resource_type: resource_type.to_string(),
                alias_for: None,
                operations,
            }],
            workflows: vec![WorkflowRef {
                name: workflow.to_string(),
                file: format!("{workflow}.yaml"),
                category: WorkflowCategory::Provisioner,
            }],
            source_dir: PathBuf::from("/dev/null"),
        }
    }

    #[tokio::test]
    async fn resolves_unique_provider() {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(provider_with_capability("database-team", "postgres", "provision-postgres"))
            .await
            .unwrap();
        let resolver = Resolver::new(registry);

        let resolution = resolver
            .resolve_workflow_for_operation("postgres", Operation::Create, &[])
            .await
            .unwrap();
        assert_eq!(resolution.provider.name, "database-team");
        assert_eq!(resolution.workflow.name, "provision-postgres");
    }

    #[tokio::test]
    async fn no_provider_is_reported() {
        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Resolver::new(registry);
        let err = resolver
            .resolve_workflow_for_operation("postgres", Operation::Create, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::NoProvider(t) if t == "postgres"));
    }

    #[tokio::test]
    async fn ambiguous_provider_names_both_claimants() {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(provider_with_capability("team-a", "postgres", "wf-a"))
            .await
            .unwrap();
        registry
            .register(provider_with_capability("team-b", "postgres", "wf-b"))
            .await
            .unwrap();
        let resolver = Resolver::new(registry);
        let err = resolver
            .resolve_workflow_for_operation("postgres", Operation::Create, &[])
            .await
            .unwrap_err();
        match err {
            ResolverError::AmbiguousProvider { names, .. } => {
                assert_eq!(names.len(), 2);
            }
            other => panic!("expected AmbiguousProvider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn op_unsupported_when_no_delete_entry() {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(provider_with_capability("database-team", "postgres", "provision-postgres"))
            .await
            .unwrap();
        let resolver = Resolver::new(registry);
        let err = resolver
            .resolve_workflow_for_operation("postgres", Operation::Delete, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::OpUnsupported { .. }));
    }

    #[tokio::test]
    async fn validate_providers_flags_duplicate_primary_type() {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(provider_with_capability("team-a", "postgres", "wf-a"))
            .await
            .unwrap();
        registry
            .register(provider_with_capability("team-b", "postgres", "wf-b"))
            .await
            .unwrap();
        let resolver = Resolver::new(registry);
        let err = resolver.validate_providers().await.unwrap_err();
        assert!(matches!(err, ResolverError::AmbiguousProvider { .. }));
    }

    #[tokio::test]
    async fn validate_providers_ignores_aliases() {
        let registry = Arc::new(ProviderRegistry::new());
        let mut aliased = provider_with_capability("team-b", "postgresql", "wf-b");
        aliased.resource_type_capabilities[0].alias_for = Some("postgres".to_string());
        registry
            .register(provider_with_capability("team-a", "postgres", "wf-a"))
            .await
            .unwrap();
        registry.register(aliased).await.unwrap();
        let resolver = Resolver::new(registry);
        resolver.validate_providers().await.unwrap();
    }
}
