// Provider registry (C2): an in-memory catalog of loaded providers, keyed by
// name. Registration is the only mutating operation and is gated entirely
// through forgeplane-providers::Loader — nothing else in this workspace calls
// `register` (see the design notes on "global mutable registry").

use crate::error::RegistryError;
use forgeplane_contracts::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide singleton catalog of providers, protected by a single
/// readers-writer lock. Reads vastly outnumber writes: only the loader (C3)
/// ever calls `register`.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider. All-or-nothing: on `DUPLICATE_NAME` the registry
    /// is left exactly as it was.
    pub async fn register(&self, provider: Provider) -> Result<(), RegistryError> {
        let mut providers = self.providers.write().await;
        if providers.contains_key(&provider.name) {
            return Err(RegistryError::DuplicateName(provider.name));
        }
        providers.insert(provider.name.clone(), Arc::new(provider));
        Ok(())
    }

    /// Remove a provider, used to roll back a registration that fails a
    /// whole-registry `ValidateProviders` pass after being added.
    pub async fn unregister(&self, name: &str) -> Option<Arc<Provider>> {
        self.providers.write().await.remove(name)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Provider>> {
        self.providers.read().await.get(name).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<Provider>> {
        self.providers.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.providers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.providers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn provider(name: &str, types: &[&str]) -> Provider {
        Provider {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            category: "infra".to_string(),
            min_core_version: "0.1.0".to_string(),
            max_core_version: "99.0.0".to_string(),
            resource_types: types.iter().map(|s| s.to_string()).collect(),
            resource_type_capabilities: Vec::new(),
            workflows: Vec::new(),
            source_dir: PathBuf::from("/dev/null"),
        }
    }

    #[tokio::test]
    async fn register_then_get_roundtrips() {
        let registry = ProviderRegistry::new();
        registry.register(provider("database-team", &["postgres"])).await.unwrap();
        let fetched = registry.get("database-team").await.unwrap();
        assert_eq!(fetched.name, "database-team");
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_and_leaves_registry_unchanged() {
        let registry = ProviderRegistry::new();
        registry.register(provider("database-team", &["postgres"])).await.unwrap();
        let err = registry
            .register(provider("database-team", &["mysql"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get("database-team").await.unwrap().resource_types, vec!["postgres"]);
    }

    #[tokio::test]
    async fn unregister_removes_entry() {
        let registry = ProviderRegistry::new();
        registry.register(provider("database-team", &["postgres"])).await.unwrap();
        assert!(registry.unregister("database-team").await.is_some());
        assert!(registry.is_empty().await);
    }
}
