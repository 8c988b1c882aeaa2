// Provider loader (C3). Reads manifests from a root directory, validates
// schema and version compatibility, loads and C5-validates every declared
// workflow, then registers into C2 and re-runs C4's whole-registry
// uniqueness check — rolling back this provider's registration on conflict.

use crate::error::LoaderError;
use crate::manifest::ProviderManifest;
use crate::version;
use forgeplane_contracts::{Provider, Workflow};
use forgeplane_core::validator::{self, ValidationContext};
use forgeplane_core::{ProviderRegistry, Resolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Loader {
    providers_root: PathBuf,
    core_version: String,
}

impl Loader {
    pub fn new(providers_root: PathBuf, core_version: impl Into<String>) -> Self {
        Self {
            providers_root,
            core_version: core_version.into(),
        }
    }

    /// Load every `<providers_root>/<name>/provider.yaml` directory, in
    /// directory-listing order, registering each into `registry`. Returns
    /// the names of providers that failed to load along with their errors;
    /// a failure for one provider does not stop the others.
    pub async fn load_all(
        &self,
        registry: &ProviderRegistry,
        resolver: &Resolver,
    ) -> std::io::Result<Vec<(String, LoaderError)>> {
        let mut failures = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.providers_root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let dir = entry.path();
            let label = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if let Err(e) = self.load_one_dir(&dir, registry, resolver).await {
                tracing::warn!(provider = %label, error = %e, "failed to load provider");
                failures.push((label, e));
            }
        }

        Ok(failures)
    }

    /// Load a single provider directory, parse+C5-validate its workflows,
    /// register into `registry`, and roll back on a `ValidateProviders`
    /// conflict.
    pub async fn load_one_dir(
        &self,
        dir: &Path,
        registry: &ProviderRegistry,
        resolver: &Resolver,
    ) -> Result<Arc<Provider>, LoaderError> {
        let manifest_path = dir.join("provider.yaml");
        let raw = tokio::fs::read_to_string(&manifest_path).await.map_err(LoaderError::Io)?;
        let manifest: ProviderManifest = serde_yaml::from_str(&raw).map_err(|e| LoaderError::InvalidProvider {
            path: manifest_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let provider = manifest.into_provider(dir);

        if !version::in_range(&self.core_version, &provider.min_core_version, &provider.max_core_version) {
            return Err(LoaderError::IncompatibleVersion {
                name: provider.name.clone(),
                min: provider.min_core_version.clone(),
                max: provider.max_core_version.clone(),
                actual: self.core_version.clone(),
            });
        }

        for workflow_ref in &provider.workflows {
            let workflow = self.load_workflow(dir, &workflow_ref.file).await?;
            let known_resource_names: Vec<String> = Vec::new();
            let ctx = ValidationContext {
                known_resource_names: &known_resource_names,
            };
            validator::validate(&workflow, &ctx).map_err(|e| LoaderError::InvalidProvider {
                path: dir.join(&workflow_ref.file).display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let name = provider.name.clone();
        registry
            .register(provider)
            .await
            .map_err(|e| LoaderError::DuplicateName(e.to_string()))?;

        if let Err(e) = resolver.validate_providers().await {
            registry.unregister(&name).await;
            return Err(LoaderError::CapabilityConflict(name, e.to_string()));
        }

        Ok(registry.get(&name).await.expect("just registered"))
    }

    async fn load_workflow(&self, provider_dir: &Path, file: &str) -> Result<Workflow, LoaderError> {
        let path = provider_dir.join(file);
        let raw = tokio::fs::read_to_string(&path).await.map_err(LoaderError::Io)?;
        serde_yaml::from_str(&raw).map_err(|e| LoaderError::InvalidProvider {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    async fn write_file(path: &Path, contents: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let mut f = tokio::fs::File::create(path).await.unwrap();
        f.write_all(contents.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn loads_valid_provider_and_registers_it() {
        let dir = std::env::temp_dir().join(format!("forgeplane-loader-test-{}", uuid::Uuid::new_v4()));
        write_file(
            &dir.join("database-team/provider.yaml"),
            r#"
apiVersion: forgeplane/v1
kind: Provider
metadata: { name: database-team, version: "1.0.0", category: infra }
compatibility: { minCoreVersion: "0.1.0", maxCoreVersion: "99.0.0" }
capabilities:
  resourceTypes: [postgres]
workflows:
  - { name: provision-postgres, file: provision-postgres.yaml, category: provisioner }
"#,
        )
        .await;
        write_file(
            &dir.join("database-team/provision-postgres.yaml"),
            r#"
name: provision-postgres
steps:
  - name: create-db
    type: policy
    config:
      script: "exit 0"
"#,
        )
        .await;

        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Resolver::new(registry.clone());
        let loader = Loader::new(dir.clone(), "1.0.0");

        let failures = loader.load_all(&registry, &resolver).await.unwrap();
        assert!(failures.is_empty(), "unexpected failures: {failures:?}");
        assert!(registry.get("database-team").await.is_some());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn incompatible_core_version_is_rejected() {
        let dir = std::env::temp_dir().join(format!("forgeplane-loader-test-{}", uuid::Uuid::new_v4()));
        write_file(
            &dir.join("old-team/provider.yaml"),
            r#"
apiVersion: forgeplane/v1
kind: Provider
metadata: { name: old-team, version: "1.0.0", category: infra }
compatibility: { minCoreVersion: "0.1.0", maxCoreVersion: "0.5.0" }
capabilities:
  resourceTypes: [postgres]
workflows: []
"#,
        )
        .await;

        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Resolver::new(registry.clone());
        let loader = Loader::new(dir.clone(), "1.0.0");

        let failures = loader.load_all(&registry, &resolver).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, LoaderError::IncompatibleVersion { .. }));
        assert!(registry.get("old-team").await.is_none());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn capability_conflict_rolls_back_registration() {
        let dir = std::env::temp_dir().join(format!("forgeplane-loader-test-{}", uuid::Uuid::new_v4()));
        for (team, version_ok) in [("team-a", true), ("team-b", true)] {
            write_file(
                &dir.join(format!("{team}/provider.yaml")),
                &format!(
                    r#"
apiVersion: forgeplane/v1
kind: Provider
metadata: {{ name: {team}, version: "1.0.0", category: infra }}
compatibility: {{ minCoreVersion: "0.1.0", maxCoreVersion: "99.0.0" }}
capabilities:
  resourceTypes: [postgres]
workflows: []
"#
                ),
            )
            .await;
            assert!(version_ok);
        }

        let registry = Arc::new(ProviderRegistry::new());
        let resolver = Resolver::new(registry.clone());
        let loader = Loader::new(dir.clone(), "1.0.0");

        let failures = loader.load_all(&registry, &resolver).await.unwrap();
        // Exactly one of the two providers loaded cleanly; the second hits
        // the capability conflict and is rolled back.
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, LoaderError::CapabilityConflict(..)));
        assert_eq!(registry.len().await, 1);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
