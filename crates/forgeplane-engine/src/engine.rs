// Orchestration engine (C7). A control loop with period `poll_interval`
// (default 5s). Each tick runs three phases in strict order: launch pending
// resources, recover orphaned ones, then reconcile completed executions.
// Phase C always runs last so a resource Phase A just launched this tick is
// never reconciled before the next one.

use crate::error::EngineError;
use crate::executor::Executor;
use crate::runner::{create_runner, WorkflowInput, WorkflowRunner};
use chrono::Utc;
use forgeplane_contracts::{EventData, EventPayload, EventType, Operation, Provider, Workflow, WorkflowExecutionStatus};
use forgeplane_core::{Config, EventBus, ProviderRegistry, Resolver};
use forgeplane_storage::models::CreateExecution;
use forgeplane_storage::Database;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct OrchestrationEngine {
    registry: Arc<ProviderRegistry>,
    resolver: Arc<Resolver>,
    db: Database,
    event_bus: EventBus,
    config: Config,
    runner: Arc<dyn WorkflowRunner>,
    workflow_cache: RwLock<HashMap<(String, String), Workflow>>,
}

impl OrchestrationEngine {
    pub fn new(registry: Arc<ProviderRegistry>, resolver: Arc<Resolver>, db: Database, event_bus: EventBus, config: Config) -> Self {
        let executor = Executor::new(db.clone(), event_bus.clone(), config.clone());
        let runner = create_runner(&config, executor);
        Self {
            registry,
            resolver,
            db,
            event_bus,
            config,
            runner,
            workflow_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loaded provider registry, exposed for status/health endpoints.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Run one tick of Phase A / B / C. Exposed separately from `run` so
    /// tests can drive single ticks deterministically.
    pub async fn tick(&self) -> Result<(), EngineError> {
        self.phase_a_launch_pending().await?;
        self.phase_b_recover_orphans().await?;
        self.phase_c_reconcile_completed().await?;
        Ok(())
    }

    /// Loop `tick()` every `poll_interval` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "orchestration tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("orchestration engine shutting down");
                        self.runner.shutdown().await;
                        break;
                    }
                }
            }
        }
    }

    async fn phase_a_launch_pending(&self) -> Result<(), EngineError> {
        let pending = self.db.list_pending_resources(100).await?;

        for resource in pending {
            let operation = Operation::from_str(&resource.desired_operation).unwrap_or(Operation::Create);

            let resolution = if let Some(override_workflow) = &resource.workflow_override {
                self.resolver
                    .resolve_with_override(&resource.resource_type, operation, &resource.workflow_tags, override_workflow)
                    .await
            } else {
                self.resolver
                    .resolve_workflow_for_operation(&resource.resource_type, operation, &resource.workflow_tags)
                    .await
            };

            let resolution = match resolution {
                Ok(r) => r,
                Err(e) => {
                    self.db
                        .update_resource_state(resource.id, "failed", &e.to_string(), "engine", Value::Null)
                        .await?;
                    self.publish(EventType::ResourceFailed, &resource.application_name, EventData {
                        resource_id: Some(resource.id),
                        resource_name: Some(resource.resource_name.clone()),
                        resource_type: Some(resource.resource_type.clone()),
                        error: Some(e.to_string()),
                        ..Default::default()
                    });
                    continue;
                }
            };

            if !self.required_platform_workflows_satisfied(&resolution.provider).await {
                tracing::warn!(
                    resource = %resource.resource_name,
                    provider = %resolution.provider.name,
                    "required platform workflows not yet satisfied; leaving resource pending"
                );
                continue;
            }

            let workflow = match self.load_workflow(&resolution.provider, &resolution.workflow.file).await {
                Ok(w) => w,
                Err(e) => {
                    self.db
                        .update_resource_state(resource.id, "failed", &e.to_string(), "engine", Value::Null)
                        .await?;
                    continue;
                }
            };

            let inputs = build_inputs(&resource, &workflow);

            let execution = self
                .db
                .insert_execution(CreateExecution {
                    application_name: resource.application_name.clone(),
                    workflow_name: resolution.workflow.name.clone(),
                    inputs: serde_json::to_value(&inputs).unwrap_or(Value::Null),
                })
                .await?;

            match self.db.attach_workflow(resource.id, &resolution.provider.name, execution.id).await {
                Ok(_) => {}
                Err(forgeplane_storage::StorageError::StateConflict(_)) => {
                    // Someone else (another engine instance, or a concurrent
                    // tick) already claimed this resource this round.
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            self.publish(EventType::ProviderResolved, &resource.application_name, EventData {
                resource_id: Some(resource.id),
                resource_name: Some(resource.resource_name.clone()),
                resource_type: Some(resource.resource_type.clone()),
                provider: Some(resolution.provider.name.clone()),
                workflow: Some(resolution.workflow.name.clone()),
                ..Default::default()
            });
            self.publish(EventType::ResourceProvisioning, &resource.application_name, EventData {
                resource_id: Some(resource.id),
                resource_name: Some(resource.resource_name.clone()),
                resource_type: Some(resource.resource_type.clone()),
                ..Default::default()
            });

            let start = self
                .runner
                .start_workflow(WorkflowInput {
                    execution_id: execution.id,
                    application_name: resource.application_name.clone(),
                    workflow,
                    inputs,
                })
                .await;
            if let Err(e) = start {
                tracing::error!(execution = %execution.id, error = %e, "failed to hand off workflow execution to runner");
            }
        }

        Ok(())
    }

    async fn phase_b_recover_orphans(&self) -> Result<(), EngineError> {
        let orphaned = self.db.list_orphaned_provisioning(self.config.orphan_threshold).await?;
        for resource in orphaned {
            self.db
                .update_resource_state(resource.id, "requested", "recovered from orphaned provisioning", "engine", Value::Null)
                .await?;
            self.publish(EventType::ResourceRecovered, &resource.application_name, EventData {
                resource_id: Some(resource.id),
                resource_name: Some(resource.resource_name.clone()),
                resource_type: Some(resource.resource_type.clone()),
                ..Default::default()
            });
        }
        Ok(())
    }

    async fn phase_c_reconcile_completed(&self) -> Result<(), EngineError> {
        let completed = self.db.list_completed_provisioning(100).await?;
        for row in completed {
            if row.execution_status == WorkflowExecutionStatus::Completed.to_string() {
                self.db
                    .update_resource_state(row.resource_id, "active", "workflow completed", "engine", Value::Null)
                    .await?;
                self.publish(EventType::ResourceActive, &row.application_name, EventData {
                    resource_id: Some(row.resource_id),
                    resource_name: Some(row.resource_name.clone()),
                    ..Default::default()
                });
            } else {
                let reason = row.execution_error_message.clone().unwrap_or_else(|| "workflow failed".to_string());
                self.db
                    .update_resource_state(row.resource_id, "failed", &reason, "engine", Value::Null)
                    .await?;
                self.publish(EventType::ResourceFailed, &row.application_name, EventData {
                    resource_id: Some(row.resource_id),
                    resource_name: Some(row.resource_name.clone()),
                    error: row.execution_error_message.clone(),
                    ..Default::default()
                });
            }
        }
        Ok(())
    }

    /// Lazily load and cache a provider's workflow file. `Loader` keeps this
    /// logic private to its own registration pass, so the engine owns an
    /// equivalent reader for workflows it needs again mid-run.
    async fn load_workflow(&self, provider: &Provider, file: &str) -> Result<Workflow, EngineError> {
        let key = (provider.name.clone(), file.to_string());
        if let Some(cached) = self.workflow_cache.read().await.get(&key) {
            return Ok(cached.clone());
        }

        let path = provider.source_dir.join(file);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| EngineError::WorkflowLoad { path: path.display().to_string(), reason: e.to_string() })?;
        let workflow: Workflow = serde_yaml::from_str(&raw)
            .map_err(|e| EngineError::WorkflowLoad { path: path.display().to_string(), reason: e.to_string() })?;

        self.workflow_cache.write().await.insert(key, workflow.clone());
        Ok(workflow)
    }

    /// Gate provisioning on `required_platform_workflows`: named workflows
    /// that must exist on the chosen provider (pre-req golden paths such as
    /// network bootstrap). We only check that the provider declares them;
    /// actually running them ahead of the resource's own workflow is left to
    /// those workflows' own scheduling as ordinary resources, since the
    /// platform team provisions them the same way as anything else.
    async fn required_platform_workflows_satisfied(&self, provider: &Provider) -> bool {
        self.config
            .required_platform_workflows
            .iter()
            .all(|name| provider.workflow_ref(name).is_some())
    }

    fn publish(&self, event_type: EventType, application: &str, data: EventData) {
        self.event_bus.publish(EventPayload::new(event_type, application, "engine").with_data(data));
    }
}

/// Build a workflow execution's `inputs`: identity fields first, then
/// stringified `configuration` entries, then workflow-declared defaults for
/// anything the resource's own configuration didn't already set.
fn build_inputs(resource: &forgeplane_storage::models::ResourceRow, workflow: &Workflow) -> HashMap<String, Value> {
    let mut inputs = HashMap::new();
    inputs.insert("app_name".to_string(), Value::String(resource.application_name.clone()));
    inputs.insert("resource_name".to_string(), Value::String(resource.resource_name.clone()));
    inputs.insert("resource_type".to_string(), Value::String(resource.resource_type.clone()));

    if let Some(obj) = resource.configuration.as_object() {
        for (k, v) in obj {
            inputs.insert(k.clone(), v.clone());
        }
    }

    for (k, v) in &workflow.variables {
        inputs.entry(k.clone()).or_insert_with(|| Value::String(v.clone()));
    }

    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use uuid::Uuid;

    fn resource_row(config: Value) -> forgeplane_storage::models::ResourceRow {
        forgeplane_storage::models::ResourceRow {
            id: Uuid::new_v4(),
            application_name: "checkout".to_string(),
            resource_name: "primary-db".to_string(),
            resource_type: "postgres".to_string(),
            state: "requested".to_string(),
            desired_operation: "create".to_string(),
            workflow_tags: Vec::new(),
            workflow_override: None,
            configuration: config,
            provider_id: None,
            workflow_execution_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn inputs_carry_identity_then_configuration_then_workflow_defaults() {
        let resource = resource_row(serde_json::json!({ "size": "large" }));
        let workflow = Workflow {
            name: "provision-postgres".to_string(),
            variables: Map::from([("region".to_string(), "us-east-1".to_string())]),
            steps: Vec::new(),
        };

        let inputs = build_inputs(&resource, &workflow);
        assert_eq!(inputs["app_name"], Value::String("checkout".to_string()));
        assert_eq!(inputs["size"], Value::String("large".to_string()));
        assert_eq!(inputs["region"], Value::String("us-east-1".to_string()));
    }

    #[test]
    fn configuration_wins_over_workflow_default_with_same_name() {
        let resource = resource_row(serde_json::json!({ "region": "eu-west-1" }));
        let workflow = Workflow {
            name: "provision-postgres".to_string(),
            variables: Map::from([("region".to_string(), "us-east-1".to_string())]),
            steps: Vec::new(),
        };

        let inputs = build_inputs(&resource, &workflow);
        assert_eq!(inputs["region"], Value::String("eu-west-1".to_string()));
    }
}
