// Persistence gateway (C1). Exposes narrow, transactional operations only —
// no general-purpose query builder. State transitions use
// `UPDATE ... WHERE state = $expected` for optimistic concurrency; the first
// writer wins, others observe `StorageError::StateConflict`.

use crate::error::{Result, StorageError};
use crate::models::*;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL.
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            StorageError::Io(sqlx::Error::Migrate(Box::new(e)))
        })
    }

    // ============================================
    // Resources
    // ============================================

    pub async fn create_resource(&self, input: CreateResource) -> Result<ResourceRow> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            INSERT INTO resource_instances
                (application_name, resource_name, resource_type, state, desired_operation,
                 workflow_tags, workflow_override, configuration)
            VALUES ($1, $2, $3, 'requested', $4, $5, $6, $7)
            RETURNING id, application_name, resource_name, resource_type, state, desired_operation,
                      workflow_tags, workflow_override, configuration, provider_id,
                      workflow_execution_id, created_at, updated_at
            "#,
        )
        .bind(&input.application_name)
        .bind(&input.resource_name)
        .bind(&input.resource_type)
        .bind(&input.desired_operation)
        .bind(&input.workflow_tags)
        .bind(&input.workflow_override)
        .bind(&input.configuration)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_resource(&self, id: Uuid) -> Result<ResourceRow> {
        sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT id, application_name, resource_name, resource_type, state, desired_operation,
                   workflow_tags, workflow_override, configuration, provider_id,
                   workflow_execution_id, created_at, updated_at
            FROM resource_instances
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)
    }

    /// `state ∈ {requested, pending} AND workflow_execution_id IS NULL`, FIFO.
    pub async fn list_pending_resources(&self, limit: i64) -> Result<Vec<ResourceRow>> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT id, application_name, resource_name, resource_type, state, desired_operation,
                   workflow_tags, workflow_override, configuration, provider_id,
                   workflow_execution_id, created_at, updated_at
            FROM resource_instances
            WHERE state IN ('requested', 'pending') AND workflow_execution_id IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// `state = provisioning AND workflow_execution_id IS NULL AND updated_at < now - staleAfter`.
    pub async fn list_orphaned_provisioning(&self, stale_after: Duration) -> Result<Vec<ResourceRow>> {
        let stale_after_secs = stale_after.as_secs() as f64;
        let rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT id, application_name, resource_name, resource_type, state, desired_operation,
                   workflow_tags, workflow_override, configuration, provider_id,
                   workflow_execution_id, created_at, updated_at
            FROM resource_instances
            WHERE state = 'provisioning'
              AND workflow_execution_id IS NULL
              AND updated_at < NOW() - make_interval(secs => $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(stale_after_secs)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Join resources (`provisioning`) with their executions where
    /// `status ∈ {completed, failed}`.
    pub async fn list_completed_provisioning(&self, limit: i64) -> Result<Vec<CompletedProvisioningRow>> {
        let rows = sqlx::query_as::<_, CompletedProvisioningRow>(
            r#"
            SELECT r.id AS resource_id, r.application_name, r.resource_name,
                   e.id AS execution_id, e.status AS execution_status,
                   e.error_message AS execution_error_message
            FROM resource_instances r
            JOIN workflow_executions e ON e.id = r.workflow_execution_id
            WHERE r.state = 'provisioning' AND e.status IN ('completed', 'failed')
            ORDER BY e.updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Atomic state transition plus an audit trail entry in the same
    /// transaction. Always succeeds if the resource exists (callers that
    /// need the optimistic `WHERE state = expected` semantics use
    /// `attach_workflow` instead, which is the one transition contended by
    /// multiple engine instances).
    pub async fn update_resource_state(
        &self,
        id: Uuid,
        new_state: &str,
        reason: &str,
        actor: &str,
        metadata: JsonValue,
    ) -> Result<ResourceRow> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(String,)> = sqlx::query_as("SELECT state FROM resource_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((from_state,)) = current else {
            return Err(StorageError::NotFound);
        };

        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            UPDATE resource_instances
            SET state = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, application_name, resource_name, resource_type, state, desired_operation,
                      workflow_tags, workflow_override, configuration, provider_id,
                      workflow_execution_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(new_state)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO resource_audit_log (resource_id, from_state, to_state, reason, actor, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&from_state)
        .bind(new_state)
        .bind(reason)
        .bind(actor)
        .bind(&metadata)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Single UPDATE that sets `provider_id`, `workflow_execution_id`, and
    /// `state = provisioning` together, guarded by
    /// `WHERE state IN ('requested', 'pending')`. A zero-row update means
    /// another engine instance already claimed this resource this tick.
    pub async fn attach_workflow(&self, resource_id: Uuid, provider_id: &str, execution_id: Uuid) -> Result<ResourceRow> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            UPDATE resource_instances
            SET provider_id = $2, workflow_execution_id = $3, state = 'provisioning', updated_at = NOW()
            WHERE id = $1 AND state IN ('requested', 'pending')
            RETURNING id, application_name, resource_name, resource_type, state, desired_operation,
                      workflow_tags, workflow_override, configuration, provider_id,
                      workflow_execution_id, created_at, updated_at
            "#,
        )
        .bind(resource_id)
        .bind(provider_id)
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| {
            StorageError::StateConflict(format!(
                "resource {resource_id} was not in a startable state when attach_workflow ran"
            ))
        })
    }

    // ============================================
    // Workflow executions
    // ============================================

    pub async fn insert_execution(&self, input: CreateExecution) -> Result<ExecutionRow> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            INSERT INTO workflow_executions (application_name, workflow_name, status, inputs)
            VALUES ($1, $2, 'pending', $3)
            RETURNING id, application_name, workflow_name, status, error_message, inputs, created_at, updated_at
            "#,
        )
        .bind(&input.application_name)
        .bind(&input.workflow_name)
        .bind(&input.inputs)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_execution_status(
        &self,
        id: Uuid,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<ExecutionRow> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            UPDATE workflow_executions
            SET status = $2, error_message = COALESCE($3, error_message), updated_at = NOW()
            WHERE id = $1
            RETURNING id, application_name, workflow_name, status, error_message, inputs, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(row)
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<ExecutionRow> {
        sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT id, application_name, workflow_name, status, error_message, inputs, created_at, updated_at
            FROM workflow_executions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)
    }

    pub async fn insert_step(&self, input: CreateStep) -> Result<StepExecutionRow> {
        let row = sqlx::query_as::<_, StepExecutionRow>(
            r#"
            INSERT INTO step_executions (execution_id, step_number, step_name, step_type, status, outputs, attempt)
            VALUES ($1, $2, $3, $4, 'pending', '{}'::jsonb, 1)
            RETURNING id, execution_id, step_number, step_name, step_type, status, started_at,
                      completed_at, duration_ms, error_message, outputs, attempt
            "#,
        )
        .bind(input.execution_id)
        .bind(input.step_number)
        .bind(&input.step_name)
        .bind(&input.step_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_step_status(
        &self,
        id: Uuid,
        status: &str,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        duration_ms: Option<i64>,
        error_message: Option<&str>,
        outputs: Option<JsonValue>,
    ) -> Result<StepExecutionRow> {
        let row = sqlx::query_as::<_, StepExecutionRow>(
            r#"
            UPDATE step_executions
            SET status = $2,
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at),
                duration_ms = COALESCE($5, duration_ms),
                error_message = COALESCE($6, error_message),
                outputs = COALESCE($7, outputs)
            WHERE id = $1
            RETURNING id, execution_id, step_number, step_name, step_type, status, started_at,
                      completed_at, duration_ms, error_message, outputs, attempt
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(started_at)
        .bind(completed_at)
        .bind(duration_ms)
        .bind(error_message)
        .bind(outputs)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(row)
    }

    pub async fn increment_step_attempt(&self, id: Uuid) -> Result<StepExecutionRow> {
        let row = sqlx::query_as::<_, StepExecutionRow>(
            r#"
            UPDATE step_executions
            SET attempt = attempt + 1, status = 'pending'
            WHERE id = $1
            RETURNING id, execution_id, step_number, step_name, step_type, status, started_at,
                      completed_at, duration_ms, error_message, outputs, attempt
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(row)
    }

    pub async fn list_steps_for_execution(&self, execution_id: Uuid) -> Result<Vec<StepExecutionRow>> {
        let rows = sqlx::query_as::<_, StepExecutionRow>(
            r#"
            SELECT id, execution_id, step_number, step_name, step_type, status, started_at,
                   completed_at, duration_ms, error_message, outputs, attempt
            FROM step_executions
            WHERE execution_id = $1
            ORDER BY step_number ASC
            "#,
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
