// Executor (C6) — the hardest subsystem. Runs one workflow's step DAG to
// completion: `Execute(app, workflowName, workflowDef, inputs) -> (executionId, status)`.
//
// Scheduling model: a bounded worker pool (size = `max_concurrent_steps_per_workflow`)
// drains a ready-queue built from Kahn's algorithm over the *effective*
// dependency graph — explicit `depends_on` plus an implicit edge from each
// step to its textual successor, unless that successor is `parallel: true`
// or shares a `parallel_group` with it. A step only becomes ready once every
// predecessor has reached a terminal status (`completed`, `failed`, or
// `skipped`); eligibility (`when`/`if`/`unless`) is then evaluated at the
// moment a step becomes ready, not at graph-build time.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use chrono::Utc;
use forgeplane_contracts::{Backoff, RetryPolicy, Step, StepStatus, Workflow, WorkflowExecutionStatus};
use forgeplane_core::dag::StepGraph;
use forgeplane_core::Config;
use forgeplane_core::EventBus;
use forgeplane_contracts::{EventData, EventPayload, EventType};
use forgeplane_providers::{BackendError, StepContext};
use forgeplane_storage::models::{CreateExecution, CreateStep};
use forgeplane_storage::Database;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct Executor {
    db: Database,
    event_bus: EventBus,
    config: Config,
}

impl Executor {
    pub fn new(db: Database, event_bus: EventBus, config: Config) -> Self {
        Self { db, event_bus, config }
    }

    /// The public C6 contract: create a fresh execution row and run it to
    /// completion. Used directly by tools that run a workflow outside the
    /// resource lifecycle (e.g. a CLI dry-run).
    pub async fn execute(
        &self,
        application_name: &str,
        workflow_name: &str,
        workflow: &Workflow,
        inputs: HashMap<String, Value>,
    ) -> Result<(Uuid, WorkflowExecutionStatus), EngineError> {
        let execution = self
            .db
            .insert_execution(CreateExecution {
                application_name: application_name.to_string(),
                workflow_name: workflow_name.to_string(),
                inputs: serde_json::to_value(&inputs).unwrap_or(Value::Null),
            })
            .await?;

        let status = self.run_attached(application_name, execution.id, workflow, inputs).await?;
        Ok((execution.id, status))
    }

    /// Run a workflow against an execution row the caller already created
    /// (C7 creates it itself so it can `attach_workflow` before handing off,
    /// which the plain `execute` entry point can't do since it owns
    /// creation of the row).
    pub async fn run_attached(
        &self,
        application_name: &str,
        execution_id: Uuid,
        workflow: &Workflow,
        inputs: HashMap<String, Value>,
    ) -> Result<WorkflowExecutionStatus, EngineError> {
        self.db.update_execution_status(execution_id, "running", None).await?;

        let effective_deps = build_effective_depends_on(&workflow.steps);
        let dep_slices: Vec<(&str, &[String])> = workflow
            .steps
            .iter()
            .map(|s| (s.name.as_str(), effective_deps.get(s.name.as_str()).map(Vec::as_slice).unwrap_or(&[])))
            .collect();
        let graph = StepGraph::build(&dep_slices);
        if let Err(cycle) = graph.topo_sort() {
            return Err(EngineError::Internal(format!(
                "effective step graph for {:?} contains a cycle: {cycle:?}",
                workflow.name
            )));
        }

        let mut step_rows = HashMap::with_capacity(workflow.steps.len());
        for (i, step) in workflow.steps.iter().enumerate() {
            let row = self
                .db
                .insert_step(CreateStep {
                    execution_id,
                    step_number: i as i32,
                    step_name: step.name.clone(),
                    step_type: step.step_type.clone(),
                })
                .await?;
            step_rows.insert(step.name.as_str(), row);
        }

        let step_by_name: HashMap<&str, &Step> = workflow.steps.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for step in &workflow.steps {
            in_degree.entry(step.name.as_str()).or_insert(0);
            dependents.entry(step.name.as_str()).or_default();
        }
        for step in &workflow.steps {
            let deps = effective_deps.get(step.name.as_str()).cloned().unwrap_or_default();
            *in_degree.get_mut(step.name.as_str()).unwrap() = deps.len();
            for dep in &deps {
                dependents.entry(dep.as_str()).or_default().push(step.name.as_str());
            }
        }

        let mut ready: VecDeque<&str> = {
            let mut v: Vec<&str> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(n, _)| *n).collect();
            v.sort_unstable();
            v.into()
        };

        let mut context = ExecutionContext::new(workflow.variables.clone(), stringify_inputs(&inputs));
        let mut any_failed = false;
        let mut terminal: HashMap<String, StepStatus> = HashMap::new();
        let pool_size = self.config.max_concurrent_steps_per_workflow.max(1);
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < pool_size {
                let Some(name) = ready.pop_front() else { break };
                let step = step_by_name[name];
                let row = step_rows[name].clone();

                match prepare_step(step, &context, any_failed, &self.config.allowed_step_types) {
                    Eligibility::Skip => {
                        self.db.update_step_status(row.id, "skipped", None, Some(Utc::now()), None, None, None).await?;
                        terminal.insert(name.to_string(), StepStatus::Skipped);
                        advance(name, &dependents, &mut in_degree, &mut ready);
                    }
                    Eligibility::Fail(msg) => {
                        any_failed = true;
                        self.db
                            .update_step_status(row.id, "failed", None, Some(Utc::now()), None, Some(&msg), None)
                            .await?;
                        self.emit_step_event(application_name, &workflow.name, name, EventType::StepFailed, Some(msg));
                        terminal.insert(name.to_string(), StepStatus::Failed);
                        advance(name, &dependents, &mut in_degree, &mut ready);
                    }
                    Eligibility::Run { config, env } => {
                        self.db
                            .update_step_status(row.id, "running", Some(Utc::now()), None, None, None, None)
                            .await?;
                        self.emit_step_event(application_name, &workflow.name, name, EventType::StepStarted, None);
                        in_flight.push(run_step(self.db.clone(), step.clone(), row, config, env));
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            let Some(result) = in_flight.next().await else { break };
            match result.status {
                StepStatus::Completed => {
                    context.record_step_outputs(&result.name, result.outputs.clone());
                    context.apply_set_variables(&step_by_name[result.name.as_str()].config, &result.outputs);
                    self.emit_step_event(application_name, &workflow.name, &result.name, EventType::StepCompleted, None);
                }
                StepStatus::Failed => {
                    any_failed = true;
                    self.emit_step_event(
                        application_name,
                        &workflow.name,
                        &result.name,
                        EventType::StepFailed,
                        result.error.clone(),
                    );
                }
                _ => {}
            }
            terminal.insert(result.name.clone(), result.status);
            advance(&result.name, &dependents, &mut in_degree, &mut ready);
        }

        let overall = if terminal.values().any(|s| *s == StepStatus::Failed) {
            WorkflowExecutionStatus::Failed
        } else {
            WorkflowExecutionStatus::Completed
        };
        self.db.update_execution_status(execution_id, &overall.to_string(), None).await?;
        Ok(overall)
    }

    fn emit_step_event(&self, application: &str, workflow_name: &str, step_name: &str, event_type: EventType, error: Option<String>) {
        let data = EventData {
            workflow: Some(workflow_name.to_string()),
            new_state: Some(format!("step:{step_name}")),
            error,
            ..Default::default()
        };
        self.event_bus.publish(EventPayload::new(event_type, application, "executor").with_data(data));
    }
}

enum Eligibility {
    Skip,
    Fail(String),
    Run { config: HashMap<String, Value>, env: HashMap<String, String> },
}

fn prepare_step(step: &Step, ctx: &ExecutionContext, any_failed: bool, allowed_step_types: &Option<Vec<String>>) -> Eligibility {
    use forgeplane_contracts::StepWhen;

    let when_ok = match step.when {
        StepWhen::OnSuccess => !any_failed,
        StepWhen::OnFailure => any_failed,
        StepWhen::Always => true,
    };
    if !when_ok {
        return Eligibility::Skip;
    }

    if let Some(allowed) = allowed_step_types {
        if !allowed.iter().any(|t| t == &step.step_type) {
            return Eligibility::Fail(format!("step type {:?} is not in allowed_step_types", step.step_type));
        }
    }

    if let Some(expr) = &step.if_expr {
        match ctx.interpolate(expr).map(|s| forgeplane_core::expression::evaluate(&s)) {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => return Eligibility::Skip,
            Ok(Err(e)) => return Eligibility::Fail(e.to_string()),
            Err(e) => return Eligibility::Fail(e.to_string()),
        }
    }

    if let Some(expr) = &step.unless {
        match ctx.interpolate(expr).map(|s| forgeplane_core::expression::evaluate_negated(&s)) {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => return Eligibility::Skip,
            Ok(Err(e)) => return Eligibility::Fail(e.to_string()),
            Err(e) => return Eligibility::Fail(e.to_string()),
        }
    }

    let config = match ctx.interpolate_config(&step.config) {
        Ok(c) => c,
        Err(e) => return Eligibility::Fail(e.to_string()),
    };
    let env = match ctx.interpolate_env(&step.env) {
        Ok(e) => e,
        Err(e) => return Eligibility::Fail(e.to_string()),
    };

    Eligibility::Run { config, env }
}

fn advance<'w>(name: &str, dependents: &HashMap<&'w str, Vec<&'w str>>, in_degree: &mut HashMap<&'w str, usize>, ready: &mut VecDeque<&'w str>) {
    let Some(succs) = dependents.get(name) else { return };
    let mut newly_ready = Vec::new();
    for succ in succs {
        if let Some(d) = in_degree.get_mut(succ) {
            *d = d.saturating_sub(1);
            if *d == 0 {
                newly_ready.push(*succ);
            }
        }
    }
    newly_ready.sort_unstable();
    ready.extend(newly_ready);
}

/// Combine explicit `depends_on` with the implicit textual-successor edge:
/// by default each step depends on the one declared before it, unless it is
/// `parallel: true` or shares a `parallel_group` with its predecessor.
fn build_effective_depends_on(steps: &[Step]) -> HashMap<&str, Vec<String>> {
    let mut deps: HashMap<&str, Vec<String>> = HashMap::new();
    for (i, step) in steps.iter().enumerate() {
        let mut d = step.depends_on.clone();
        if i > 0 {
            let prev = &steps[i - 1];
            let same_cohort = step.parallel
                || matches!((step.parallel_group, prev.parallel_group), (Some(a), Some(b)) if a == b);
            if !same_cohort && !d.contains(&prev.name) {
                d.push(prev.name.clone());
            }
        }
        deps.insert(step.name.as_str(), d);
    }
    deps
}

fn stringify_inputs(inputs: &HashMap<String, Value>) -> HashMap<String, String> {
    inputs
        .iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), s)
        })
        .collect()
}

struct StepRunResult {
    name: String,
    status: StepStatus,
    outputs: HashMap<String, Value>,
    error: Option<String>,
}

async fn run_step(
    db: Database,
    step: Step,
    row: forgeplane_storage::models::StepExecutionRow,
    config: HashMap<String, Value>,
    env: HashMap<String, String>,
) -> StepRunResult {
    let backend = match forgeplane_providers::create_backend(&step.step_type) {
        Ok(b) => b,
        Err(e) => return finish_failed(&db, &row, &step, &e).await,
    };

    let attempts_allowed = step.retry.as_ref().map(|r| r.attempts).unwrap_or(1).max(1);
    let mut attempt: u32 = 1;
    let started = Utc::now();

    loop {
        let ctx = StepContext {
            step_name: step.name.clone(),
            config: config.clone(),
            env: env.clone(),
        };
        let call = backend.run(&ctx);
        let outcome = match step.timeout_seconds {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), call).await {
                Ok(r) => r,
                Err(_) => Err(BackendError::Retryable(format!("step {:?} timed out after {secs}s", step.name))),
            },
            None => call.await,
        };

        match outcome {
            Ok(outcome) => {
                let declared = match collect_declared_outputs(&step, &outcome.outputs).await {
                    Ok(d) => d,
                    Err(e) => return finish_failed(&db, &row, &step, &e).await,
                };

                let mut persisted = outcome.outputs.clone();
                for (k, v) in &declared {
                    persisted.insert(k.clone(), v.clone());
                }

                let duration_ms = (Utc::now() - started).num_milliseconds();
                if let Err(e) = db
                    .update_step_status(
                        row.id,
                        "completed",
                        None,
                        Some(Utc::now()),
                        Some(duration_ms),
                        None,
                        Some(serde_json::to_value(&persisted).unwrap_or(Value::Null)),
                    )
                    .await
                {
                    tracing::error!(step = %step.name, error = %e, "failed to persist step completion");
                }

                return StepRunResult {
                    name: step.name.clone(),
                    status: StepStatus::Completed,
                    outputs: declared,
                    error: None,
                };
            }
            Err(BackendError::Permanent(msg)) => return finish_failed(&db, &row, &step, &msg).await,
            Err(BackendError::Retryable(msg)) => {
                if attempt >= attempts_allowed {
                    return finish_failed(&db, &row, &step, &msg).await;
                }
                if let Err(e) = db.increment_step_attempt(row.id).await {
                    tracing::error!(step = %step.name, error = %e, "failed to record retry attempt");
                }
                let delay = backoff_delay(step.retry.as_ref(), attempt);
                attempt += 1;
                tokio::time::sleep(delay).await;
                continue;
            }
        }
    }
}

async fn finish_failed(db: &Database, row: &forgeplane_storage::models::StepExecutionRow, step: &Step, message: &str) -> StepRunResult {
    if let Err(e) = db
        .update_step_status(row.id, "failed", None, Some(Utc::now()), None, Some(message), None)
        .await
    {
        tracing::error!(step = %step.name, error = %e, "failed to persist step failure");
    }
    StepRunResult {
        name: step.name.clone(),
        status: StepStatus::Failed,
        outputs: HashMap::new(),
        error: Some(message.to_string()),
    }
}

fn backoff_delay(retry: Option<&RetryPolicy>, attempt: u32) -> Duration {
    let Some(retry) = retry else { return Duration::from_millis(0) };
    let base_ms = match &retry.backoff {
        Backoff::Fixed { delay_ms } => *delay_ms,
        Backoff::Exponential { base_ms, max_ms } => {
            let exp = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
            exp.min(*max_ms)
        }
    };
    let jitter_ms = rand::thread_rng().gen_range(0..=(base_ms / 5).max(1));
    Duration::from_millis(base_ms + jitter_ms)
}

/// Source a step's named `outputs` per §4.6: explicit `config.outputFile`
/// (JSON object or `key=value` lines), implicit `terraform output -json` for
/// terraform steps, else absent. Only names the step actually declares make
/// it into the returned map — undeclared values a backend happens to return
/// (e.g. `http`'s `status_code`) are still persisted to the DB's raw
/// `outputs` column but never visible to `${stepName.x}` interpolation.
async fn collect_declared_outputs(step: &Step, raw: &HashMap<String, Value>) -> Result<HashMap<String, Value>, String> {
    if step.outputs.is_empty() {
        return Ok(HashMap::new());
    }

    let sourced = if step.step_type == "terraform" {
        terraform_output_json(step).await?
    } else if let Some(output_file) = step.config.get("outputFile").and_then(|v| v.as_str()) {
        read_output_file(output_file).await?
    } else {
        HashMap::new()
    };

    let mut result = HashMap::new();
    for name in &step.outputs {
        if let Some(value) = sourced.get(name).or_else(|| raw.get(name)) {
            result.insert(name.clone(), value.clone());
        }
    }
    Ok(result)
}

async fn terraform_output_json(step: &Step) -> Result<HashMap<String, Value>, String> {
    let working_dir = step
        .config
        .get("working_dir")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "terraform step is missing config.working_dir".to_string())?;

    let output = tokio::process::Command::new("terraform")
        .args(["output", "-json"])
        .current_dir(working_dir)
        .output()
        .await
        .map_err(|e| format!("failed to run terraform output -json: {e}"))?;

    if !output.status.success() {
        return Err(format!("terraform output -json failed: {}", String::from_utf8_lossy(&output.stderr)));
    }

    let parsed: serde_json::Map<String, Value> =
        serde_json::from_slice(&output.stdout).map_err(|e| format!("invalid terraform output JSON: {e}"))?;

    Ok(parsed
        .into_iter()
        .filter_map(|(k, v)| v.get("value").cloned().map(|val| (k, val)))
        .collect())
}

async fn read_output_file(path: &str) -> Result<HashMap<String, Value>, String> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read outputFile {path:?}: {e}"))?;

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&contents) {
        return Ok(map.into_iter().collect());
    }

    Ok(contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), Value::String(v.trim().to_string())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeplane_contracts::StepWhen;
    use std::collections::HashMap as Map;

    fn simple_step(name: &str, step_type: &str) -> Step {
        Step {
            name: name.to_string(),
            step_type: step_type.to_string(),
            config: Map::new(),
            env: Map::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
            parallel: false,
            parallel_group: None,
            when: StepWhen::OnSuccess,
            if_expr: None,
            unless: None,
            retry: None,
            timeout_seconds: None,
        }
    }

    #[test]
    fn sequential_steps_chain_implicitly() {
        let steps = vec![simple_step("a", "policy"), simple_step("b", "policy"), simple_step("c", "policy")];
        let deps = build_effective_depends_on(&steps);
        assert_eq!(deps["b"], vec!["a".to_string()]);
        assert_eq!(deps["c"], vec!["b".to_string()]);
    }

    #[test]
    fn parallel_step_has_no_implicit_predecessor_edge() {
        let mut b = simple_step("b", "policy");
        b.parallel = true;
        let steps = vec![simple_step("a", "policy"), b, simple_step("c", "policy")];
        let deps = build_effective_depends_on(&steps);
        assert!(deps["b"].is_empty());
        // c still chains off b textually, since c itself isn't parallel.
        assert_eq!(deps["c"], vec!["b".to_string()]);
    }

    #[test]
    fn shared_parallel_group_has_no_implicit_edge_between_members() {
        let mut a = simple_step("a", "policy");
        a.parallel_group = Some(1);
        let mut b = simple_step("b", "policy");
        b.parallel_group = Some(1);
        let steps = vec![a, b];
        let deps = build_effective_depends_on(&steps);
        assert!(deps["b"].is_empty());
    }

    #[test]
    fn explicit_depends_on_is_preserved_alongside_implicit_edge() {
        let mut c = simple_step("c", "policy");
        c.depends_on.push("a".to_string());
        let steps = vec![simple_step("a", "policy"), simple_step("b", "policy"), c];
        let deps = build_effective_depends_on(&steps);
        assert!(deps["c"].contains(&"a".to_string()));
        assert!(deps["c"].contains(&"b".to_string()));
    }

    #[test]
    fn on_success_step_is_ineligible_once_something_failed() {
        let step = simple_step("notify", "monitoring");
        let ctx = ExecutionContext::default();
        match prepare_step(&step, &ctx, true, &None) {
            Eligibility::Skip => {}
            _ => panic!("expected skip"),
        }
    }

    #[test]
    fn on_failure_step_is_eligible_once_something_failed() {
        let mut step = simple_step("cleanup", "monitoring");
        step.when = StepWhen::OnFailure;
        let ctx = ExecutionContext::default();
        match prepare_step(&step, &ctx, true, &None) {
            Eligibility::Run { .. } => {}
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn governance_rejects_disallowed_step_type() {
        let step = simple_step("create-db", "terraform");
        let ctx = ExecutionContext::default();
        let allowed = Some(vec!["policy".to_string()]);
        match prepare_step(&step, &ctx, false, &allowed) {
            Eligibility::Fail(_) => {}
            _ => panic!("expected fail"),
        }
    }

    #[test]
    fn interpolation_error_in_if_marks_step_failed_not_skipped() {
        let mut step = simple_step("maybe", "policy");
        step.if_expr = Some("${workflow.missing} == 1".to_string());
        let ctx = ExecutionContext::default();
        match prepare_step(&step, &ctx, false, &None) {
            Eligibility::Fail(_) => {}
            _ => panic!("expected fail"),
        }
    }
}
