// Workflow validator (C5): static validation of a parsed workflow. Returns
// every error found, not just the first, so the loader/CLI can surface all
// problems at once (§4.5).

use crate::dag::StepGraph;
use crate::error::ValidationError;
use forgeplane_contracts::{Step, Workflow};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn interpolation_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static interpolation regex is valid"))
}

/// Known variable scopes a resource is declared in when validating the
/// enclosing application spec's resource names, passed in from the caller
/// (the engine knows the resource set; the validator does not).
pub struct ValidationContext<'a> {
    pub known_resource_names: &'a [String],
}

impl Default for ValidationContext<'_> {
    fn default() -> Self {
        Self {
            known_resource_names: &[],
        }
    }
}

/// Run every C5 rule against `workflow`, collecting all failures.
///
/// A clean result (`Ok(warnings)`) still carries validation *warnings* —
/// currently only the parallel-output-collision warning from §4.6's
/// parallelism-ordering note, which this spec treats as non-fatal.
pub fn validate(workflow: &Workflow, ctx: &ValidationContext) -> Result<Vec<String>, ValidationError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_unique_names(workflow, &mut errors);
    check_required_fields(workflow, &mut errors);
    check_depends_on_exist(workflow, &mut errors);
    check_acyclic(workflow, &mut errors);
    check_interpolation_tokens(workflow, ctx, &mut errors);
    check_parallel_output_collisions(workflow, &mut warnings);

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ValidationError::WorkflowInvalid(errors))
    }
}

fn check_unique_names(workflow: &Workflow, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for step in &workflow.steps {
        if !seen.insert(step.name.as_str()) {
            errors.push(format!("duplicate step name: {:?}", step.name));
        }
    }
}

fn check_required_fields(workflow: &Workflow, errors: &mut Vec<String>) {
    for step in &workflow.steps {
        let missing = match step.step_type.as_str() {
            "policy" => missing_keys(step, &["script"]),
            "terraform" => {
                let mut missing = missing_keys(step, &["working_dir"]);
                match step.config.get("operation").and_then(|v| v.as_str()) {
                    Some("init") | Some("plan") | Some("apply") | Some("destroy") | Some("output") => {}
                    Some(other) => missing.push(format!("config.operation {other:?} is not one of init/plan/apply/destroy/output")),
                    None => missing.push("config.operation".to_string()),
                }
                missing
            }
            "kubernetes" => {
                if step.config.contains_key("manifest") || step.config.contains_key("namespace") {
                    Vec::new()
                } else {
                    vec!["config.manifest or config.namespace".to_string()]
                }
            }
            "validation" => {
                if step.config.contains_key("endpoint") || step.config.contains_key("script") {
                    Vec::new()
                } else {
                    vec!["config.endpoint or config.script".to_string()]
                }
            }
            _ => Vec::new(),
        };

        for field in missing {
            errors.push(format!("step {:?} ({}) is missing required {field}", step.name, step.step_type));
        }
    }
}

fn missing_keys(step: &Step, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter(|k| !step.config.contains_key(**k))
        .map(|k| format!("config.{k}"))
        .collect()
}

fn check_depends_on_exist(workflow: &Workflow, errors: &mut Vec<String>) {
    let names: HashSet<&str> = workflow.steps.iter().map(|s| s.name.as_str()).collect();
    for step in &workflow.steps {
        for dep in &step.depends_on {
            if !names.contains(dep.as_str()) {
                errors.push(format!("step {:?} depends_on unknown step {:?}", step.name, dep));
            }
        }
    }
}

fn check_acyclic(workflow: &Workflow, errors: &mut Vec<String>) {
    let owned: Vec<(&str, &[String])> = workflow
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.depends_on.as_slice()))
        .collect();
    let graph = StepGraph::build(&owned);
    if let Err(cycle) = graph.topo_sort() {
        errors.push(format!("step graph contains a cycle: {cycle:?}"));
    }
}

fn check_interpolation_tokens(workflow: &Workflow, ctx: &ValidationContext, errors: &mut Vec<String>) {
    let step_outputs: HashMap<&str, HashSet<&str>> = workflow
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.outputs.iter().map(String::as_str).collect()))
        .collect();

    for step in &workflow.steps {
        for value in step.config.values() {
            if let Some(text) = value.as_str() {
                check_tokens_in(text, workflow, &step_outputs, ctx, &step.name, errors);
            }
        }
        if let Some(expr) = &step.if_expr {
            check_tokens_in(expr, workflow, &step_outputs, ctx, &step.name, errors);
        }
        if let Some(expr) = &step.unless {
            check_tokens_in(expr, workflow, &step_outputs, ctx, &step.name, errors);
        }
    }
}

fn check_tokens_in(
    text: &str,
    workflow: &Workflow,
    step_outputs: &HashMap<&str, HashSet<&str>>,
    ctx: &ValidationContext,
    step_name: &str,
    errors: &mut Vec<String>,
) {
    for capture in interpolation_token_re().captures_iter(text) {
        let token = &capture[1];
        let mut parts = token.splitn(2, '.');
        let (Some(scope), Some(rest)) = (parts.next(), parts.next()) else {
            errors.push(format!("step {step_name:?} has malformed token ${{{token}}}"));
            continue;
        };

        let ok = match scope {
            "workflow" => workflow.variables.contains_key(rest),
            "resources" => {
                let resource_name = rest.split('.').next().unwrap_or(rest);
                ctx.known_resource_names.iter().any(|n| n == resource_name)
            }
            step => step_outputs
                .get(step)
                .map(|outs| outs.contains(rest))
                .unwrap_or(false),
        };

        if !ok {
            errors.push(format!(
                "step {step_name:?} references undeclared token ${{{token}}}"
            ));
        }
    }
}

fn check_parallel_output_collisions(workflow: &Workflow, warnings: &mut Vec<String>) {
    let mut groups: HashMap<i64, Vec<&Step>> = HashMap::new();
    for step in &workflow.steps {
        if let Some(group) = step.parallel_group {
            groups.entry(group).or_default().push(step);
        }
    }

    for (group, members) in groups {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for step in members {
            for output in &step.outputs {
                if let Some(first) = seen.insert(output.as_str(), step.name.as_str()) {
                    warnings.push(format!(
                        "parallel_group {group}: steps {:?} and {:?} both produce output {:?}; the later completion wins",
                        first, step.name, output
                    ));
                }
            }
        }
    }
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
    fn valid_workflow_passes() {
        let mut step = simple_step("create-db", "policy");
        step.config.insert("script".to_string(), "exit 0".into());
        let workflow = Workflow {
            name: "provision-postgres".to_string(),
            variables: Map::new(),
            steps: vec![step],
        };
        let warnings = validate(&workflow, &ValidationContext::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let workflow = Workflow {
            name: "bad".to_string(),
            variables: Map::new(),
            steps: vec![simple_step("create-db", "policy")],
        };
        let err = validate(&workflow, &ValidationContext::default()).unwrap_err();
        match err {
            ValidationError::WorkflowInvalid(errors) => {
                assert!(errors.iter().any(|e| e.contains("config.script")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cycle_is_reported_with_cycle_members() {
        let mut a = simple_step("a", "policy");
        a.config.insert("script".to_string(), "exit 0".into());
        a.depends_on.push("c".to_string());
        let mut b = simple_step("b", "policy");
        b.config.insert("script".to_string(), "exit 0".into());
        b.depends_on.push("a".to_string());
        let mut c = simple_step("c", "policy");
        c.config.insert("script".to_string(), "exit 0".into());
        c.depends_on.push("b".to_string());

        let workflow = Workflow {
            name: "cyclic".to_string(),
            variables: Map::new(),
            steps: vec![a, b, c],
        };
        let err = validate(&workflow, &ValidationContext::default()).unwrap_err();
        match err {
            ValidationError::WorkflowInvalid(errors) => {
                assert!(errors.iter().any(|e| e.contains("cycle")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn undeclared_token_is_reported() {
        let mut step = simple_step("create-db", "policy");
        step.config.insert("script".to_string(), "echo ${workflow.missing}".into());
        let workflow = Workflow {
            name: "bad-token".to_string(),
            variables: Map::new(),
            steps: vec![step],
        };
        let err = validate(&workflow, &ValidationContext::default()).unwrap_err();
        match err {
            ValidationError::WorkflowInvalid(errors) => {
                assert!(errors.iter().any(|e| e.contains("undeclared token")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parallel_output_collision_is_a_warning_not_an_error() {
        let mut a = simple_step("a", "policy");
        a.config.insert("script".to_string(), "exit 0".into());
        a.parallel_group = Some(1);
        a.outputs.push("result".to_string());
        let mut b = simple_step("b", "policy");
        b.config.insert("script".to_string(), "exit 0".into());
        b.parallel_group = Some(1);
        b.outputs.push("result".to_string());

        let workflow = Workflow {
            name: "parallel".to_string(),
            variables: Map::new(),
            steps: vec![a, b],
        };
        let warnings = validate(&workflow, &ValidationContext::default()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("result"));
    }
}
