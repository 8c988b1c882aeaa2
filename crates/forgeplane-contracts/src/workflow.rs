use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Governs when a step is eligible to run relative to the execution's
/// accumulated success/failure state. See `Step::when`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepWhen {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
}

/// Backoff shape for `Step::retry`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    Exponential { base_ms: u64, max_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub attempts: u32,
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
}

fn default_backoff() -> Backoff {
    Backoff::Fixed { delay_ms: 1000 }
}

/// Parallel scheduling hints. `parallel: true` runs alongside the textual
/// successor instead of after it; `parallel_group` forms a named cohort of
/// steps that all become ready together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Step {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub parallel_group: Option<i64>,
    #[serde(default)]
    pub when: StepWhen,
    #[serde(rename = "if", default)]
    pub if_expr: Option<String>,
    #[serde(default)]
    pub unless: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// An ordered set of steps forming a DAG, parsed from a provider's workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}
