// Core configuration consumed by the orchestration engine, executor, and loader.
//
// Decision: `Config::from_env()` is the primary constructor (matches the rest
// of the workspace); a `config.yaml` file can override the same fields for
// local/dev runs via `Config::merge_yaml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which `WorkflowRunner` tier executes workflow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerMode {
    #[default]
    InProcess,
    Temporal,
}

impl std::str::FromStr for RunnerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inprocess" | "in-process" | "in_process" | "" => Ok(RunnerMode::InProcess),
            "temporal" => Ok(RunnerMode::Temporal),
            other => anyhow::bail!("unknown workflow runner mode: {other}"),
        }
    }
}

/// Options recognised by the core (§6 of the design doc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub providers_root: PathBuf,

    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    #[serde(with = "duration_secs")]
    pub orphan_threshold: Duration,
    #[serde(with = "duration_secs")]
    pub max_workflow_duration: Duration,

    pub max_concurrent_workflows: usize,
    pub max_concurrent_steps_per_workflow: usize,

    #[serde(default)]
    pub allowed_step_types: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_product_workflows: Option<Vec<String>>,
    #[serde(default)]
    pub required_platform_workflows: Vec<String>,

    pub core_version: String,

    #[serde(default)]
    pub workflow_runner_mode: RunnerMode,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            providers_root: PathBuf::from("./providers"),
            poll_interval: Duration::from_secs(5),
            orphan_threshold: Duration::from_secs(30),
            max_workflow_duration: Duration::from_secs(3600),
            max_concurrent_workflows: 16,
            max_concurrent_steps_per_workflow: 8,
            allowed_step_types: None,
            allowed_product_workflows: None,
            required_platform_workflows: Vec::new(),
            core_version: env!("CARGO_PKG_VERSION").to_string(),
            workflow_runner_mode: RunnerMode::InProcess,
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset. `DATABASE_URL` and `PROVIDERS_ROOT` are
    /// the only values without a sensible default for a real deployment, but
    /// we don't hard-fail here — callers decide whether an empty
    /// `database_url` is acceptable (e.g. dry-run validation of providers).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DATABASE_URL") {
            config.database_url = v;
        }
        if let Ok(v) = std::env::var("PROVIDERS_ROOT") {
            config.providers_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(
                v.parse().context("POLL_INTERVAL_SECS must be an integer")?,
            );
        }
        if let Ok(v) = std::env::var("ORPHAN_THRESHOLD_SECS") {
            config.orphan_threshold = Duration::from_secs(
                v.parse().context("ORPHAN_THRESHOLD_SECS must be an integer")?,
            );
        }
        if let Ok(v) = std::env::var("MAX_WORKFLOW_DURATION_SECS") {
            config.max_workflow_duration = Duration::from_secs(
                v.parse()
                    .context("MAX_WORKFLOW_DURATION_SECS must be an integer")?,
            );
        }
        if let Ok(v) = std::env::var("MAX_CONCURRENT_WORKFLOWS") {
            config.max_concurrent_workflows = v
                .parse()
                .context("MAX_CONCURRENT_WORKFLOWS must be an integer")?;
        }
        if let Ok(v) = std::env::var("MAX_CONCURRENT_STEPS_PER_WORKFLOW") {
            config.max_concurrent_steps_per_workflow = v
                .parse()
                .context("MAX_CONCURRENT_STEPS_PER_WORKFLOW must be an integer")?;
        }
        if let Ok(v) = std::env::var("ALLOWED_STEP_TYPES") {
            config.allowed_step_types = Some(split_csv(&v));
        }
        if let Ok(v) = std::env::var("ALLOWED_PRODUCT_WORKFLOWS") {
            config.allowed_product_workflows = Some(split_csv(&v));
        }
        if let Ok(v) = std::env::var("REQUIRED_PLATFORM_WORKFLOWS") {
            config.required_platform_workflows = split_csv(&v);
        }
        if let Ok(v) = std::env::var("CORE_VERSION") {
            config.core_version = v;
        }
        if let Ok(v) = std::env::var("WORKFLOW_RUNNER_MODE") {
            config.workflow_runner_mode = v.parse()?;
        }

        Ok(config)
    }

    /// Overlay a `config.yaml` file's fields onto this configuration.
    /// Values present in the file take precedence over whatever `from_env`
    /// produced; the file itself is optional at every key.
    pub fn merge_yaml(mut self, path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let overlay: serde_yaml::Value =
            serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let base = serde_yaml::to_value(&self)?;
        let merged = merge_yaml_values(base, overlay);
        self = serde_yaml::from_value(merged)
            .with_context(|| format!("applying overlay from {}", path.display()))?;
        Ok(self)
    }
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn merge_yaml_values(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(mut base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(existing) => merge_yaml_values(existing, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            serde_yaml::Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_mode_parses_variants() {
        assert_eq!("inprocess".parse::<RunnerMode>().unwrap(), RunnerMode::InProcess);
        assert_eq!("".parse::<RunnerMode>().unwrap(), RunnerMode::InProcess);
        assert_eq!("temporal".parse::<RunnerMode>().unwrap(), RunnerMode::Temporal);
        assert!("bogus".parse::<RunnerMode>().is_err());
    }

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.orphan_threshold, Duration::from_secs(30));
        assert_eq!(config.workflow_runner_mode, RunnerMode::InProcess);
    }

    #[test]
    fn split_csv_trims_and_drops_empty() {
        assert_eq!(split_csv(" a, b ,,c"), vec!["a", "b", "c"]);
    }
}
