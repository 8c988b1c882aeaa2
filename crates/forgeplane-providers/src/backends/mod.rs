// Step backend factory, matching the provider-type dispatch pattern: a
// known set of `step_type` tags, each mapped to a boxed trait object.

pub mod ansible;
pub mod http;
pub mod kubernetes;
pub mod monitoring;
pub mod policy;
pub mod terraform;
pub mod validation;

use crate::backend::StepBackend;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Policy,
    Http,
    Terraform,
    Kubernetes,
    Ansible,
    Validation,
    Monitoring,
}

impl std::str::FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policy" => Ok(StepType::Policy),
            "http" => Ok(StepType::Http),
            "terraform" => Ok(StepType::Terraform),
            "kubernetes" => Ok(StepType::Kubernetes),
            "ansible" => Ok(StepType::Ansible),
            "validation" => Ok(StepType::Validation),
            "monitoring" => Ok(StepType::Monitoring),
            other => Err(format!("unknown step type: {other}")),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepType::Policy => "policy",
            StepType::Http => "http",
            StepType::Terraform => "terraform",
            StepType::Kubernetes => "kubernetes",
            StepType::Ansible => "ansible",
            StepType::Validation => "validation",
            StepType::Monitoring => "monitoring",
        };
        write!(f, "{s}")
    }
}

/// Create the backend for a step's `step_type` tag.
pub fn create_backend(step_type: &str) -> Result<Arc<dyn StepBackend>, String> {
    let kind: StepType = step_type.parse()?;
    Ok(match kind {
        StepType::Policy => Arc::new(policy::PolicyBackend),
        StepType::Http => Arc::new(http::HttpBackend::new()),
        StepType::Terraform => Arc::new(terraform::TerraformBackend),
        StepType::Kubernetes => Arc::new(kubernetes::KubernetesBackend),
        StepType::Ansible => Arc::new(ansible::AnsibleBackend),
        StepType::Validation => Arc::new(validation::ValidationBackend::new()),
        StepType::Monitoring => Arc::new(monitoring::MonitoringBackend),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_step_types_produce_a_backend() {
        for name in ["policy", "http", "terraform", "kubernetes", "ansible", "validation", "monitoring"] {
            assert!(create_backend(name).is_ok(), "expected {name} to resolve");
        }
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        assert!(create_backend("carrier-pigeon").is_err());
    }

    #[test]
    fn step_type_round_trips_through_display() {
        assert_eq!("policy".parse::<StepType>().unwrap().to_string(), "policy");
    }
}
