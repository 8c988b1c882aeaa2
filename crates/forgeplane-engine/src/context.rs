// Per-execution variable context (§4.6): three namespaces — `workflow.*`,
// `<stepName>.*`, `resources.<name>.*` — and the `${...}` token substitution
// that reads from them. Interpolation is plain string substitution performed
// lazily per step, never a templating engine.

use forgeplane_core::ValidationError;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ExecutionContext {
    workflow_vars: HashMap<String, String>,
    step_outputs: HashMap<String, HashMap<String, Value>>,
    resources: HashMap<String, HashMap<String, Value>>,
}

impl ExecutionContext {
    /// `variables` comes from the workflow file's `variables` map;
    /// `input_overrides` from the execution's `inputs`, stringified and
    /// layered on top (an input with the same name as a declared variable
    /// wins).
    pub fn new(variables: HashMap<String, String>, input_overrides: HashMap<String, String>) -> Self {
        let mut workflow_vars = variables;
        workflow_vars.extend(input_overrides);
        Self {
            workflow_vars,
            step_outputs: HashMap::new(),
            resources: HashMap::new(),
        }
    }

    pub fn with_resource_hints(mut self, resources: HashMap<String, HashMap<String, Value>>) -> Self {
        self.resources = resources;
        self
    }

    pub fn record_step_outputs(&mut self, step_name: &str, outputs: HashMap<String, Value>) {
        self.step_outputs.insert(step_name.to_string(), outputs);
    }

    /// Apply a step's `config.setVariables` mapping (`{ varName: outputKey }`),
    /// lifting that step's just-captured outputs into `workflow.*`.
    pub fn apply_set_variables(&mut self, config: &HashMap<String, Value>, outputs: &HashMap<String, Value>) {
        let Some(mapping) = config.get("setVariables").and_then(|v| v.as_object()) else {
            return;
        };
        for (var_name, output_key) in mapping {
            let Some(output_key) = output_key.as_str() else { continue };
            if let Some(value) = outputs.get(output_key) {
                self.workflow_vars.insert(var_name.clone(), value_to_string(value));
            }
        }
    }

    pub fn interpolate(&self, text: &str) -> Result<String, ValidationError> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        loop {
            let Some(start) = rest.find("${") else {
                result.push_str(rest);
                break;
            };
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(ValidationError::InterpolationError(format!(
                    "unterminated token in {text:?}"
                )));
            };
            let token = &after[..end];
            result.push_str(&self.resolve_token(token)?);
            rest = &after[end + 1..];
        }
        Ok(result)
    }

    fn resolve_token(&self, token: &str) -> Result<String, ValidationError> {
        let mut parts = token.splitn(2, '.');
        let (Some(scope), Some(rest)) = (parts.next(), parts.next()) else {
            return Err(ValidationError::InterpolationError(format!("malformed token ${{{token}}}")));
        };

        match scope {
            "workflow" => self
                .workflow_vars
                .get(rest)
                .cloned()
                .ok_or_else(|| ValidationError::InterpolationError(format!("unknown workflow variable {rest:?}"))),
            "resources" => {
                let mut p = rest.splitn(2, '.');
                let (Some(name), Some(attr)) = (p.next(), p.next()) else {
                    return Err(ValidationError::InterpolationError(format!(
                        "malformed resource token ${{{token}}}"
                    )));
                };
                self.resources
                    .get(name)
                    .and_then(|attrs| attrs.get(attr))
                    .map(value_to_string)
                    .ok_or_else(|| ValidationError::InterpolationError(format!("unknown resource attribute ${{{token}}}")))
            }
            step_name => self
                .step_outputs
                .get(step_name)
                .and_then(|outs| outs.get(rest))
                .map(value_to_string)
                .ok_or_else(|| ValidationError::InterpolationError(format!("unknown step output ${{{token}}}"))),
        }
    }

    pub fn interpolate_value(&self, value: &Value) -> Result<Value, ValidationError> {
        match value {
            Value::String(s) => Ok(Value::String(self.interpolate(s)?)),
            Value::Array(items) => Ok(Value::Array(
                items.iter().map(|v| self.interpolate_value(v)).collect::<Result<_, _>>()?,
            )),
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.interpolate_value(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    pub fn interpolate_config(&self, config: &HashMap<String, Value>) -> Result<HashMap<String, Value>, ValidationError> {
        config.iter().map(|(k, v)| Ok((k.clone(), self.interpolate_value(v)?))).collect()
    }

    pub fn interpolate_env(&self, env: &HashMap<String, String>) -> Result<HashMap<String, String>, ValidationError> {
        env.iter().map(|(k, v)| Ok((k.clone(), self.interpolate(v)?))).collect()
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_workflow_variable() {
        let ctx = ExecutionContext::new(HashMap::from([("region".to_string(), "us-east-1".to_string())]), HashMap::new());
        assert_eq!(ctx.interpolate("${workflow.region}").unwrap(), "us-east-1");
    }

    #[test]
    fn input_overrides_win_over_declared_variable() {
        let ctx = ExecutionContext::new(
            HashMap::from([("region".to_string(), "us-east-1".to_string())]),
            HashMap::from([("region".to_string(), "eu-west-1".to_string())]),
        );
        assert_eq!(ctx.interpolate("${workflow.region}").unwrap(), "eu-west-1");
    }

    #[test]
    fn resolves_step_output() {
        let mut ctx = ExecutionContext::new(HashMap::new(), HashMap::new());
        ctx.record_step_outputs("create-db", HashMap::from([("host".to_string(), json!("db.internal"))]));
        assert_eq!(ctx.interpolate("${create-db.host}").unwrap(), "db.internal");
    }

    #[test]
    fn resolves_resource_hint() {
        let ctx = ExecutionContext::default().with_resource_hints(HashMap::from([(
            "primary-db".to_string(),
            HashMap::from([("endpoint".to_string(), json!("10.0.0.1"))]),
        )]));
        assert_eq!(ctx.interpolate("${resources.primary-db.endpoint}").unwrap(), "10.0.0.1");
    }

    #[test]
    fn missing_key_is_interpolation_error() {
        let ctx = ExecutionContext::new(HashMap::new(), HashMap::new());
        let err = ctx.interpolate("${workflow.missing}").unwrap_err();
        assert!(matches!(err, ValidationError::InterpolationError(_)));
    }

    #[test]
    fn set_variables_lifts_output_into_workflow_scope() {
        let mut ctx = ExecutionContext::new(HashMap::new(), HashMap::new());
        let config = HashMap::from([("setVariables".to_string(), json!({ "dbHost": "host" }))]);
        let outputs = HashMap::from([("host".to_string(), json!("db.internal"))]);
        ctx.apply_set_variables(&config, &outputs);
        assert_eq!(ctx.interpolate("${workflow.dbHost}").unwrap(), "db.internal");
    }
}
