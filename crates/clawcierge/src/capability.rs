//! Capability Sandbox (C5): schema-validates parameters and enforces numeric constraints
//! against the active contract.

use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::model::CapabilityDescriptor;

pub struct CapabilityOutcome {
	pub passed: bool,
	pub reason: Option<String>,
}

fn compile_draft7(schema: &Value) -> Result<Validator, String> {
	jsonschema::options()
		.with_draft(Draft::Draft7)
		.build(schema)
		.map_err(|e| e.to_string())
}

fn numeric(value: &Value) -> Option<f64> {
	value.as_f64()
}

/// Finds the capability whose `action` matches, schema-validates `params`, then enforces
/// `max_`/`min_` numeric constraints. Missing parameters are never a constraint violation.
pub fn check(capabilities: &[CapabilityDescriptor], action: &str, params: &Value) -> CapabilityOutcome {
	let Some(descriptor) = capabilities.iter().find(|c| c.action == action) else {
		return CapabilityOutcome {
			passed: false,
			reason: Some(format!(
				"Action '{action}' is not in the agent's capability contract"
			)),
		};
	};

	if let Some(schema) = &descriptor.params_schema {
		if !schema.is_null() {
			match compile_draft7(schema) {
				Ok(validator) => {
					if let Err(err) = validator.validate(params) {
						return CapabilityOutcome {
							passed: false,
							reason: Some(err.to_string()),
						};
					}
				},
				Err(message) => {
					return CapabilityOutcome {
						passed: false,
						reason: Some(message),
					};
				},
			}
		}
	}

	for (key, bound) in descriptor.constraints.iter() {
		let Some(bound) = numeric(bound) else { continue };
		if let Some(param_name) = key.strip_prefix("max_") {
			if let Value::Object(map) = params {
				if let Some(actual) = map.get(param_name).and_then(numeric) {
					if actual > bound {
						return CapabilityOutcome {
							passed: false,
							reason: Some(format!("{param_name}={actual} exceeds max {bound}")),
						};
					}
				}
			}
		} else if let Some(param_name) = key.strip_prefix("min_") {
			if let Value::Object(map) = params {
				if let Some(actual) = map.get(param_name).and_then(numeric) {
					if actual < bound {
						return CapabilityOutcome {
							passed: false,
							reason: Some(format!("{param_name}={actual} is below min {bound}")),
						};
					}
				}
			}
		}
	}

	CapabilityOutcome {
		passed: true,
		reason: None,
	}
}

/// Upload-time check that a `params_schema` document is itself a valid draft-07 JSON Schema.
pub fn validate_schema(schema: &Value) -> std::result::Result<(), String> {
	if schema.is_null() {
		return Ok(());
	}
	compile_draft7(schema).map(|_| ())
}
