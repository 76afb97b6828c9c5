//! Policy Engine (C4): evaluates rule expressions against a restricted namespace; fail-closed.

use cel_interpreter::{Context, Program, Value as CelValue};
use serde_json::Value;

use crate::model::{PolicyRule, RuleAction};

/// Outcome of running every rule against a request.
pub struct PolicyOutcome {
	pub passed: bool,
	pub reason: Option<String>,
}

fn json_to_cel(value: &Value) -> CelValue {
	match value {
		Value::Null => CelValue::Null,
		Value::Bool(b) => CelValue::Bool(*b),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				CelValue::Int(i)
			} else {
				CelValue::Float(n.as_f64().unwrap_or_default())
			}
		},
		Value::String(s) => CelValue::String(s.clone().into()),
		Value::Array(items) => CelValue::List(items.iter().map(json_to_cel).collect::<Vec<_>>().into()),
		Value::Object(map) => {
			let converted: std::collections::HashMap<CelValue, CelValue> = map
				.iter()
				.map(|(k, v)| (CelValue::String(k.clone().into()), json_to_cel(v)))
				.collect();
			CelValue::Map(converted.into())
		},
	}
}

/// Builds the namespace `{sender_id, action, params_<k> for each k in params}` that rule
/// conditions are evaluated against.
fn build_context(sender_id: &str, action: &str, params: &Value) -> Context<'static> {
	let mut ctx = Context::default();
	let _ = ctx.add_variable("sender_id", CelValue::String(sender_id.to_string().into()));
	let _ = ctx.add_variable("action", CelValue::String(action.to_string().into()));
	if let Value::Object(map) = params {
		for (k, v) in map {
			let _ = ctx.add_variable(format!("params_{k}"), json_to_cel(v));
		}
	}
	ctx
}

/// Evaluates `rules` in declaration order against `(sender_id, action, params)`. Absence of
/// rules passes. Any evaluation fault (parse error, undefined name, type error) fails closed.
pub fn evaluate(
	rules: &[PolicyRule],
	sender_id: &str,
	action: &str,
	params: &Value,
) -> PolicyOutcome {
	let ctx = build_context(sender_id, action, params);

	for rule in rules {
		let program = match Program::compile(&rule.condition) {
			Ok(p) => p,
			Err(_) => {
				return PolicyOutcome {
					passed: false,
					reason: Some(format!(
						"Policy evaluation error for condition: {}",
						rule.condition
					)),
				};
			},
		};
		let result = match program.execute(&ctx) {
			Ok(v) => v,
			Err(_) => {
				return PolicyOutcome {
					passed: false,
					reason: Some(format!(
						"Policy evaluation error for condition: {}",
						rule.condition
					)),
				};
			},
		};
		let truthy = match result {
			CelValue::Bool(b) => b,
			_ => {
				return PolicyOutcome {
					passed: false,
					reason: Some(format!(
						"Policy evaluation error for condition: {}",
						rule.condition
					)),
				};
			},
		};
		if truthy && rule.action == RuleAction::Reject {
			let reason = if rule.reason.is_empty() {
				"Policy rule matched".to_string()
			} else {
				rule.reason.clone()
			};
			return PolicyOutcome {
				passed: false,
				reason: Some(reason),
			};
		}
	}

	PolicyOutcome {
		passed: true,
		reason: None,
	}
}

/// Upload-time check: parse `condition` and type-check it against a dummy namespace
/// (`sender_id: ""`, `action: ""`, no params). A condition that fails to compile or evaluate
/// against the dummy namespace is rejected before it is ever persisted.
pub fn validate_condition(condition: &str) -> std::result::Result<(), String> {
	let program =
		Program::compile(condition).map_err(|e| format!("invalid policy expression: {e}"))?;
	let dummy = build_context("", "", &Value::Object(Default::default()));
	match program.execute(&dummy) {
		Ok(CelValue::Bool(_)) => Ok(()),
		Ok(_) => Err("policy expression must evaluate to a boolean".to_string()),
		Err(e) => Err(format!("invalid policy expression: {e}")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rule(condition: &str, action: RuleAction, reason: &str) -> PolicyRule {
		PolicyRule {
			condition: condition.to_string(),
			action,
			reason: reason.to_string(),
		}
	}

	#[test]
	fn no_rules_passes() {
		let outcome = evaluate(&[], "s", "a", &Value::Object(Default::default()));
		assert!(outcome.passed);
	}

	#[test]
	fn matching_reject_rule_fails_with_its_reason() {
		let rules = vec![rule("sender_id == 'blocked'", RuleAction::Reject, "blocked")];
		let outcome = evaluate(&rules, "blocked", "greet", &Value::Object(Default::default()));
		assert!(!outcome.passed);
		assert_eq!(outcome.reason.as_deref(), Some("blocked"));
	}

	#[test]
	fn non_matching_reject_rule_passes() {
		let rules = vec![rule("sender_id == 'blocked'", RuleAction::Reject, "blocked")];
		let outcome = evaluate(&rules, "someone-else", "greet", &Value::Object(Default::default()));
		assert!(outcome.passed);
	}

	#[test]
	fn allow_rule_is_a_no_op_even_when_truthy() {
		let rules = vec![
			rule("action == 'greet'", RuleAction::Allow, ""),
			rule("action == 'greet'", RuleAction::Reject, "blocked anyway"),
		];
		let outcome = evaluate(&rules, "s", "greet", &Value::Object(Default::default()));
		assert!(!outcome.passed);
		assert_eq!(outcome.reason.as_deref(), Some("blocked anyway"));
	}

	#[test]
	fn empty_reason_defaults_to_generic_message() {
		let rules = vec![rule("true", RuleAction::Reject, "")];
		let outcome = evaluate(&rules, "s", "a", &Value::Object(Default::default()));
		assert_eq!(outcome.reason.as_deref(), Some("Policy rule matched"));
	}

	#[test]
	fn malformed_condition_fails_closed() {
		let rules = vec![rule("sender_id ===", RuleAction::Reject, "")];
		let outcome = evaluate(&rules, "s", "a", &Value::Object(Default::default()));
		assert!(!outcome.passed);
		assert!(outcome.reason.unwrap().starts_with("Policy evaluation error"));
	}

	#[test]
	fn params_are_exposed_with_params_prefix() {
		let rules = vec![rule("params_duration_minutes > 120", RuleAction::Reject, "too long")];
		let params = serde_json::json!({"duration_minutes": 200});
		let outcome = evaluate(&rules, "s", "schedule", &params);
		assert!(!outcome.passed);
	}

	#[test]
	fn validate_condition_accepts_well_formed_boolean_expression() {
		assert!(validate_condition("action == 'greet'").is_ok());
	}

	#[test]
	fn validate_condition_rejects_non_boolean_expression() {
		assert!(validate_condition("1 + 1").is_err());
	}

	#[test]
	fn validate_condition_rejects_unparsable_expression() {
		assert!(validate_condition("sender_id ===").is_err());
	}
}
