//! Pipeline Executor (C6): runs [`policy_engine`, `capability_sandbox`] in order with a
//! per-stage timeout, halting on first rejection.

use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use crate::capability;
use crate::model::{CapabilityDescriptor, PolicyRule, StageResult};
use crate::policy;

/// Everything a pipeline run needs, gathered by the Dispatch Orchestrator before C6 runs.
pub struct PipelineContext {
	pub request_id: Uuid,
	pub sender_id: String,
	pub action: String,
	pub params: Value,
	pub policy_rules: Vec<PolicyRule>,
	pub capabilities: Vec<CapabilityDescriptor>,
}

pub struct PipelineOutcome {
	pub rejected: bool,
	pub rejection_stage: Option<String>,
	pub rejection_reason: Option<String>,
	pub log: Vec<StageResult>,
}

const STAGES: [&str; 2] = ["policy_engine", "capability_sandbox"];

/// Runs both stages under `stage_timeout`. Stage bodies are CPU-bound and synchronous, so
/// each one runs on the blocking thread pool under a [`tokio::time::timeout`] — a slow or
/// hung stage cannot starve other concurrent submissions sharing the async reactor.
pub async fn execute(ctx: PipelineContext, stage_timeout: Duration) -> PipelineOutcome {
	let mut log = Vec::with_capacity(STAGES.len());

	for stage in STAGES {
		let start = Instant::now();
		let outcome = run_stage(stage, &ctx, stage_timeout).await;
		let duration_ms = start.elapsed().as_millis() as u64;

		match outcome {
			StageOutcome::Passed => {
				log.push(StageResult {
					stage: stage.to_string(),
					passed: true,
					reason: None,
					duration_ms,
				});
			},
			StageOutcome::Failed(reason) => {
				log.push(StageResult {
					stage: stage.to_string(),
					passed: false,
					reason: Some(reason.clone()),
					duration_ms,
				});
				return PipelineOutcome {
					rejected: true,
					rejection_stage: Some(stage.to_string()),
					rejection_reason: Some(reason),
					log,
				};
			},
			StageOutcome::TimedOut => {
				let reason = format!("Stage timed out after {}s", stage_timeout.as_secs());
				log.push(StageResult {
					stage: stage.to_string(),
					passed: false,
					reason: Some(reason.clone()),
					duration_ms,
				});
				return PipelineOutcome {
					rejected: true,
					rejection_stage: Some(stage.to_string()),
					rejection_reason: Some(reason),
					log,
				};
			},
			StageOutcome::Faulted(kind) => {
				let reason = format!("Stage error: {kind}");
				log.push(StageResult {
					stage: stage.to_string(),
					passed: false,
					reason: Some(reason.clone()),
					duration_ms,
				});
				return PipelineOutcome {
					rejected: true,
					rejection_stage: Some(stage.to_string()),
					rejection_reason: Some(reason),
					log,
				};
			},
		}
	}

	PipelineOutcome {
		rejected: false,
		rejection_stage: None,
		rejection_reason: None,
		log,
	}
}

enum StageOutcome {
	Passed,
	Failed(String),
	TimedOut,
	Faulted(String),
}

async fn run_stage(stage: &str, ctx: &PipelineContext, stage_timeout: Duration) -> StageOutcome {
	let sender_id = ctx.sender_id.clone();
	let action = ctx.action.clone();
	let params = ctx.params.clone();
	let policy_rules = ctx.policy_rules.clone();
	let capabilities = ctx.capabilities.clone();
	let stage = stage.to_string();

	let join = tokio::task::spawn_blocking(move || match stage.as_str() {
		"policy_engine" => {
			let outcome = policy::evaluate(&policy_rules, &sender_id, &action, &params);
			(outcome.passed, outcome.reason)
		},
		"capability_sandbox" => {
			let outcome = capability::check(&capabilities, &action, &params);
			(outcome.passed, outcome.reason)
		},
		other => (false, Some(format!("unknown stage {other}"))),
	});

	match tokio::time::timeout(stage_timeout, join).await {
		Ok(Ok((true, _))) => StageOutcome::Passed,
		Ok(Ok((false, reason))) => StageOutcome::Failed(reason.unwrap_or_default()),
		Ok(Err(join_err)) => StageOutcome::Faulted(join_err.to_string()),
		Err(_) => StageOutcome::TimedOut,
	}
}
