use axum::Json;
use axum::extract::{Path, State};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use clawcierge::error::{ClawciergeError, Result};
use clawcierge::model::{AgentStatus, CapabilityDescriptor, OwnerType, PolicyRule};
use clawcierge::{capability, policy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::authenticate;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
	pub display_name: String,
	pub handle: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
	pub id: Uuid,
	pub handle: String,
	pub api_key: String,
	pub display_name: String,
	pub status: AgentStatus,
}

/// `POST /v1/agents`: no auth required, returns the agent's bearer credential exactly once.
pub async fn register(
	State(state): State<AppState>,
	Json(body): Json<RegisterRequest>,
) -> Result<(axum::http::StatusCode, Json<RegisterResponse>)> {
	if body.display_name.is_empty() || body.display_name.chars().count() > 200 {
		return Err(ClawciergeError::BadInput(
			"display_name must be 1-200 characters".to_string(),
		));
	}
	if !clawcierge::store::is_valid_handle(&body.handle) {
		return Err(ClawciergeError::BadInput(
			"handle must be 3-64 lowercase alphanumeric/dot characters".to_string(),
		));
	}

	let agent = state
		.store
		.register_agent(Uuid::new_v4(), &body.display_name, &body.handle)
		.await?;
	let api_key = state
		.credential
		.generate(OwnerType::Agent, agent.id, vec!["agent:manage".to_string()])
		.await?;

	Ok((
		axum::http::StatusCode::CREATED,
		Json(RegisterResponse {
			id: agent.id,
			handle: body.handle,
			api_key,
			display_name: agent.display_name,
			status: agent.status,
		}),
	))
}

#[derive(Serialize)]
pub struct AgentDetail {
	pub id: Uuid,
	pub display_name: String,
	pub status: AgentStatus,
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// `GET /v1/agents/{id-or-handle}`: no auth required.
pub async fn get_agent(
	State(state): State<AppState>,
	Path(id_or_handle): Path<String>,
) -> Result<Json<AgentDetail>> {
	let agent = state
		.store
		.get_agent_by_id_or_handle(&id_or_handle)
		.await?
		.ok_or(ClawciergeError::AgentNotFound)?;
	Ok(Json(AgentDetail {
		id: agent.id,
		display_name: agent.display_name,
		status: agent.status,
		created_at: agent.created_at,
	}))
}

#[derive(Deserialize)]
pub struct UploadCapabilitiesRequest {
	pub capabilities: Vec<CapabilityDescriptor>,
}

#[derive(Serialize)]
pub struct ContractResponse {
	pub version: i32,
	pub capabilities: Vec<CapabilityDescriptor>,
}

/// `PUT /v1/agents/{id}/capabilities`: agent-owning auth required. Each `params_schema` is
/// validated as a draft-07 document at upload time, never lazily at dispatch time.
pub async fn upload_capabilities(
	State(state): State<AppState>,
	Path(agent_id): Path<Uuid>,
	auth_header: Option<TypedHeader<Authorization<Bearer>>>,
	Json(body): Json<UploadCapabilitiesRequest>,
) -> Result<Json<ContractResponse>> {
	let auth = authenticate(&state, auth_header).await?;
	require_owning_agent(&auth, agent_id)?;

	for descriptor in &body.capabilities {
		if let Some(schema) = &descriptor.params_schema {
			capability::validate_schema(schema).map_err(ClawciergeError::BadInput)?;
		}
	}

	let capabilities: Value = serde_json::to_value(&body.capabilities)
		.map_err(|e| ClawciergeError::Internal(e.into()))?;
	let contract = state
		.store
		.rotate_capability_contract(agent_id, capabilities)
		.await?;
	Ok(Json(ContractResponse {
		version: contract.version,
		capabilities: contract.capabilities(),
	}))
}

#[derive(Deserialize)]
pub struct UploadPoliciesRequest {
	pub rules: Vec<PolicyRule>,
}

#[derive(Serialize)]
pub struct PolicyResponse {
	pub version: i32,
	pub rules: Vec<PolicyRule>,
}

/// `PUT /v1/agents/{id}/policies`: agent-owning auth required. Each condition must compile and
/// type-check against the restricted dummy namespace before it is persisted.
pub async fn upload_policies(
	State(state): State<AppState>,
	Path(agent_id): Path<Uuid>,
	auth_header: Option<TypedHeader<Authorization<Bearer>>>,
	Json(body): Json<UploadPoliciesRequest>,
) -> Result<Json<PolicyResponse>> {
	let auth = authenticate(&state, auth_header).await?;
	require_owning_agent(&auth, agent_id)?;

	for rule in &body.rules {
		policy::validate_condition(&rule.condition).map_err(ClawciergeError::BadInput)?;
	}

	let rules: Value =
		serde_json::to_value(&body.rules).map_err(|e| ClawciergeError::Internal(e.into()))?;
	let policy = state.store.rotate_policy(agent_id, rules).await?;
	Ok(Json(PolicyResponse {
		version: policy.version,
		rules: policy.rules(),
	}))
}

fn require_owning_agent(auth: &clawcierge::model::AuthContext, agent_id: Uuid) -> Result<()> {
	if auth.owner_type != OwnerType::Agent || auth.owner_id != agent_id {
		return Err(ClawciergeError::NotAuthorized);
	}
	Ok(())
}
