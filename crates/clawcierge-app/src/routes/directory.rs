use axum::Json;
use axum::extract::{Path, State};
use clawcierge::error::{ClawciergeError, Result};
use clawcierge::model::{AgentStatus, CapabilityDescriptor};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Serialize)]
pub struct DirectoryEntry {
	pub agent_id: Uuid,
	pub display_name: String,
	pub handle: String,
	pub status: AgentStatus,
	pub capabilities: Vec<CapabilityDescriptor>,
}

/// `GET /v1/directory/{handle}`: no auth required.
pub async fn resolve(
	State(state): State<AppState>,
	Path(handle): Path<String>,
) -> Result<Json<DirectoryEntry>> {
	let row = state
		.store
		.get_handle(&handle)
		.await?
		.ok_or(ClawciergeError::AgentNotFound)?;
	let agent = state
		.store
		.get_agent(row.agent_id)
		.await?
		.ok_or(ClawciergeError::AgentNotFound)?;
	let capabilities = state
		.store
		.active_capability_contract(agent.id)
		.await?
		.map(|c| c.capabilities())
		.unwrap_or_default();

	Ok(Json(DirectoryEntry {
		agent_id: agent.id,
		display_name: agent.display_name,
		handle: row.handle,
		status: agent.status,
		capabilities,
	}))
}
