//! Dispatch Orchestrator (C8): glues C1–C7 for the submit path and performs the post-dispatch
//! status update.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ClawciergeError, Result};
use crate::model::{AuthContext, RequestStatus};
use crate::pipeline::{self, PipelineContext};
use crate::protocol::OutboundFrame;
use crate::registry::ConnectionRegistry;
use crate::store::Store;
use crate::tracker::RequestTracker;

#[derive(Serialize)]
pub struct DispatchAccepted {
	pub id: Uuid,
	pub status: &'static str,
	pub action_type: String,
}

pub struct Dispatcher {
	store: Store,
	registry: ConnectionRegistry,
	tracker: RequestTracker,
	stage_timeout: Duration,
}

impl Dispatcher {
	pub fn new(
		store: Store,
		registry: ConnectionRegistry,
		tracker: RequestTracker,
		stage_timeout: Duration,
	) -> Self {
		Self {
			store,
			registry,
			tracker,
			stage_timeout,
		}
	}

	/// `POST /v1/agents/{handle}/requests`. `auth` must already be validated by C1 at the
	/// HTTP edge; this only needs the resulting context.
	pub async fn submit(
		&self,
		handle: &str,
		auth: &AuthContext,
		action: &str,
		params: Value,
	) -> Result<DispatchAccepted> {
		let handle_row = self
			.store
			.get_handle(handle)
			.await?
			.ok_or(ClawciergeError::AgentNotFound)?;
		let agent_id = handle_row.agent_id;

		let capabilities = self
			.store
			.active_capability_contract(agent_id)
			.await?
			.map(|c| c.capabilities())
			.unwrap_or_default();
		let policy_rules = self
			.store
			.active_policy(agent_id)
			.await?
			.map(|p| p.rules())
			.unwrap_or_default();

		let request_id = Uuid::new_v4();
		let sender_id = auth.owner_id.to_string();
		let ctx = PipelineContext {
			request_id,
			sender_id: sender_id.clone(),
			action: action.to_string(),
			params: params.clone(),
			policy_rules,
			capabilities,
		};

		let outcome = pipeline::execute(ctx, self.stage_timeout).await;
		if outcome.rejected {
			return Err(ClawciergeError::PipelineRejection {
				stage: outcome.rejection_stage.unwrap_or_default(),
				reason: outcome.rejection_reason.unwrap_or_default(),
			});
		}

		if !self.registry.is_connected(agent_id) {
			return Err(ClawciergeError::AgentNotConnected);
		}

		self
			.tracker
			.create(
				request_id,
				agent_id,
				&sender_id,
				handle,
				action,
				params.clone(),
				&outcome.log,
			)
			.await?;

		let frame = OutboundFrame::RequestReceived {
			request_id,
			action: action.to_string(),
			params,
			sender_id,
		};
		let sent = self.registry.send(agent_id, frame).await;

		if sent {
			self
				.tracker
				.update_status(request_id, RequestStatus::Dispatched, None)
				.await?;
			Ok(DispatchAccepted {
				id: request_id,
				status: "dispatched",
				action_type: action.to_string(),
			})
		} else {
			self
				.tracker
				.update_status(request_id, RequestStatus::Timeout, None)
				.await?;
			Err(ClawciergeError::AgentNotConnected)
		}
	}

	/// `GET /v1/requests/{request_id}`. Returns the row only when `sender_id` matches the
	/// caller's authenticated owner id.
	pub async fn poll(&self, request_id: Uuid, auth: &AuthContext) -> Result<crate::model::RequestRow> {
		let row = self
			.tracker
			.get(request_id)
			.await?
			.ok_or(ClawciergeError::RequestNotFound)?;
		if row.sender_id != auth.owner_id.to_string() {
			return Err(ClawciergeError::NotAuthorized);
		}
		Ok(row)
	}
}
