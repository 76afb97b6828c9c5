use axum::Json;
use axum::extract::{Path, State};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use clawcierge::dispatch::DispatchAccepted;
use clawcierge::error::Result;
use clawcierge::model::{RequestStatus, StageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::authenticate;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitRequest {
	pub action: String,
	#[serde(default)]
	pub params: Value,
}

/// `POST /v1/agents/{handle}/requests`: any valid bearer credential. 202 on successful
/// dispatch; the pipeline/connectivity failure paths map to their own status codes via
/// [`clawcierge::error::ClawciergeError`].
pub async fn submit(
	State(state): State<AppState>,
	Path(handle): Path<String>,
	auth_header: Option<TypedHeader<Authorization<Bearer>>>,
	Json(body): Json<SubmitRequest>,
) -> Result<(axum::http::StatusCode, Json<DispatchAccepted>)> {
	let auth = authenticate(&state, auth_header).await?;
	let accepted = state
		.dispatcher
		.submit(&handle, &auth, &body.action, body.params)
		.await?;
	Ok((axum::http::StatusCode::ACCEPTED, Json(accepted)))
}

#[derive(Serialize)]
pub struct RequestDetail {
	pub id: Uuid,
	pub status: RequestStatus,
	pub action_type: String,
	pub result: Option<Value>,
	pub pipeline_log: Vec<StageResult>,
}

/// `GET /v1/requests/{id}`: the submitting sender's own bearer credential.
pub async fn poll(
	State(state): State<AppState>,
	Path(request_id): Path<Uuid>,
	auth_header: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<RequestDetail>> {
	let auth = authenticate(&state, auth_header).await?;
	let row = state.dispatcher.poll(request_id, &auth).await?;
	Ok(Json(RequestDetail {
		id: row.id,
		status: row.status,
		action_type: row.action_type,
		result: row.result,
		pipeline_log: row.pipeline_log(),
	}))
}
