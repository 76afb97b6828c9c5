use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// One variant per caller-visible error kind in the platform's error taxonomy.
#[derive(thiserror::Error, Debug)]
pub enum ClawciergeError {
	#[error("handle already taken")]
	HandleTaken,
	#[error("agent not found")]
	AgentNotFound,
	#[error("request not found")]
	RequestNotFound,
	#[error("missing bearer credential")]
	AuthMissing,
	#[error("invalid bearer credential")]
	AuthInvalid,
	#[error("bearer credential expired")]
	AuthExpired,
	#[error("not authorized for this resource")]
	NotAuthorized,
	#[error("pipeline rejected at stage {stage}: {reason}")]
	PipelineRejection { stage: String, reason: String },
	#[error("agent is not connected")]
	AgentNotConnected,
	#[error("invalid input: {0}")]
	BadInput(String),
	#[error("internal error")]
	Internal(#[from] anyhow::Error),
}

impl ClawciergeError {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::HandleTaken => StatusCode::CONFLICT,
			Self::AgentNotFound | Self::RequestNotFound => StatusCode::NOT_FOUND,
			Self::AuthMissing | Self::AuthInvalid | Self::AuthExpired => StatusCode::UNAUTHORIZED,
			Self::NotAuthorized => StatusCode::FORBIDDEN,
			Self::PipelineRejection { .. } | Self::BadInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
			Self::AgentNotConnected => StatusCode::SERVICE_UNAVAILABLE,
			Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn kind(&self) -> &'static str {
		match self {
			Self::HandleTaken => "handle_taken",
			Self::AgentNotFound => "agent_not_found",
			Self::RequestNotFound => "not_found",
			Self::AuthMissing => "auth_missing",
			Self::AuthInvalid => "auth_invalid",
			Self::AuthExpired => "auth_expired",
			Self::NotAuthorized => "not_authorized",
			Self::PipelineRejection { .. } => "pipeline_rejection",
			Self::AgentNotConnected => "agent_not_connected",
			Self::BadInput(_) => "bad_input",
			Self::Internal(_) => "internal",
		}
	}
}

impl IntoResponse for ClawciergeError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status == StatusCode::INTERNAL_SERVER_ERROR {
			tracing::error!(error = %self, "unhandled internal error");
			return (
				status,
				Json(json!({"error": {"kind": "internal", "message": "internal error"}})),
			)
				.into_response();
		}
		let body = match &self {
			Self::PipelineRejection { stage, reason } => json!({
				"error": {"kind": self.kind(), "message": self.to_string()},
				"detail": {"message": reason, "stage": stage},
			}),
			other => json!({"error": {"kind": other.kind(), "message": other.to_string()}}),
		};
		(status, Json(body)).into_response()
	}
}

pub type Result<T> = std::result::Result<T, ClawciergeError>;
