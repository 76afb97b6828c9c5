use std::collections::HashMap;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use clawcierge::channel::{self, ChannelDeps};
use uuid::Uuid;

use crate::state::AppState;

/// `GET /v1/agents/{id}/ws?token=...`: upgrades to the long-lived duplex agent channel. Auth
/// happens inside [`clawcierge::channel::run_session`] itself (AUTHENTICATING state), not here,
/// since a failed auth must still complete the WebSocket handshake before closing with 4001.
pub async fn upgrade(
	State(state): State<AppState>,
	Path(agent_id): Path<Uuid>,
	Query(params): Query<HashMap<String, String>>,
	ws: WebSocketUpgrade,
) -> Response {
	let token = params.get("token").cloned();
	let deps = ChannelDeps {
		credential: state.credential.clone(),
		registry: state.registry.clone(),
		tracker: state.tracker.clone(),
		store: state.store.clone(),
		heartbeat_interval: state.config.ws_heartbeat_interval(),
		heartbeat_timeout: state.config.ws_heartbeat_timeout(),
	};
	ws.max_message_size(state.config.ws_max_message_size)
		.on_upgrade(move |socket| channel::run_session(socket, agent_id, token, deps))
}
