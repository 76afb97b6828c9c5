//! Agent Channel Handler (C9): per-agent duplex channel session state machine.
//!
//! ```text
//! CLOSED → (client opens, token query param present) → AUTHENTICATING
//! AUTHENTICATING → valid token bound to this agent → ACCEPTED
//! AUTHENTICATING → invalid/mismatched token → CLOSED (code 4001)
//! ACCEPTED → register in C3; mark Agent status=active → OPEN
//! OPEN → receive frame loop
//! OPEN → any unhandled fault or peer close → CLOSING
//! CLOSING → C3.remove, Agent status=inactive → CLOSED
//! ```

use std::borrow::Cow;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::credential::CredentialStore;
use crate::model::{AgentStatus, OwnerType, RequestStatus};
use crate::protocol::{ActionResultStatus, InboundFrame, OutboundFrame};
use crate::registry::{ChannelCommand, ConnectionRegistry};
use crate::store::Store;
use crate::tracker::RequestTracker;

const AUTH_FAILED_CODE: u16 = 4001;
const NORMAL_CODE: u16 = 1000;

pub struct ChannelDeps {
	pub credential: CredentialStore,
	pub registry: ConnectionRegistry,
	pub tracker: RequestTracker,
	pub store: Store,
	pub heartbeat_interval: Duration,
	pub heartbeat_timeout: Duration,
}

/// AUTHENTICATING: the token's owner must be type `agent` and its `owner_id` must equal the
/// URL's `agent_id`. Returns `false` (and the caller closes with 4001) on any mismatch.
async fn authenticate(deps: &ChannelDeps, agent_id: Uuid, token: &str) -> bool {
	match deps.credential.validate(token).await {
		Ok(Some(ctx)) => ctx.owner_type == OwnerType::Agent && ctx.owner_id == agent_id,
		_ => false,
	}
}

/// Drives one channel session end to end: AUTHENTICATING → ACCEPTED → OPEN → CLOSING →
/// CLOSED. Consumes the upgraded socket.
pub async fn run_session(mut socket: WebSocket, agent_id: Uuid, token: Option<String>, deps: ChannelDeps) {
	let Some(token) = token else {
		close_with(&mut socket, AUTH_FAILED_CODE, "Authentication failed").await;
		return;
	};
	if !authenticate(&deps, agent_id, &token).await {
		close_with(&mut socket, AUTH_FAILED_CODE, "Authentication failed").await;
		return;
	}

	// ACCEPTED: register evicts any prior live connection for this agent.
	let mut outbound = deps.registry.register(agent_id);
	if let Err(e) = deps.store.set_agent_status(agent_id, AgentStatus::Active).await {
		tracing::warn!(agent_id = %agent_id, error = %e, "failed to mark agent active on channel open");
	}

	let (mut sink, mut stream) = socket.split();
	let mut heartbeat_tick = tokio::time::interval(deps.heartbeat_interval);
	heartbeat_tick.tick().await; // first tick fires immediately; skip it

	// OPEN: receive loop, multiplexing inbound frames, outbound queue drains, and the
	// server's own heartbeat cadence.
	let teardown_reason = loop {
		tokio::select! {
			inbound = stream.next() => {
				match inbound {
					Some(Ok(Message::Text(text))) => {
						handle_inbound(&deps, agent_id, &text).await;
					},
					Some(Ok(Message::Close(_))) | None => break TeardownReason::PeerClosed,
					Some(Ok(_)) => {}, // binary/ping/pong frames: nothing to demultiplex
					Some(Err(_)) => break TeardownReason::Fault,
				}
			}
			cmd = outbound.recv() => {
				match cmd {
					Some(ChannelCommand::Send(frame)) => {
						if sink.send(to_message(&frame)).await.is_err() {
							break TeardownReason::Fault;
						}
					},
					Some(ChannelCommand::Close { code, reason }) => {
						break TeardownReason::Evicted { code, reason };
					},
					None => break TeardownReason::Fault,
				}
			}
			_ = heartbeat_tick.tick() => {
				let stale = deps
					.registry
					.info(agent_id)
					.map(|info| chrono::Utc::now() - info.last_heartbeat > chrono::Duration::from_std(deps.heartbeat_timeout).unwrap_or_default())
					.unwrap_or(true);
				if stale {
					break TeardownReason::HeartbeatTimeout;
				}
				if sink.send(to_message(&OutboundFrame::Ping)).await.is_err() {
					break TeardownReason::Fault;
				}
			}
		}
	};

	// CLOSING → CLOSED
	deps.registry.remove(agent_id);
	if let Err(e) = deps.store.set_agent_status(agent_id, AgentStatus::Inactive).await {
		tracing::warn!(agent_id = %agent_id, error = %e, "failed to mark agent inactive on channel close");
	}

	let (code, reason) = match teardown_reason {
		TeardownReason::PeerClosed | TeardownReason::Fault => (NORMAL_CODE, "Session closed".to_string()),
		TeardownReason::HeartbeatTimeout => (NORMAL_CODE, "Heartbeat timeout".to_string()),
		TeardownReason::Evicted { code, reason } => (code, reason),
	};
	let _ = sink
		.send(Message::Close(Some(CloseFrame {
			code,
			reason: Cow::Owned(reason),
		})))
		.await;
}

enum TeardownReason {
	PeerClosed,
	Fault,
	HeartbeatTimeout,
	Evicted { code: u16, reason: String },
}

fn to_message(frame: &OutboundFrame) -> Message {
	Message::Text(serde_json::to_string(frame).unwrap_or_default().into())
}

/// Inbound frame demultiplexer (OPEN state). Malformed JSON, a schema mismatch, or an unknown
/// `type` are logged and ignored; the session is never closed because of them.
async fn handle_inbound(deps: &ChannelDeps, agent_id: Uuid, raw: &str) {
	let Some(frame) = InboundFrame::parse(raw) else {
		tracing::debug!(agent_id = %agent_id, "ignoring malformed or unrecognised inbound frame");
		return;
	};
	match frame {
		InboundFrame::Heartbeat => {
			deps.registry.update_heartbeat(agent_id);
		},
		InboundFrame::Ack { request_id } => {
			if let Err(e) = deps
				.tracker
				.update_status(request_id, RequestStatus::Acked, None)
				.await
			{
				tracing::warn!(request_id = %request_id, error = %e, "failed to record ack");
			}
		},
		InboundFrame::ActionResult {
			request_id,
			status,
			result,
			error,
		} => {
			let (new_status, result) = match status {
				ActionResultStatus::Completed => (RequestStatus::Completed, result),
				ActionResultStatus::Error => (
					RequestStatus::Rejected,
					Some(serde_json::json!({"error": error})),
				),
			};
			if let Err(e) = deps.tracker.update_status(request_id, new_status, result).await {
				tracing::warn!(request_id = %request_id, error = %e, "failed to record action result");
			}
		},
	}
}

async fn close_with(socket: &mut WebSocket, code: u16, reason: &str) {
	let _ = socket
		.send(Message::Close(Some(CloseFrame {
			code,
			reason: Cow::Owned(reason.to_string()),
		})))
		.await;
}
