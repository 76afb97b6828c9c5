//! End-to-end tests against the assembled `axum::Router`, covering the S1-S8 scenarios and
//! the universal invariants of SPEC_FULL.md §8 that are checkable without a live network
//! socket (the WebSocket channel is simulated by registering directly with the in-process
//! `ConnectionRegistry`, since a real socket handshake needs a bound TCP listener).

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use clawcierge::Config;
use clawcierge::model::RequestStatus;
use clawcierge_app::state::AppState;
use clawcierge_app::build_router;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;

fn test_config() -> Config {
	Config {
		database_url: String::new(),
		app_env: "test".to_string(),
		log_level: "error".to_string(),
		request_expiry_seconds: 300,
		pipeline_stage_timeout_seconds: 5,
		ws_heartbeat_interval_seconds: 15,
		ws_heartbeat_timeout_seconds: 60,
		ws_max_message_size: 65536,
		admin_password: "test-password".to_string(),
		admin_cookie_secret: "test-signing-key".to_string(),
		bind_addr: "0.0.0.0:0".to_string(),
	}
}

async fn json_body(body: Body) -> Value {
	let bytes = to_bytes(body, usize::MAX).await.expect("readable body");
	serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

fn post(path: &str, auth: Option<&str>, body: Value) -> Request<Body> {
	let mut builder = Request::post(path).header("content-type", "application/json");
	if let Some(token) = auth {
		builder = builder.header("authorization", format!("Bearer {token}"));
	}
	builder.body(Body::from(body.to_string())).unwrap()
}

fn put(path: &str, auth: &str, body: Value) -> Request<Body> {
	Request::put(path)
		.header("content-type", "application/json")
		.header("authorization", format!("Bearer {token}", token = auth))
		.body(Body::from(body.to_string()))
		.unwrap()
}

fn get(path: &str, auth: Option<&str>) -> Request<Body> {
	let mut builder = Request::get(path);
	if let Some(token) = auth {
		builder = builder.header("authorization", format!("Bearer {token}"));
	}
	builder.body(Body::empty()).unwrap()
}

/// Registers an agent, returns `(agent_id, handle, api_key)`.
async fn register_agent(state: &AppState, display_name: &str, handle: &str) -> (uuid::Uuid, String, String) {
	let app = build_router(state.clone());
	let resp = app
		.oneshot(post(
			"/v1/agents",
			None,
			json!({"display_name": display_name, "handle": handle}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::CREATED);
	let body = json_body(resp.into_body()).await;
	(
		body["id"].as_str().unwrap().parse().unwrap(),
		body["handle"].as_str().unwrap().to_string(),
		body["api_key"].as_str().unwrap().to_string(),
	)
}

#[sqlx::test]
async fn register_rejects_malformed_handle(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let app = build_router(state);
	let resp = app
		.oneshot(post(
			"/v1/agents",
			None,
			json!({"display_name": "x", "handle": "Bad.Agent"}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[sqlx::test]
async fn register_rejects_too_short_handle(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let app = build_router(state);
	let resp = app
		.oneshot(post("/v1/agents", None, json!({"display_name": "x", "handle": "ab"})))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

/// S7 plus invariant 7 (round-trip): registering then resolving the handle returns the same
/// agent id, and uploaded capabilities come back verbatim from the directory.
#[sqlx::test]
async fn register_resolve_and_capability_round_trip(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, handle, api_key) = register_agent(&state, "Pink", "pink").await;

	let schema = json!({
		"type": "object",
		"properties": {"message": {"type": "string"}},
		"required": ["message"],
	});
	let app = build_router(state.clone());
	let resp = app
		.oneshot(put(
			&format!("/v1/agents/{agent_id}/capabilities"),
			&api_key,
			json!({"capabilities": [{"action": "echo", "params_schema": schema}]}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::OK);

	let app = build_router(state);
	let resp = app
		.oneshot(get(&format!("/v1/directory/{handle}"), None))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::OK);
	let body = json_body(resp.into_body()).await;
	assert_eq!(body["agent_id"].as_str().unwrap(), agent_id.to_string());
	assert_eq!(body["capabilities"][0]["action"], "echo");
}

/// S8 — a valid key for a different agent is rejected with 403, not 401.
#[sqlx::test]
async fn capability_upload_rejects_key_for_different_agent(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (_x_id, _h, x_key) = register_agent(&state, "X", "agent.x").await;
	let (y_id, _h2, _y_key) = register_agent(&state, "Y", "agent.y").await;

	let app = build_router(state);
	let resp = app
		.oneshot(put(
			&format!("/v1/agents/{y_id}/capabilities"),
			&x_key,
			json!({"capabilities": []}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

/// S5 — a registered agent with no live channel yields 503 and no Request row.
#[sqlx::test]
async fn disconnected_dispatch_returns_503(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, handle, agent_key) = register_agent(&state, "Pink", "pink").await;

	let app = build_router(state.clone());
	app.oneshot(put(
		&format!("/v1/agents/{agent_id}/capabilities"),
		&agent_key,
		json!({"capabilities": [{"action": "echo"}]}),
	))
	.await
	.unwrap();

	let sender_key = state
		.credential
		.generate(
			clawcierge::model::OwnerType::Sender,
			uuid::Uuid::new_v4(),
			vec![],
		)
		.await
		.unwrap();

	let app = build_router(state);
	let resp = app
		.oneshot(post(
			&format!("/v1/agents/{handle}/requests"),
			Some(&sender_key),
			json!({"action": "echo", "params": {"message": "hi"}}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// S2 — an action absent from the capability contract is rejected at the capability stage.
#[sqlx::test]
async fn unknown_action_is_rejected_at_capability_stage(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, handle, agent_key) = register_agent(&state, "Pink", "pink").await;
	let app = build_router(state.clone());
	app.oneshot(put(
		&format!("/v1/agents/{agent_id}/capabilities"),
		&agent_key,
		json!({"capabilities": [{"action": "echo"}]}),
	))
	.await
	.unwrap();
	let _rx = state.registry.register(agent_id);

	let sender_key = state
		.credential
		.generate(clawcierge::model::OwnerType::Sender, uuid::Uuid::new_v4(), vec![])
		.await
		.unwrap();
	let app = build_router(state);
	let resp = app
		.oneshot(post(
			&format!("/v1/agents/{handle}/requests"),
			Some(&sender_key),
			json!({"action": "bogus", "params": {}}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
	let body = json_body(resp.into_body()).await;
	assert_eq!(body["detail"]["stage"], "capability_sandbox");
}

/// S4 — a matching reject rule stops the request at the policy stage with its own reason.
#[sqlx::test]
async fn policy_reject_rule_blocks_before_capability_stage(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, handle, agent_key) = register_agent(&state, "Pink", "pink").await;
	let sender_id = uuid::Uuid::new_v4();
	let sender_key = state
		.credential
		.generate(clawcierge::model::OwnerType::Sender, sender_id, vec![])
		.await
		.unwrap();

	let app = build_router(state.clone());
	app.oneshot(put(
		&format!("/v1/agents/{agent_id}/capabilities"),
		&agent_key,
		json!({"capabilities": [{"action": "echo"}]}),
	))
	.await
	.unwrap();
	let app = build_router(state.clone());
	app.oneshot(put(
		&format!("/v1/agents/{agent_id}/policies"),
		&agent_key,
		json!({"rules": [{"condition": format!("sender_id == '{sender_id}'"), "action": "reject", "reason": "blocked"}]}),
	))
	.await
	.unwrap();
	let _rx = state.registry.register(agent_id);

	let app = build_router(state);
	let resp = app
		.oneshot(post(
			&format!("/v1/agents/{handle}/requests"),
			Some(&sender_key),
			json!({"action": "echo", "params": {"message": "hi"}}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
	let body = json_body(resp.into_body()).await;
	assert_eq!(body["detail"]["stage"], "policy_engine");
	assert_eq!(body["detail"]["message"], "blocked");
}

/// S1 — happy path: dispatch succeeds once a channel is registered, and polling after the
/// simulated agent completes the action reflects the terminal state (invariant 3, 8).
#[sqlx::test]
async fn happy_path_dispatch_then_poll_completed(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, handle, agent_key) = register_agent(&state, "Pink", "pink").await;
	let sender_key = state
		.credential
		.generate(clawcierge::model::OwnerType::Sender, uuid::Uuid::new_v4(), vec![])
		.await
		.unwrap();

	let app = build_router(state.clone());
	app.oneshot(put(
		&format!("/v1/agents/{agent_id}/capabilities"),
		&agent_key,
		json!({"capabilities": [{"action": "echo"}]}),
	))
	.await
	.unwrap();
	let mut rx = state.registry.register(agent_id);

	let app = build_router(state.clone());
	let resp = app
		.oneshot(post(
			&format!("/v1/agents/{handle}/requests"),
			Some(&sender_key),
			json!({"action": "echo", "params": {"message": "hi"}}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::ACCEPTED);
	let body = json_body(resp.into_body()).await;
	assert_eq!(body["status"], "dispatched");
	let request_id: uuid::Uuid = body["id"].as_str().unwrap().parse().unwrap();

	match rx.recv().await {
		Some(clawcierge::registry::ChannelCommand::Send(clawcierge::protocol::OutboundFrame::RequestReceived {
			request_id: sent_id,
			..
		})) => assert_eq!(sent_id, request_id),
		other => panic!("expected request.received, got {other:?}"),
	}

	state
		.tracker
		.update_status(request_id, RequestStatus::Completed, Some(json!({"echo": "hi"})))
		.await
		.unwrap();

	let app = build_router(state);
	let resp = app
		.oneshot(get(&format!("/v1/requests/{request_id}"), Some(&sender_key)))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::OK);
	let body = json_body(resp.into_body()).await;
	assert_eq!(body["status"], "completed");
	assert_eq!(body["result"]["echo"], "hi");
}

/// Invariant 6 (sender isolation): a different sender's credential may not poll the request.
#[sqlx::test]
async fn poll_rejects_non_submitting_sender(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, handle, agent_key) = register_agent(&state, "Pink", "pink").await;
	let sender_key = state
		.credential
		.generate(clawcierge::model::OwnerType::Sender, uuid::Uuid::new_v4(), vec![])
		.await
		.unwrap();
	let other_sender_key = state
		.credential
		.generate(clawcierge::model::OwnerType::Sender, uuid::Uuid::new_v4(), vec![])
		.await
		.unwrap();

	let app = build_router(state.clone());
	app.oneshot(put(
		&format!("/v1/agents/{agent_id}/capabilities"),
		&agent_key,
		json!({"capabilities": [{"action": "echo"}]}),
	))
	.await
	.unwrap();
	let _rx = state.registry.register(agent_id);

	let app = build_router(state.clone());
	let resp = app
		.oneshot(post(
			&format!("/v1/agents/{handle}/requests"),
			Some(&sender_key),
			json!({"action": "echo", "params": {"message": "hi"}}),
		))
		.await
		.unwrap();
	let body = json_body(resp.into_body()).await;
	let request_id = body["id"].as_str().unwrap().to_string();

	let app = build_router(state);
	let resp = app
		.oneshot(get(
			&format!("/v1/requests/{request_id}"),
			Some(&other_sender_key),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

/// Invariant 1 — registering a second agent with an already-taken handle is rejected with
/// 409 `HandleTaken`, not a generic 500, when driven through the real router.
#[sqlx::test]
async fn register_rejects_duplicate_handle(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	register_agent(&state, "Pink", "pink").await;

	let app = build_router(state);
	let resp = app
		.oneshot(post(
			"/v1/agents",
			None,
			json!({"display_name": "Pink Again", "handle": "pink"}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::CONFLICT);
	let body = json_body(resp.into_body()).await;
	assert_eq!(body["error"]["kind"], "handle_taken");
}

/// §10 — an agent-owning caller uploading a `params_schema` that is not itself a valid
/// draft-07 JSON Schema is rejected at upload time with 422, never persisted.
#[sqlx::test]
async fn capability_upload_rejects_invalid_schema(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, _handle, agent_key) = register_agent(&state, "Pink", "pink").await;

	let app = build_router(state);
	let resp = app
		.oneshot(put(
			&format!("/v1/agents/{agent_id}/capabilities"),
			&agent_key,
			json!({"capabilities": [{"action": "echo", "params_schema": {"type": "not-a-real-type"}}]}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

/// §10 — a policy rule whose condition fails to parse against the restricted namespace is
/// rejected at upload time with 422, never persisted.
#[sqlx::test]
async fn policy_upload_rejects_invalid_condition(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let (agent_id, _handle, agent_key) = register_agent(&state, "Pink", "pink").await;

	let app = build_router(state);
	let resp = app
		.oneshot(put(
			&format!("/v1/agents/{agent_id}/policies"),
			&agent_key,
			json!({"rules": [{"condition": "sender_id ===", "action": "reject", "reason": "broken"}]}),
		))
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[sqlx::test]
async fn health_check_reports_ok(pool: PgPool) {
	let state = AppState::new(pool, test_config());
	let app = build_router(state);
	let resp = app.oneshot(get("/health", None)).await.unwrap();
	assert_eq!(resp.status(), StatusCode::OK);
	let body = json_body(resp.into_body()).await;
	assert_eq!(body["status"], "ok");
}
