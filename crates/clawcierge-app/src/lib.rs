//! Router assembly, split out from `main.rs` so integration tests can build the same
//! `axum::Router` the binary serves without going through a live process.

pub mod admin;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn build_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health))
		.route("/v1/info", get(routes::info::info))
		.route("/v1/agents", post(routes::agents::register))
		.route("/v1/agents/{id_or_handle}", get(routes::agents::get_agent))
		.route(
			"/v1/agents/{id}/capabilities",
			put(routes::agents::upload_capabilities),
		)
		.route("/v1/agents/{id}/policies", put(routes::agents::upload_policies))
		.route("/v1/directory/{handle}", get(routes::directory::resolve))
		.route(
			"/v1/agents/{handle}/requests",
			post(routes::requests::submit),
		)
		.route("/v1/requests/{id}", get(routes::requests::poll))
		.route("/v1/agents/{id}/ws", get(routes::ws::upgrade))
		.route("/admin/login", get(admin::login_page).post(admin::login))
		.route("/admin/", get(admin::dashboard))
		.route("/admin/agents/{agent_id}/delete", post(admin::delete_agent))
		.route("/admin/logout", get(admin::logout))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Runs [`clawcierge::tracker::RequestTracker::expire_stale`] on a background interval. The
/// spec does not mandate a sweeper, but running one keeps stale requests from sitting in
/// `pending`/`dispatched` forever when nothing happens to poll them past `expires_at`.
pub fn spawn_expiry_sweeper(state: AppState) {
	let interval = Duration::from_secs(state.config.request_expiry_seconds.max(5));
	tokio::spawn(async move {
		let mut tick = tokio::time::interval(interval);
		loop {
			tick.tick().await;
			match state.tracker.expire_stale().await {
				Ok(count) if count > 0 => {
					tracing::debug!(count, "expired stale requests");
				},
				Ok(_) => {},
				Err(e) => tracing::warn!(error = %e, "expire_stale sweep failed"),
			}
		}
	});
}
