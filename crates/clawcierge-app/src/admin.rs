//! Operator-only admin surface (§10.5): gated by a signed session cookie rather than a bearer
//! credential, grounded in the original service's `routes/admin.py`. Renders server-side HTML;
//! not part of the `/v1` JSON API.

use axum::Form;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::state::AppState;

const COOKIE_NAME: &str = "clawcierge_admin";
const SESSION_PAYLOAD: &str = "authenticated";

type HmacSha256 = Hmac<Sha256>;

fn sign(secret: &str, payload: &str) -> String {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
	mac.update(payload.as_bytes());
	let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
	let value = URL_SAFE_NO_PAD.encode(payload.as_bytes());
	format!("{value}.{sig}")
}

fn verify(secret: &str, token: &str) -> bool {
	let Some((value, sig)) = token.split_once('.') else {
		return false;
	};
	let Ok(expected_mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
		return false;
	};
	let Ok(payload) = URL_SAFE_NO_PAD.decode(value) else {
		return false;
	};
	let Ok(sig_bytes) = URL_SAFE_NO_PAD.decode(sig) else {
		return false;
	};
	let mut mac = expected_mac;
	mac.update(&payload);
	if mac.verify_slice(&sig_bytes).is_err() {
		return false;
	}
	payload == SESSION_PAYLOAD.as_bytes()
}

fn is_admin(jar: &CookieJar, secret: &str) -> bool {
	jar.get(COOKIE_NAME)
		.map(|c| verify(secret, c.value()))
		.unwrap_or(false)
}

/// Escapes the five HTML-significant characters. The dashboard builds rows with `format!`
/// rather than an auto-escaping template engine, so every user-controlled field interpolated
/// into HTML must be passed through this first.
fn escape_html(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	for c in input.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}
	out
}

pub async fn login_page(axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>) -> Html<String> {
	let error = if params.get("error").is_some() {
		"<p class=\"error\">Invalid password.</p>"
	} else {
		""
	};
	Html(format!(
		"<html><body><h1>Clawcierge Admin</h1>{error}\
		 <form method=\"post\" action=\"/admin/login\">\
		 <input type=\"password\" name=\"password\" placeholder=\"password\" />\
		 <button type=\"submit\">Log in</button></form></body></html>"
	))
}

#[derive(Deserialize)]
pub struct LoginForm {
	pub password: String,
}

pub async fn login(
	State(state): State<AppState>,
	jar: CookieJar,
	Form(form): Form<LoginForm>,
) -> Response {
	if form.password != state.config.admin_password {
		return Redirect::to("/admin/login?error=1").into_response();
	}
	let token = sign(&state.config.admin_cookie_secret, SESSION_PAYLOAD);
	let cookie = Cookie::build((COOKIE_NAME, token))
		.http_only(true)
		.same_site(axum_extra::extract::cookie::SameSite::Lax)
		.path("/")
		.build();
	(jar.add(cookie), Redirect::to("/admin/")).into_response()
}

pub async fn dashboard(State(state): State<AppState>, jar: CookieJar) -> Response {
	if !is_admin(&jar, &state.config.admin_cookie_secret) {
		return Redirect::to("/admin/login").into_response();
	}
	let agents = match state.store.list_agents_newest_first().await {
		Ok(agents) => agents,
		Err(e) => {
			tracing::error!(error = %e, "failed to list agents for admin dashboard");
			return StatusCode::INTERNAL_SERVER_ERROR.into_response();
		},
	};

	let mut rows = String::new();
	for agent in &agents {
		let heartbeat = state
			.registry
			.info(agent.id)
			.map(|info| info.last_heartbeat.format("%Y-%m-%d %H:%M").to_string())
			.unwrap_or_else(|| "—".to_string());
		rows.push_str(&format!(
			"<tr><td>{}</td><td>{}</td><td>{:?}</td><td>{}</td>\
			 <td><form method=\"post\" action=\"/admin/agents/{}/delete\">\
			 <button type=\"submit\">Delete</button></form></td></tr>",
			agent.id,
			escape_html(&agent.display_name),
			agent.status,
			heartbeat,
			agent.id
		));
	}
	Html(format!(
		"<html><body><h1>Agents</h1><table><tr><th>ID</th><th>Name</th><th>Status</th>\
		 <th>Last heartbeat</th><th></th></tr>{rows}</table>\
		 <a href=\"/admin/logout\">Log out</a></body></html>"
	))
	.into_response()
}

pub async fn delete_agent(State(state): State<AppState>, jar: CookieJar, Path(agent_id): Path<Uuid>) -> Response {
	if !is_admin(&jar, &state.config.admin_cookie_secret) {
		return Redirect::to("/admin/login").into_response();
	}
	state.registry.close(agent_id, 1000, "Deleted by admin");
	if let Err(e) = state.store.delete_agent(agent_id).await {
		tracing::error!(agent_id = %agent_id, error = %e, "failed to delete agent from admin surface");
	}
	Redirect::to("/admin/").into_response()
}

pub async fn logout(jar: CookieJar) -> Response {
	(jar.remove(Cookie::from(COOKIE_NAME)), Redirect::to("/admin/login")).into_response()
}
