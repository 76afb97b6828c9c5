pub mod agents;
pub mod directory;
pub mod health;
pub mod info;
pub mod requests;
pub mod ws;

use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use clawcierge::error::{ClawciergeError, Result};
use clawcierge::model::AuthContext;

use crate::state::AppState;

/// Extracts and validates the bearer credential from the `Authorization` header, used by
/// every authed route. A missing header is [`ClawciergeError::AuthMissing`]; an unknown or
/// revoked credential is [`ClawciergeError::AuthInvalid`]; an expired one is
/// [`ClawciergeError::AuthExpired`] (propagated by `?` from [`validate`](clawcierge::credential::CredentialStore::validate)).
pub async fn authenticate(
	state: &AppState,
	auth_header: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<AuthContext> {
	let TypedHeader(Authorization(bearer)) = auth_header.ok_or(ClawciergeError::AuthMissing)?;
	state
		.credential
		.validate(bearer.token())
		.await?
		.ok_or(ClawciergeError::AuthInvalid)
}
