//! Credential Store (C1): hash-indexed bearer-token generation and validation.

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ClawciergeError, Result};
use crate::model::{ApiKeyRow, AuthContext, OwnerType};

const AGENT_PREFIX: &str = "clw_agent_";
const SENDER_PREFIX: &str = "clw_sender_";
const RANDOM_BYTES: usize = 32;
const BASE62_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const KEY_PREFIX_LEN: usize = 16;

fn base62_encode(bytes: &[u8]) -> String {
	// Treat the byte slice as a big-endian arbitrary-precision integer and repeatedly divide
	// by 62, matching the original service's base62-encoded random key body.
	let mut digits = bytes.to_vec();
	let mut out = Vec::new();
	while digits.iter().any(|&b| b != 0) {
		let mut remainder = 0u32;
		for d in digits.iter_mut() {
			let acc = (remainder << 8) | *d as u32;
			*d = (acc / 62) as u8;
			remainder = acc % 62;
		}
		out.push(BASE62_ALPHABET[remainder as usize]);
		while digits.first() == Some(&0) && digits.len() > 1 {
			digits.remove(0);
		}
	}
	if out.is_empty() {
		out.push(BASE62_ALPHABET[0]);
	}
	out.reverse();
	String::from_utf8(out).expect("base62 alphabet is ascii")
}

fn sha256_hex(plaintext: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(plaintext.as_bytes());
	hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct CredentialStore {
	pool: PgPool,
}

impl CredentialStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Generates a new bearer credential for `owner_id`, persists its hash, and returns the
	/// plaintext. The plaintext is never stored and is returned exactly once.
	pub async fn generate(
		&self,
		owner_type: OwnerType,
		owner_id: Uuid,
		scopes: Vec<String>,
	) -> Result<String> {
		let mut raw = [0u8; RANDOM_BYTES];
		rand::rng().fill(&mut raw);
		let prefix_label = match owner_type {
			OwnerType::Agent => AGENT_PREFIX,
			OwnerType::Sender => SENDER_PREFIX,
		};
		let plaintext = format!("{prefix_label}{}", base62_encode(&raw));
		let key_hash = sha256_hex(&plaintext);
		let key_prefix: String = plaintext.chars().take(KEY_PREFIX_LEN).collect();

		sqlx::query(
			"INSERT INTO api_keys (id, key_hash, key_prefix, owner_type, owner_id, scopes, expires_at, revoked_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL)",
		)
		.bind(Uuid::new_v4())
		.bind(&key_hash)
		.bind(&key_prefix)
		.bind(owner_type)
		.bind(owner_id)
		.bind(&scopes)
		.execute(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;

		Ok(plaintext)
	}

	/// Validates a plaintext bearer credential. Returns `None` when the credential is unknown
	/// or revoked; returns `Err(AuthExpired)` when it once existed but has passed its
	/// `expires_at`, so the HTTP edge can report `auth_expired` distinctly from `auth_invalid`.
	pub async fn validate(&self, plaintext: &str) -> Result<Option<AuthContext>> {
		let key_hash = sha256_hex(plaintext);
		let row: Option<ApiKeyRow> = sqlx::query_as(
			"SELECT id, key_hash, key_prefix, owner_type, owner_id, scopes, expires_at, revoked_at \
			 FROM api_keys WHERE key_hash = $1",
		)
		.bind(&key_hash)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;

		let Some(row) = row else {
			return Ok(None);
		};
		if row.revoked_at.is_some() {
			return Ok(None);
		}
		if let Some(expires_at) = row.expires_at {
			if expires_at <= Utc::now() {
				return Err(ClawciergeError::AuthExpired);
			}
		}
		Ok(Some(AuthContext {
			owner_type: row.owner_type,
			owner_id: row.owner_id,
			scopes: row.scopes,
			key_id: row.id,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn base62_encode_is_deterministic_and_alphabet_restricted() {
		let a = base62_encode(&[0u8, 1, 2, 3, 255, 255]);
		let b = base62_encode(&[0u8, 1, 2, 3, 255, 255]);
		assert_eq!(a, b);
		assert!(a.bytes().all(|c| BASE62_ALPHABET.contains(&c)));
	}

	#[test]
	fn sha256_hex_matches_known_vector() {
		// sha256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
		assert_eq!(
			sha256_hex(""),
			"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
		);
	}

	#[test]
	fn generated_prefix_label_matches_owner_type() {
		assert!(AGENT_PREFIX.starts_with("clw_agent_"));
		assert!(SENDER_PREFIX.starts_with("clw_sender_"));
	}
}
