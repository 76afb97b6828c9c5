//! Persistent Store Adapter (C2): transactional reads/writes over the relational store.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ClawciergeError, Result};
use crate::model::{Agent, AgentStatus, CapabilityContract, Handle, Policy};

pub fn handle_regex() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9.]{1,62}[a-z0-9]$").expect("valid regex"))
}

pub fn is_valid_handle(handle: &str) -> bool {
	handle.len() >= 3 && handle.len() <= 64 && handle_regex().is_match(handle)
}

#[derive(Clone)]
pub struct Store {
	pool: PgPool,
}

impl Store {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	/// Registers a new agent under `handle` in a single transaction. Fails with
	/// `HandleTaken` on unique-key conflict.
	pub async fn register_agent(
		&self,
		owner_id: Uuid,
		display_name: &str,
		handle: &str,
	) -> Result<Agent> {
		if !is_valid_handle(handle) {
			return Err(ClawciergeError::BadInput(format!(
				"handle '{handle}' does not match the required format"
			)));
		}
		let mut tx = self
			.pool
			.begin()
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;

		let agent: Agent = sqlx::query_as(
			"INSERT INTO agents (id, owner_id, display_name, status, created_at, updated_at) \
			 VALUES ($1, $2, $3, 'inactive', now(), now()) \
			 RETURNING id, owner_id, display_name, status, created_at, updated_at",
		)
		.bind(Uuid::new_v4())
		.bind(owner_id)
		.bind(display_name)
		.fetch_one(&mut *tx)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;

		let insert_handle = sqlx::query("INSERT INTO handles (handle, agent_id) VALUES ($1, $2)")
			.bind(handle)
			.bind(agent.id)
			.execute(&mut *tx)
			.await;

		match insert_handle {
			Ok(_) => {},
			Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
				return Err(ClawciergeError::HandleTaken);
			},
			Err(e) => return Err(ClawciergeError::Internal(e.into())),
		}

		tx.commit()
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(agent)
	}

	pub async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>> {
		sqlx::query_as(
			"SELECT id, owner_id, display_name, status, created_at, updated_at FROM agents WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))
	}

	pub async fn get_handle(&self, handle: &str) -> Result<Option<Handle>> {
		sqlx::query_as("SELECT handle, agent_id FROM handles WHERE handle = $1")
			.bind(handle)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))
	}

	/// Resolves either a handle or an agent id, as `GET /v1/agents/{id-or-handle}` must.
	pub async fn get_agent_by_id_or_handle(&self, id_or_handle: &str) -> Result<Option<Agent>> {
		if let Ok(id) = Uuid::parse_str(id_or_handle) {
			return self.get_agent(id).await;
		}
		match self.get_handle(id_or_handle).await? {
			Some(h) => self.get_agent(h.agent_id).await,
			None => Ok(None),
		}
	}

	pub async fn set_agent_status(&self, id: Uuid, status: AgentStatus) -> Result<()> {
		sqlx::query("UPDATE agents SET status = $2, updated_at = now() WHERE id = $1")
			.bind(id)
			.bind(status)
			.execute(&self.pool)
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(())
	}

	/// Atomically deactivates any currently-active contract and inserts the new one at
	/// `version = max + 1`.
	pub async fn rotate_capability_contract(
		&self,
		agent_id: Uuid,
		capabilities: Value,
	) -> Result<CapabilityContract> {
		let mut tx = self
			.pool
			.begin()
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;

		sqlx::query("UPDATE capability_contracts SET is_active = false WHERE agent_id = $1")
			.bind(agent_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;

		let next_version: i32 = sqlx::query_scalar(
			"SELECT COALESCE(MAX(version), 0) + 1 FROM capability_contracts WHERE agent_id = $1",
		)
		.bind(agent_id)
		.fetch_one(&mut *tx)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;

		let contract: CapabilityContract = sqlx::query_as(
			"INSERT INTO capability_contracts (id, agent_id, version, capabilities, is_active, created_at) \
			 VALUES ($1, $2, $3, $4, true, now()) \
			 RETURNING id, agent_id, version, capabilities, is_active, created_at",
		)
		.bind(Uuid::new_v4())
		.bind(agent_id)
		.bind(next_version)
		.bind(capabilities)
		.fetch_one(&mut *tx)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;

		tx.commit()
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(contract)
	}

	pub async fn active_capability_contract(
		&self,
		agent_id: Uuid,
	) -> Result<Option<CapabilityContract>> {
		sqlx::query_as(
			"SELECT id, agent_id, version, capabilities, is_active, created_at \
			 FROM capability_contracts WHERE agent_id = $1 AND is_active = true LIMIT 1",
		)
		.bind(agent_id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))
	}

	/// Same versioning/activation invariants as capability contracts.
	pub async fn rotate_policy(&self, agent_id: Uuid, rules: Value) -> Result<Policy> {
		let mut tx = self
			.pool
			.begin()
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;

		sqlx::query("UPDATE policies SET is_active = false WHERE agent_id = $1")
			.bind(agent_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;

		let next_version: i32 =
			sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) + 1 FROM policies WHERE agent_id = $1")
				.bind(agent_id)
				.fetch_one(&mut *tx)
				.await
				.map_err(|e| ClawciergeError::Internal(e.into()))?;

		let policy: Policy = sqlx::query_as(
			"INSERT INTO policies (id, agent_id, version, rules, is_active, created_at) \
			 VALUES ($1, $2, $3, $4, true, now()) \
			 RETURNING id, agent_id, version, rules, is_active, created_at",
		)
		.bind(Uuid::new_v4())
		.bind(agent_id)
		.bind(next_version)
		.bind(rules)
		.fetch_one(&mut *tx)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;

		tx.commit()
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(policy)
	}

	pub async fn active_policy(&self, agent_id: Uuid) -> Result<Option<Policy>> {
		sqlx::query_as(
			"SELECT id, agent_id, version, rules, is_active, created_at \
			 FROM policies WHERE agent_id = $1 AND is_active = true LIMIT 1",
		)
		.bind(agent_id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))
	}

	/// Deletes an agent and its dependents (handle, contracts, policies, requests cascade via
	/// foreign keys declared `ON DELETE CASCADE` in the schema).
	pub async fn delete_agent(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM agents WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn list_agents_newest_first(&self) -> Result<Vec<Agent>> {
		sqlx::query_as(
			"SELECT id, owner_id, display_name, status, created_at, updated_at \
			 FROM agents ORDER BY created_at DESC",
		)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))
	}
}

/// Convenience for handlers that need "now" consistently formatted with the store's clock.
pub fn now() -> chrono::DateTime<Utc> {
	Utc::now()
}
