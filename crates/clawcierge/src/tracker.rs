//! Request Tracker (C7): creates request records, transitions status, enforces expiry.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ClawciergeError, Result};
use crate::model::{RequestRow, RequestStatus, StageResult};

#[derive(Clone)]
pub struct RequestTracker {
	pool: PgPool,
	request_expiry: chrono::Duration,
}

impl RequestTracker {
	pub fn new(pool: PgPool, request_expiry: std::time::Duration) -> Self {
		Self {
			pool,
			request_expiry: chrono::Duration::from_std(request_expiry)
				.unwrap_or_else(|_| chrono::Duration::seconds(300)),
		}
	}

	pub async fn create(
		&self,
		id: Uuid,
		agent_id: Uuid,
		sender_id: &str,
		handle: &str,
		action: &str,
		payload: Value,
		pipeline_log: &[StageResult],
	) -> Result<()> {
		let expires_at = Utc::now() + self.request_expiry;
		sqlx::query(
			"INSERT INTO requests (id, agent_id, sender_id, handle, action_type, payload, status, \
			 result, pipeline_log, created_at, updated_at, expires_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, 'pending', NULL, $7, now(), now(), $8)",
		)
		.bind(id)
		.bind(agent_id)
		.bind(sender_id)
		.bind(handle)
		.bind(action)
		.bind(payload)
		.bind(serde_json::to_value(pipeline_log).unwrap_or(Value::Array(vec![])))
		.bind(expires_at)
		.execute(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(())
	}

	/// Persists a new status (and, when supplied, a result). The legal transitions named in
	/// the data model are the caller's responsibility to respect; this method does not
	/// itself reject an illegal transition (tests assert legality at the call sites instead).
	pub async fn update_status(&self, id: Uuid, status: RequestStatus, result: Option<Value>) -> Result<()> {
		sqlx::query("UPDATE requests SET status = $2, result = COALESCE($3, result), updated_at = now() WHERE id = $1")
			.bind(id)
			.bind(status)
			.bind(result)
			.execute(&self.pool)
			.await
			.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(())
	}

	pub async fn get(&self, id: Uuid) -> Result<Option<RequestRow>> {
		sqlx::query_as(
			"SELECT id, agent_id, sender_id, handle, action_type, payload, status, result, \
			 pipeline_log, created_at, updated_at, expires_at FROM requests WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))
	}

	/// Sets `status = 'timeout'` for every non-terminal row whose `expires_at` has passed.
	/// Returns the affected count. The only operator of the timeout transition.
	pub async fn expire_stale(&self) -> Result<u64> {
		let result = sqlx::query(
			"UPDATE requests SET status = 'timeout', updated_at = now() \
			 WHERE status IN ('pending', 'dispatched') AND expires_at < now()",
		)
		.execute(&self.pool)
		.await
		.map_err(|e| ClawciergeError::Internal(e.into()))?;
		Ok(result.rows_affected())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_states_are_recognised() {
		assert!(RequestStatus::Completed.is_terminal());
		assert!(RequestStatus::Rejected.is_terminal());
		assert!(RequestStatus::Timeout.is_terminal());
		assert!(!RequestStatus::Pending.is_terminal());
		assert!(!RequestStatus::Dispatched.is_terminal());
		assert!(!RequestStatus::Acked.is_terminal());
	}
}
