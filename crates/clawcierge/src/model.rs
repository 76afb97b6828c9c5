use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
	Inactive,
	Active,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
	pub id: Uuid,
	pub owner_id: Uuid,
	pub display_name: String,
	pub status: AgentStatus,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Handle {
	pub handle: String,
	pub agent_id: Uuid,
}

/// A single declared action an agent accepts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
	pub action: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params_schema: Option<Value>,
	#[serde(default)]
	pub constraints: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CapabilityContract {
	pub id: Uuid,
	pub agent_id: Uuid,
	pub version: i32,
	/// Stored as JSON; decoded via `capabilities()`.
	pub capabilities: Value,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

impl CapabilityContract {
	pub fn capabilities(&self) -> Vec<CapabilityDescriptor> {
		serde_json::from_value(self.capabilities.clone()).unwrap_or_default()
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
	Allow,
	Reject,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRule {
	pub condition: String,
	pub action: RuleAction,
	#[serde(default)]
	pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Policy {
	pub id: Uuid,
	pub agent_id: Uuid,
	pub version: i32,
	pub rules: Value,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

impl Policy {
	pub fn rules(&self) -> Vec<PolicyRule> {
		serde_json::from_value(self.rules.clone()).unwrap_or_default()
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
	Agent,
	Sender,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ApiKeyRow {
	pub id: Uuid,
	pub key_hash: String,
	pub key_prefix: String,
	pub owner_type: OwnerType,
	pub owner_id: Uuid,
	pub scopes: Vec<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub revoked_at: Option<DateTime<Utc>>,
}

/// The outcome of validating a bearer credential (C1).
#[derive(Clone, Debug, Serialize)]
pub struct AuthContext {
	pub owner_type: OwnerType,
	pub owner_id: Uuid,
	pub scopes: Vec<String>,
	pub key_id: Uuid,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
	Pending,
	Dispatched,
	Acked,
	Completed,
	Rejected,
	Timeout,
}

impl RequestStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Rejected | Self::Timeout)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageResult {
	pub stage: String,
	pub passed: bool,
	pub reason: Option<String>,
	pub duration_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestRow {
	pub id: Uuid,
	pub agent_id: Uuid,
	pub sender_id: String,
	pub handle: String,
	pub action_type: String,
	pub payload: Value,
	pub status: RequestStatus,
	pub result: Option<Value>,
	pub pipeline_log: Value,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl RequestRow {
	pub fn pipeline_log(&self) -> Vec<StageResult> {
		serde_json::from_value(self.pipeline_log.clone()).unwrap_or_default()
	}
}
