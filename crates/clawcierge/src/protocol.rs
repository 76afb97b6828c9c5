use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Platform → agent frames.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
	#[serde(rename = "request.received")]
	RequestReceived {
		request_id: Uuid,
		action: String,
		params: Value,
		sender_id: String,
	},
	#[serde(rename = "request.cancel")]
	RequestCancel { request_id: Uuid, reason: String },
	#[serde(rename = "ping")]
	Ping,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionResultStatus {
	Completed,
	Error,
}

/// Agent → platform frames. Unknown `type` values and malformed frames are handled by the
/// caller (C9 logs and ignores them rather than failing to deserialize the whole enum), so
/// this is parsed from a generic `Value` rather than relying on serde's untagged matching to
/// reject unknown variants.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
	#[serde(rename = "heartbeat")]
	Heartbeat,
	#[serde(rename = "ack")]
	Ack { request_id: Uuid },
	#[serde(rename = "action.result")]
	ActionResult {
		request_id: Uuid,
		status: ActionResultStatus,
		#[serde(default)]
		result: Option<Value>,
		#[serde(default)]
		error: Option<String>,
	},
}

impl InboundFrame {
	/// Parses a raw text frame, returning `None` for malformed JSON, a schema mismatch, or an
	/// unrecognised `type` — all of which are silently ignored per the wire protocol's
	/// forward-compatibility rule rather than closing the session.
	pub fn parse(raw: &str) -> Option<Self> {
		serde_json::from_str(raw).ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_frame_type_is_ignored_not_erroring_the_caller() {
		assert!(InboundFrame::parse(r#"{"type":"something.else"}"#).is_none());
	}

	#[test]
	fn malformed_json_is_ignored() {
		assert!(InboundFrame::parse("{not json").is_none());
	}

	#[test]
	fn parses_heartbeat() {
		assert!(matches!(
			InboundFrame::parse(r#"{"type":"heartbeat"}"#),
			Some(InboundFrame::Heartbeat)
		));
	}

	#[test]
	fn parses_action_result() {
		let raw = r#"{"type":"action.result","request_id":"00000000-0000-0000-0000-000000000001","status":"completed","result":{"echo":"hi"}}"#;
		match InboundFrame::parse(raw) {
			Some(InboundFrame::ActionResult {
				status, result, ..
			}) => {
				assert_eq!(status, ActionResultStatus::Completed);
				assert_eq!(result.unwrap()["echo"], "hi");
			},
			other => panic!("unexpected parse result: {other:?}"),
		}
	}
}
