//! Connection Registry (C3): the one process-wide mutable singleton in the core. Keeps an
//! in-memory map of agent id to live duplex channel, with a single-writer-per-channel
//! discipline borrowed from [`clawcierge_core::responsechannel`]'s generic channel shape —
//! here specialised to an outbound command queue per connection rather than a
//! request/response pair, since a channel session has many outbound frames over its lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::OutboundFrame;

/// A command handed to the per-connection writer task.
#[derive(Debug)]
pub enum ChannelCommand {
	Send(OutboundFrame),
	Close { code: u16, reason: String },
}

/// The registry's handle to a live agent channel. Cheaply cloneable; all clones share the
/// same outbound queue, so concurrent `send`s to the same agent are serialised by the queue's
/// single consumer (the channel handler's writer loop) rather than by a lock held across an
/// await.
#[derive(Clone)]
struct Connection {
	tx: mpsc::Sender<ChannelCommand>,
	connected_at: DateTime<Utc>,
	last_heartbeat: Arc<Mutex<DateTime<Utc>>>,
}

/// Snapshot of a connection's liveness info, for the admin surface and tests.
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
	pub connected_at: DateTime<Utc>,
	pub last_heartbeat: DateTime<Utc>,
}

const OUTBOUND_QUEUE_DEPTH: usize = 64;

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
	inner: Arc<Mutex<HashMap<Uuid, Connection>>>,
}

impl ConnectionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new channel for `agent_id`, returning the receiving half the caller's
	/// channel handler loop should drain. If a prior connection exists, it is evicted with a
	/// normal close (code 1000, "Replaced by new connection") before the new one is
	/// installed, guaranteeing at most one live channel per agent.
	pub fn register(&self, agent_id: Uuid) -> mpsc::Receiver<ChannelCommand> {
		let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
		let now = Utc::now();
		let conn = Connection {
			tx,
			connected_at: now,
			last_heartbeat: Arc::new(Mutex::new(now)),
		};
		let previous = {
			let mut map = self.inner.lock();
			map.insert(agent_id, conn)
		};
		if let Some(previous) = previous {
			// Best-effort: the old writer loop may already be gone, in which case the send
			// fails silently and that task's own teardown handles the registry state (it is
			// already overwritten above).
			let _ = previous.tx.try_send(ChannelCommand::Close {
				code: 1000,
				reason: "Replaced by new connection".to_string(),
			});
		}
		rx
	}

	/// Idempotent: removes the entry if present.
	pub fn remove(&self, agent_id: Uuid) {
		self.inner.lock().remove(&agent_id);
	}

	pub fn is_connected(&self, agent_id: Uuid) -> bool {
		self.inner.lock().contains_key(&agent_id)
	}

	pub fn info(&self, agent_id: Uuid) -> Option<ConnectionInfo> {
		self.inner.lock().get(&agent_id).map(|c| ConnectionInfo {
			connected_at: c.connected_at,
			last_heartbeat: *c.last_heartbeat.lock(),
		})
	}

	/// Hands `frame` off to the connection's writer queue. Returns `true` only once the frame
	/// has been enqueued to the transport; a transmission failure (the writer loop is gone)
	/// removes the stale entry and returns `false`.
	pub async fn send(&self, agent_id: Uuid, frame: OutboundFrame) -> bool {
		let tx = match self.inner.lock().get(&agent_id) {
			Some(c) => c.tx.clone(),
			None => return false,
		};
		if tx.send(ChannelCommand::Send(frame)).await.is_err() {
			self.remove(agent_id);
			return false;
		}
		true
	}

	pub fn update_heartbeat(&self, agent_id: Uuid) {
		if let Some(c) = self.inner.lock().get(&agent_id) {
			*c.last_heartbeat.lock() = Utc::now();
		}
	}

	/// Force-closes a live connection (used by the admin surface). No-op if not connected.
	pub fn close(&self, agent_id: Uuid, code: u16, reason: &str) {
		if let Some(c) = self.inner.lock().get(&agent_id) {
			let _ = c.tx.try_send(ChannelCommand::Close {
				code,
				reason: reason.to_string(),
			});
		}
	}
}
