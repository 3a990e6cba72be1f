//! Live update events and notifiers for observability.
//!
//! Events are emitted while the live feed runs so consumers can redraw,
//! log or surface connection trouble.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use trellis_graph::NodeId;

use crate::connection::ConnectionState;

/// Events emitted by [`LiveUpdates`](crate::LiveUpdates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiveEvent {
  StateChanged { state: ConnectionState },

  /// A status message was merged into these nodes.
  NodesUpdated { node_ids: Vec<NodeId> },

  /// The broker reported it is dropping events.
  LimitReached,

  /// The connection dropped; a new attempt follows after `delay_ms`.
  Reconnecting { attempt: u32, delay_ms: u64 },

  /// Reconnect attempts are exhausted. No further updates will arrive.
  GaveUp { attempts: u32 },
}

/// Trait for receiving live update events.
pub trait LiveNotifier: Send + Sync {
  fn notify(&self, event: LiveEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl LiveNotifier for NoopNotifier {
  fn notify(&self, _event: LiveEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<LiveEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<LiveEvent>) -> Self {
    Self { sender }
  }
}

impl LiveNotifier for ChannelNotifier {
  fn notify(&self, event: LiveEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
