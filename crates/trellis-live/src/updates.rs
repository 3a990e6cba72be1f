//! Live reconciliation of job status into the rendered node list.
//!
//! `LiveUpdates` owns the current node map behind a `watch` channel. Status
//! messages from the feed are merged into it by key, and local edits made
//! through a [`NodeEditor`] land in the same map, so neither side overwrites
//! the other.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use trellis_config::LiveConfig;
use trellis_graph::{Node, NodeId, NodePatch, StatusPatch};

use crate::connection::{ConnectionState, NORMAL_CLOSURE};
use crate::error::LiveError;
use crate::events::{LiveEvent, LiveNotifier, NoopNotifier};
use crate::handshake::{Handshake, csrf_token};
use crate::message::{InboundMessage, LiveMessage};
use crate::transport::{Connection, Frame, Transport};

pub type NodeMap = BTreeMap<NodeId, Node>;

/// How a single connection ended.
enum SessionEnd {
  Cancelled,
  Closed(Option<u16>),
  Failed(LiveError),
}

/// Keeps a node map in sync with the live job status feed.
///
/// # Usage
///
/// ```ignore
/// let live = LiveUpdates::new(Arc::new(WsTransport::from_config(&config)), &config, nodes);
///
/// // Current nodes, updated as status messages arrive
/// let mut nodes = live.subscribe();
///
/// let cancel = CancellationToken::new();
/// live.run(cancel).await?;
/// ```
pub struct LiveUpdates {
  transport: Arc<dyn Transport>,
  config: LiveConfig,
  nodes: Arc<watch::Sender<NodeMap>>,
  state: watch::Sender<ConnectionState>,
  notifier: Arc<dyn LiveNotifier>,
}

impl LiveUpdates {
  pub fn new(transport: Arc<dyn Transport>, config: &LiveConfig, initial_nodes: NodeMap) -> Self {
    let (nodes, _) = watch::channel(initial_nodes);
    let (state, _) = watch::channel(ConnectionState::Disconnected);
    Self {
      transport,
      config: config.clone(),
      nodes: Arc::new(nodes),
      state,
      notifier: Arc::new(NoopNotifier),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn LiveNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// The current node map. Changes whenever a status is merged or a local
  /// edit is applied.
  pub fn subscribe(&self) -> watch::Receiver<NodeMap> {
    self.nodes.subscribe()
  }

  pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
    self.state.subscribe()
  }

  /// A handle for applying local edits to the live node map.
  pub fn editor(&self) -> NodeEditor {
    NodeEditor {
      nodes: self.nodes.clone(),
    }
  }

  /// Run the connect / merge / reconnect loop.
  ///
  /// Returns when the server closes the connection normally or `cancel` is
  /// triggered. No merge is applied once cancellation has been observed.
  #[instrument(name = "live_updates", skip(self, cancel), fields(url = %self.config.url))]
  pub async fn run(self, cancel: CancellationToken) -> Result<(), LiveError> {
    info!("starting live updates");

    let delay = Duration::from_millis(self.config.reconnect_delay_ms);
    let mut attempts: u32 = 0;

    loop {
      let mut opened = false;
      let end = self.session(&cancel, &mut opened).await;
      self.set_state(ConnectionState::Disconnected);

      match end {
        SessionEnd::Cancelled => {
          info!("live updates cancelled");
          return Ok(());
        }
        SessionEnd::Closed(Some(NORMAL_CLOSURE)) => {
          info!("live connection closed normally");
          return Ok(());
        }
        SessionEnd::Closed(code) => {
          warn!(code = ?code, "live connection closed");
        }
        SessionEnd::Failed(e) => {
          warn!(error = %e, "live connection failed");
        }
      }

      if opened {
        attempts = 0;
      }
      if let Some(max) = self.config.max_reconnect_attempts {
        if attempts >= max {
          error!(attempts, "giving up on live updates");
          self.notifier.notify(LiveEvent::GaveUp { attempts });
          return Err(LiveError::GaveUp { attempts });
        }
      }
      attempts += 1;

      info!(attempt = attempts, delay_ms = self.config.reconnect_delay_ms, "reconnecting");
      self.notifier.notify(LiveEvent::Reconnecting {
        attempt: attempts,
        delay_ms: self.config.reconnect_delay_ms,
      });

      tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          info!("live updates cancelled");
          return Ok(());
        }
        _ = tokio::time::sleep(delay) => {}
      }
    }
  }

  async fn session(&self, cancel: &CancellationToken, opened: &mut bool) -> SessionEnd {
    self.set_state(ConnectionState::Connecting);
    let connected = tokio::select! {
      biased;
      _ = cancel.cancelled() => return SessionEnd::Cancelled,
      connected = self.transport.connect() => connected,
    };
    let mut connection = match connected {
      Ok(connection) => connection,
      Err(e) => return SessionEnd::Failed(e),
    };

    self.set_state(ConnectionState::Open);
    info!("live connection open");

    if let Err(e) = self.send_handshake(connection.as_mut()).await {
      return SessionEnd::Failed(e);
    }
    // Only a subscribed session counts towards resetting the attempt count.
    *opened = true;

    loop {
      let frame = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        frame = connection.next_frame() => Some(frame),
      };
      let Some(frame) = frame else {
        if let Err(e) = connection.close().await {
          debug!(error = %e, "error closing live connection");
        }
        return SessionEnd::Cancelled;
      };

      match frame {
        Ok(Some(Frame::Text(text))) => self.handle_text(&text),
        Ok(Some(Frame::Close(code))) => return SessionEnd::Closed(code),
        Ok(None) => return SessionEnd::Closed(None),
        Err(e) => return SessionEnd::Failed(e),
      }
    }
  }

  async fn send_handshake(&self, connection: &mut dyn Connection) -> Result<(), LiveError> {
    let token = self.config.cookie.as_deref().and_then(csrf_token);
    if token.is_none() {
      warn!("no csrftoken cookie, subscribing without xrftoken");
    }
    connection.send(Handshake::new(token).to_json()?).await
  }

  fn handle_text(&self, text: &str) {
    let message = match InboundMessage::parse(text) {
      Ok(message) => message,
      Err(e) => {
        debug!(error = %e, "dropping unparseable message");
        return;
      }
    };

    match message.classify() {
      LiveMessage::Status(patch) => self.merge(&patch),
      LiveMessage::LimitReached => {
        warn!("live event limit reached, updates may be missing");
        self.notifier.notify(LiveEvent::LimitReached);
      }
      LiveMessage::Other => debug!("ignoring message"),
    }
  }

  /// Replace status fields on every node the patch is keyed to.
  fn merge(&self, patch: &StatusPatch) {
    let mut node_ids = Vec::new();
    self.nodes.send_if_modified(|nodes| {
      for node in nodes.values_mut() {
        if node.matches_status(patch) {
          node.apply_status(patch);
          node_ids.push(node.id);
        }
      }
      !node_ids.is_empty()
    });

    if node_ids.is_empty() {
      debug!(
        unified_job_id = ?patch.unified_job_id,
        inventory_source_id = ?patch.inventory_source_id,
        "status for unknown node dropped"
      );
      return;
    }
    debug!(nodes = node_ids.len(), status = ?patch.status, "merged status");
    self.notifier.notify(LiveEvent::NodesUpdated { node_ids });
  }

  fn set_state(&self, state: ConnectionState) {
    if self.state.send_replace(state) != state {
      debug!(state = %state, "connection state changed");
      self.notifier.notify(LiveEvent::StateChanged { state });
    }
  }
}

/// Applies local edits to the node map shared with [`LiveUpdates`].
#[derive(Clone)]
pub struct NodeEditor {
  nodes: Arc<watch::Sender<NodeMap>>,
}

impl NodeEditor {
  /// Merge `patch` into a node. Returns false for unknown ids or when
  /// nothing changed.
  pub fn apply(&self, node_id: NodeId, patch: &NodePatch) -> bool {
    self
      .nodes
      .send_if_modified(|nodes| nodes.get_mut(&node_id).is_some_and(|node| node.apply(patch)))
  }

  pub fn snapshot(&self) -> NodeMap {
    self.nodes.borrow().clone()
  }
}
