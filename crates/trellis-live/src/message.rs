//! Inbound messages from the live event feed.

use serde::Deserialize;
use trellis_graph::StatusPatch;

/// A message as it arrives on the socket. Only the fields reconciliation
/// reads are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
  #[serde(default, rename = "type")]
  pub kind: Option<String>,
  #[serde(default)]
  pub group_name: Option<String>,
  #[serde(default)]
  pub reason: Option<String>,
  #[serde(default)]
  pub unified_job_id: Option<u64>,
  #[serde(default)]
  pub inventory_source_id: Option<u64>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub finished: Option<String>,
}

/// What a message means to the visualizer.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveMessage {
  Status(StatusPatch),
  /// The broker is dropping events for this client.
  LimitReached,
  Other,
}

impl InboundMessage {
  pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }

  pub fn classify(self) -> LiveMessage {
    let is_limit = |s: &Option<String>| s.as_deref() == Some("limit_reached");
    let control = self.group_name.as_deref() == Some("control");
    if control || is_limit(&self.kind) || is_limit(&self.reason) {
      return LiveMessage::LimitReached;
    }

    let keyed = self.unified_job_id.is_some() || self.inventory_source_id.is_some();
    let has_fields = self.status.is_some() || self.finished.is_some();
    if !keyed || !has_fields {
      return LiveMessage::Other;
    }

    LiveMessage::Status(StatusPatch {
      unified_job_id: self.unified_job_id,
      inventory_source_id: self.inventory_source_id,
      status: self.status,
      finished: self.finished,
    })
  }
}
