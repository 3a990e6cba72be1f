use serde::{Deserialize, Serialize};

/// Settings for the live job-status connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
  /// Websocket endpoint, e.g. "wss://controller.example.com/websocket/"
  pub url: String,

  /// Raw `Cookie` header sent on connect. The `csrftoken` entry is echoed
  /// back in the subscription handshake.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cookie: Option<String>,

  /// Delay before reconnecting after an abnormal close.
  pub reconnect_delay_ms: u64,

  /// Give up after this many consecutive failed reconnects.
  /// `None` keeps retrying forever.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_reconnect_attempts: Option<u32>,
}

impl Default for LiveConfig {
  fn default() -> Self {
    Self {
      url: "ws://localhost:8013/websocket/".to_string(),
      cookie: None,
      reconnect_delay_ms: 1000,
      max_reconnect_attempts: None,
    }
  }
}
