use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
  #[default]
  Disconnected,
  Connecting,
  Open,
}

impl fmt::Display for ConnectionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Disconnected => "disconnected",
      Self::Connecting => "connecting",
      Self::Open => "open",
    };
    f.write_str(s)
  }
}

/// Close code of a normal closure. Any other code triggers a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;
