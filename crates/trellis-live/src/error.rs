use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
  #[error("invalid websocket request for {url}: {message}")]
  InvalidRequest { url: String, message: String },

  #[error("failed to connect to {url}: {message}")]
  Connect { url: String, message: String },

  #[error("failed to send frame: {message}")]
  Send { message: String },

  #[error("failed to receive frame: {message}")]
  Receive { message: String },

  #[error("failed to encode handshake: {0}")]
  Handshake(#[from] serde_json::Error),

  #[error("gave up after {attempts} reconnect attempts")]
  GaveUp { attempts: u32 },
}
