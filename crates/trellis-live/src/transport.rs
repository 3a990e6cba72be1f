//! The seam between reconciliation and the socket.
//!
//! [`LiveUpdates`](crate::LiveUpdates) only talks to a [`Transport`], so it
//! can be driven by an in-memory fake in tests.

use async_trait::async_trait;

use crate::error::LiveError;

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
  Text(String),
  /// The server closed the connection, with its close code if it sent one.
  Close(Option<u16>),
}

/// Opens connections to the live event feed.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn connect(&self) -> Result<Box<dyn Connection>, LiveError>;
}

/// One open connection.
#[async_trait]
pub trait Connection: Send {
  async fn send(&mut self, text: String) -> Result<(), LiveError>;

  /// Wait for the next frame. `None` means the stream ended without a close
  /// frame.
  async fn next_frame(&mut self) -> Result<Option<Frame>, LiveError>;

  async fn close(&mut self) -> Result<(), LiveError>;
}
