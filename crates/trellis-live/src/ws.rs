//! Websocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use trellis_config::LiveConfig;

use crate::error::LiveError;
use crate::transport::{Connection, Frame, Transport};

/// Connects to the controller's websocket endpoint, forwarding the session
/// cookie so the broker can authenticate the subscription.
#[derive(Debug, Clone)]
pub struct WsTransport {
  url: String,
  cookie: Option<String>,
}

impl WsTransport {
  pub fn new(url: impl Into<String>, cookie: Option<String>) -> Self {
    Self {
      url: url.into(),
      cookie,
    }
  }

  pub fn from_config(config: &LiveConfig) -> Self {
    Self::new(config.url.clone(), config.cookie.clone())
  }

  fn invalid(&self, message: impl ToString) -> LiveError {
    LiveError::InvalidRequest {
      url: self.url.clone(),
      message: message.to_string(),
    }
  }
}

#[async_trait]
impl Transport for WsTransport {
  async fn connect(&self) -> Result<Box<dyn Connection>, LiveError> {
    let mut request = self
      .url
      .as_str()
      .into_client_request()
      .map_err(|e| self.invalid(e))?;
    if let Some(cookie) = &self.cookie {
      let value = HeaderValue::from_str(cookie).map_err(|e| self.invalid(e))?;
      request.headers_mut().insert(COOKIE, value);
    }

    let (stream, response) = connect_async(request)
      .await
      .map_err(|e| LiveError::Connect {
        url: self.url.clone(),
        message: e.to_string(),
      })?;
    debug!(url = %self.url, status = %response.status(), "websocket upgraded");

    Ok(Box::new(WsConnection { stream }))
  }
}

struct WsConnection {
  stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
  async fn send(&mut self, text: String) -> Result<(), LiveError> {
    self
      .stream
      .send(Message::Text(text))
      .await
      .map_err(|e| LiveError::Send {
        message: e.to_string(),
      })
  }

  async fn next_frame(&mut self) -> Result<Option<Frame>, LiveError> {
    while let Some(message) = self.stream.next().await {
      let message = message.map_err(|e| LiveError::Receive {
        message: e.to_string(),
      })?;
      match message {
        Message::Text(text) => return Ok(Some(Frame::Text(text))),
        Message::Close(frame) => return Ok(Some(Frame::Close(frame.map(|f| u16::from(f.code))))),
        // Pings are answered by tungstenite; nothing else is expected.
        _ => continue,
      }
    }
    Ok(None)
  }

  async fn close(&mut self) -> Result<(), LiveError> {
    self.stream.close(None).await.map_err(|e| LiveError::Send {
      message: e.to_string(),
    })
  }
}
