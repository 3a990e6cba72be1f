//! Trellis Live
//!
//! Keeps a workflow's node list current with job status from the
//! controller's websocket feed.
//!
//! ```text
//! Disconnected ──► Connecting ──► Open ──► Disconnected
//!      ▲                                        │
//!      └──── reconnect after delay (code ≠ 1000) ┘
//! ```
//!
//! On connect a [`Handshake`] subscribes to `jobs.status_changed` and
//! `control.limit_reached`. Each status message is merged into the node whose
//! job (or template, or inventory source) it names, replacing only the
//! status and finished fields.

mod connection;
mod error;
mod events;
mod handshake;
mod message;
mod transport;
mod updates;
mod ws;

pub use connection::{ConnectionState, NORMAL_CLOSURE};
pub use error::LiveError;
pub use events::{ChannelNotifier, LiveEvent, LiveNotifier, NoopNotifier};
pub use handshake::{Handshake, csrf_token};
pub use message::{InboundMessage, LiveMessage};
pub use transport::{Connection, Frame, Transport};
pub use updates::{LiveUpdates, NodeEditor, NodeMap};
pub use ws::WsTransport;
