//! Trellis Config
//!
//! Serializable configuration for the trellis workflow visualizer.
//!
//! Configuration is loaded from a JSON file (via CLI with `--config=config.json`,
//! default `~/.trellis/config.json`). Every field has a default, so a partial
//! file or no file at all yields a working configuration.
//!
//! ```json
//! {
//!   "live": { "url": "wss://controller.example.com/websocket/", "reconnect_delay_ms": 1000 },
//!   "layout": { "rank_sep": 150 }
//! }
//! ```

mod config;
mod error;
mod layout;
mod live;

pub use config::Config;
pub use error::ConfigError;
pub use layout::LayoutConfig;
pub use live::LiveConfig;
