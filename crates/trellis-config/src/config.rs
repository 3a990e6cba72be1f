use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::LayoutConfig;
use crate::live::LiveConfig;

/// Top-level trellis configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub live: LiveConfig,
  pub layout: LayoutConfig,
}

impl Config {
  /// Load configuration from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load configuration from a JSON file, falling back to defaults when the
  /// file does not exist. Any other I/O or parse failure is still an error.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    if path.exists() {
      Self::load(path)
    } else {
      Ok(Self::default())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.live.reconnect_delay_ms, 1000);
    assert_eq!(config.live.max_reconnect_attempts, None);
    assert_eq!(config.layout.rank_sep, 120.0);
    assert_eq!(config.layout.start_width, 72.0);
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
      file,
      r#"{{ "live": {{ "url": "wss://example.com/websocket/", "max_reconnect_attempts": 5 }} }}"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.live.url, "wss://example.com/websocket/");
    assert_eq!(config.live.max_reconnect_attempts, Some(5));
    assert_eq!(config.live.reconnect_delay_ms, 1000);
    assert_eq!(config.layout, LayoutConfig::default());
  }

  #[test]
  fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
  }

  #[test]
  fn test_invalid_json_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }
}
