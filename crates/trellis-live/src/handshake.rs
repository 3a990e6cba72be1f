use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LiveError;

/// First message sent on a new connection: the event groups to subscribe to,
/// authenticated with the CSRF token from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub xrftoken: Option<String>,
  pub groups: BTreeMap<String, Vec<String>>,
}

impl Handshake {
  /// Subscribe to job status changes and the control channel.
  pub fn new(xrftoken: Option<String>) -> Self {
    let groups = BTreeMap::from([
      ("control".to_string(), vec!["limit_reached".to_string()]),
      ("jobs".to_string(), vec!["status_changed".to_string()]),
    ]);
    Self { xrftoken, groups }
  }

  pub fn to_json(&self) -> Result<String, LiveError> {
    Ok(serde_json::to_string(self)?)
  }
}

/// Extract the `csrftoken` value from a `Cookie` header.
pub fn csrf_token(cookie: &str) -> Option<String> {
  cookie
    .split(';')
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == "csrftoken")
    .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_csrf_token() {
    assert_eq!(
      csrf_token("sessionid=xyz; csrftoken=abc123; userLoggedIn=true"),
      Some("abc123".to_string())
    );
    assert_eq!(csrf_token("csrftoken="), Some(String::new()));
    assert_eq!(csrf_token("sessionid=xyz"), None);
    assert_eq!(csrf_token(""), None);
  }

  #[test]
  fn test_handshake_json() {
    let json: serde_json::Value =
      serde_json::from_str(&Handshake::new(Some("abc".into())).to_json().unwrap()).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "xrftoken": "abc",
        "groups": {
          "jobs": ["status_changed"],
          "control": ["limit_reached"],
        },
      })
    );
  }

  #[test]
  fn test_handshake_without_token() {
    let json = Handshake::new(None).to_json().unwrap();
    assert!(!json.contains("xrftoken"));
  }
}
