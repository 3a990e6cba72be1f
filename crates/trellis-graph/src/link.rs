use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// When a link is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
  Success,
  Failure,
  Always,
}

impl fmt::Display for LinkType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Success => write!(f, "success"),
      Self::Failure => write!(f, "failure"),
      Self::Always => write!(f, "always"),
    }
  }
}

/// A directed, typed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub source: NodeId,
  pub target: NodeId,
  pub link_type: LinkType,
  /// Set when the link is staged for deletion and its target has other
  /// parents.
  #[serde(default)]
  pub is_convergence_link: bool,
}

impl Link {
  pub fn new(source: NodeId, target: NodeId, link_type: LinkType) -> Self {
    Self {
      source,
      target,
      link_type,
      is_convergence_link: false,
    }
  }

  pub fn connects(&self, source: NodeId, target: NodeId) -> bool {
    self.source == source && self.target == target
  }
}
