use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("workflow node {from} links to unknown node {to}")]
  UnknownNode { from: u64, to: u64 },

  #[error("link {from} -> {to} references a node missing from the graph")]
  UnresolvedLink { from: NodeId, to: NodeId },
}
