use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::api::ApiWorkflowNode;
use crate::error::GraphError;
use crate::graph::Topology;
use crate::link::{Link, LinkType};
use crate::node::{Node, NodeId};

/// A snapshot of the workflow graph being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
  pub nodes: BTreeMap<NodeId, Node>,
  pub links: Vec<Link>,
  /// Next id to mint. Only ever increases.
  pub next_index: u32,
}

impl Default for WorkflowGraph {
  fn default() -> Self {
    Self::new()
  }
}

impl WorkflowGraph {
  /// A graph holding only the start node.
  pub fn new() -> Self {
    Self {
      nodes: BTreeMap::from([(NodeId::START, Node::start())]),
      links: Vec::new(),
      next_index: NodeId::START.0 + 1,
    }
  }

  /// Build a graph from API node records.
  ///
  /// Nodes get visualizer ids 2, 3, ... in input order. Every node that is
  /// nobody's child is linked from the start node with an `always` link.
  pub fn from_api(api_nodes: &[ApiWorkflowNode]) -> Result<Self, GraphError> {
    let mut graph = Self::new();
    let mut id_map: HashMap<u64, NodeId> = HashMap::with_capacity(api_nodes.len());

    for api_node in api_nodes {
      let id = graph.mint_id();
      let capabilities = api_node.summary_fields.user_capabilities.unwrap_or_default();
      graph.nodes.insert(
        id,
        Node {
          id,
          unified_job_template: api_node.summary_fields.unified_job_template.clone(),
          job: api_node.summary_fields.job.clone(),
          persisted: Some(api_node.persisted()),
          can_edit: capabilities.edit,
          can_delete: capabilities.delete,
          is_start_node: false,
          is_edited: false,
          is_invalid_link_target: false,
          position: None,
        },
      );
      id_map.insert(api_node.id, id);
    }

    let mut children: HashSet<u64> = HashSet::new();
    for api_node in api_nodes {
      let source = id_map[&api_node.id];
      let typed = [
        (LinkType::Success, &api_node.success_nodes),
        (LinkType::Failure, &api_node.failure_nodes),
        (LinkType::Always, &api_node.always_nodes),
      ];
      for (link_type, targets) in typed {
        for target_id in targets {
          let target = *id_map.get(target_id).ok_or(GraphError::UnknownNode {
            from: api_node.id,
            to: *target_id,
          })?;
          graph.insert_link(Link::new(source, target, link_type));
          children.insert(*target_id);
        }
      }
    }

    for api_node in api_nodes {
      if !children.contains(&api_node.id) {
        graph.insert_link(Link::new(NodeId::START, id_map[&api_node.id], LinkType::Always));
      }
    }

    Ok(graph)
  }

  pub fn topology(&self) -> Topology {
    Topology::new(&self.nodes, &self.links)
  }

  pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
    self.nodes.get(&node_id)
  }

  pub fn find_link(&self, source: NodeId, target: NodeId) -> Option<&Link> {
    self.links.iter().find(|l| l.connects(source, target))
  }

  /// Number of links pointing at `node_id`.
  pub fn incoming(&self, node_id: NodeId) -> usize {
    self.links.iter().filter(|l| l.target == node_id).count()
  }

  /// Insert a link unless one already connects the same pair. Returns true
  /// if inserted.
  pub fn insert_link(&mut self, link: Link) -> bool {
    if self.find_link(link.source, link.target).is_some() {
      return false;
    }
    self.links.push(link);
    true
  }

  pub(crate) fn mint_id(&mut self) -> NodeId {
    let id = NodeId(self.next_index);
    self.next_index += 1;
    id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::SummaryFields;
  use crate::node::{TemplateKind, UnifiedJobTemplate};

  fn api_node(id: u64, success: &[u64], always: &[u64]) -> ApiWorkflowNode {
    ApiWorkflowNode {
      id,
      success_nodes: success.to_vec(),
      failure_nodes: vec![],
      always_nodes: always.to_vec(),
      summary_fields: SummaryFields {
        unified_job_template: Some(UnifiedJobTemplate::new(
          id,
          format!("JT {}", id),
          TemplateKind::JobTemplate,
        )),
        ..Default::default()
      },
    }
  }

  #[test]
  fn test_from_api_assigns_ids_and_root_links() {
    let api = vec![
      api_node(1, &[3], &[2]),
      api_node(2, &[], &[]),
      api_node(3, &[], &[]),
      api_node(4, &[], &[2]),
    ];
    let graph = WorkflowGraph::from_api(&api).unwrap();

    assert_eq!(graph.nodes.len(), 5);
    assert_eq!(graph.next_index, 6);
    assert_eq!(graph.nodes[&NodeId(2)].server_id(), Some(1));
    assert_eq!(graph.nodes[&NodeId(5)].name(), "JT 4");

    let expected = vec![
      Link::new(NodeId(2), NodeId(4), LinkType::Success),
      Link::new(NodeId(2), NodeId(3), LinkType::Always),
      Link::new(NodeId(5), NodeId(3), LinkType::Always),
      Link::new(NodeId(1), NodeId(2), LinkType::Always),
      Link::new(NodeId(1), NodeId(5), LinkType::Always),
    ];
    assert_eq!(graph.links, expected);
  }

  #[test]
  fn test_from_api_rejects_unknown_target() {
    let api = vec![api_node(1, &[77], &[])];
    let err = WorkflowGraph::from_api(&api).unwrap_err();
    assert!(matches!(err, GraphError::UnknownNode { from: 1, to: 77 }));
  }

  #[test]
  fn test_insert_link_is_unique_per_pair() {
    let mut graph = WorkflowGraph::new();
    let id = graph.mint_id();
    graph
      .nodes
      .insert(id, Node::new(id, UnifiedJobTemplate::default()));

    assert!(graph.insert_link(Link::new(NodeId::START, id, LinkType::Always)));
    assert!(!graph.insert_link(Link::new(NodeId::START, id, LinkType::Success)));
    assert_eq!(graph.links.len(), 1);
  }
}
