use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::link::Link;
use crate::node::{Node, NodeId};

/// Graph structure for traversal and analysis.
#[derive(Debug, Clone)]
pub struct Topology {
  /// All node ids, in id order.
  node_ids: Vec<NodeId>,
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<NodeId, Vec<NodeId>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<NodeId, Vec<NodeId>>,
  /// Nodes with multiple incoming links (convergence points).
  convergence: HashSet<NodeId>,
}

impl Topology {
  /// Build a topology from nodes and links. Links touching unknown nodes
  /// are ignored.
  pub fn new(nodes: &BTreeMap<NodeId, Node>, links: &[Link]) -> Self {
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut reverse_adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    for node_id in nodes.keys() {
      adjacency.entry(*node_id).or_default();
      reverse_adjacency.entry(*node_id).or_default();
    }

    for link in links {
      if !nodes.contains_key(&link.source) || !nodes.contains_key(&link.target) {
        continue;
      }
      adjacency.entry(link.source).or_default().push(link.target);
      reverse_adjacency
        .entry(link.target)
        .or_default()
        .push(link.source);
    }

    let convergence: HashSet<NodeId> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| *id)
      .collect();

    Self {
      node_ids: nodes.keys().copied().collect(),
      adjacency,
      reverse_adjacency,
      convergence,
    }
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: NodeId) -> &[NodeId] {
    self
      .adjacency
      .get(&node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: NodeId) -> &[NodeId] {
    self
      .reverse_adjacency
      .get(&node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Check if a node has more than one incoming link.
  pub fn is_convergence(&self, node_id: NodeId) -> bool {
    self.convergence.contains(&node_id)
  }

  /// All convergence nodes, in id order.
  pub fn convergence_nodes(&self) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = self.convergence.iter().copied().collect();
    ids.sort();
    ids
  }

  /// Every node upstream of `node_id`, not including itself.
  pub fn ancestors(&self, node_id: NodeId) -> BTreeSet<NodeId> {
    self.walk(node_id, |id| self.upstream(id))
  }

  /// Every node downstream of `node_id`, not including itself.
  pub fn descendants(&self, node_id: NodeId) -> BTreeSet<NodeId> {
    self.walk(node_id, |id| self.downstream(id))
  }

  /// Nodes not reachable from `root`, in id order.
  pub fn unreachable(&self, root: NodeId) -> Vec<NodeId> {
    let reachable = self.descendants(root);
    self
      .node_ids
      .iter()
      .copied()
      .filter(|id| *id != root && !reachable.contains(id))
      .collect()
  }

  /// Kahn topological order, ties broken by id. The second list holds nodes
  /// left over because they sit on a cycle.
  pub fn topological_order(&self) -> (Vec<NodeId>, Vec<NodeId>) {
    let mut in_degree: BTreeMap<NodeId, usize> = self
      .node_ids
      .iter()
      .map(|id| (*id, self.upstream(*id).len()))
      .collect();

    let mut ready: BTreeSet<NodeId> = in_degree
      .iter()
      .filter(|(_, degree)| **degree == 0)
      .map(|(id, _)| *id)
      .collect();

    let mut order = Vec::with_capacity(self.node_ids.len());
    while let Some(id) = ready.pop_first() {
      order.push(id);
      for child in self.downstream(id) {
        if let Some(degree) = in_degree.get_mut(child) {
          *degree = degree.saturating_sub(1);
          if *degree == 0 {
            ready.insert(*child);
          }
        }
      }
    }

    let placed: HashSet<NodeId> = order.iter().copied().collect();
    let cyclic = self
      .node_ids
      .iter()
      .copied()
      .filter(|id| !placed.contains(id))
      .collect();

    (order, cyclic)
  }

  fn walk<'a>(&'a self, from: NodeId, next: impl Fn(NodeId) -> &'a [NodeId]) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<NodeId> = next(from).iter().copied().collect();
    while let Some(id) = queue.pop_front() {
      if id == from || !seen.insert(id) {
        continue;
      }
      queue.extend(next(id).iter().copied());
    }
    seen
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::link::LinkType;
  use crate::node::UnifiedJobTemplate;

  fn graph(ids: &[u32], edges: &[(u32, u32)]) -> (BTreeMap<NodeId, Node>, Vec<Link>) {
    let nodes = ids
      .iter()
      .map(|id| {
        let node = if *id == 1 {
          Node::start()
        } else {
          Node::new(NodeId(*id), UnifiedJobTemplate::default())
        };
        (NodeId(*id), node)
      })
      .collect();
    let links = edges
      .iter()
      .map(|(s, t)| Link::new(NodeId(*s), NodeId(*t), LinkType::Always))
      .collect();
    (nodes, links)
  }

  #[test]
  fn test_convergence_and_ancestors() {
    let (nodes, links) = graph(&[1, 2, 3, 4], &[(1, 2), (1, 3), (2, 4), (3, 4)]);
    let topology = Topology::new(&nodes, &links);

    assert!(topology.is_convergence(NodeId(4)));
    assert!(!topology.is_convergence(NodeId(2)));
    assert_eq!(
      topology.ancestors(NodeId(4)).into_iter().collect::<Vec<_>>(),
      vec![NodeId(1), NodeId(2), NodeId(3)]
    );
    assert!(topology.unreachable(NodeId::START).is_empty());
  }

  #[test]
  fn test_unreachable_nodes() {
    let (nodes, links) = graph(&[1, 2, 3, 4], &[(1, 2), (3, 4)]);
    let topology = Topology::new(&nodes, &links);
    assert_eq!(topology.unreachable(NodeId::START), vec![NodeId(3), NodeId(4)]);
  }

  #[test]
  fn test_links_to_unknown_nodes_ignored() {
    let (nodes, mut links) = graph(&[1, 2], &[(1, 2)]);
    links.push(Link::new(NodeId(2), NodeId(99), LinkType::Success));
    let topology = Topology::new(&nodes, &links);
    assert!(topology.downstream(NodeId(2)).is_empty());
  }

  #[test]
  fn test_topological_order_reports_cycles() {
    let (nodes, links) = graph(&[1, 2, 3, 4], &[(1, 2), (3, 4), (4, 3)]);
    let topology = Topology::new(&nodes, &links);
    let (order, cyclic) = topology.topological_order();
    assert_eq!(order, vec![NodeId(1), NodeId(2)]);
    assert_eq!(cyclic, vec![NodeId(3), NodeId(4)]);
  }
}
