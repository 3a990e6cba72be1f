//! Left-to-right layout for the workflow canvas.
//!
//! Columns are the longest-path distance from the start node, rows the order
//! of node ids within a column. Ids are minted in insertion order, so an edit
//! elsewhere in the graph never reshuffles a column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_config::LayoutConfig;

use crate::node::NodeId;
use crate::workflow::WorkflowGraph;

/// A 2-D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

/// Where a node is drawn. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeBox {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
  pub column: usize,
  pub row: usize,
}

impl NodeBox {
  fn right_middle(&self) -> Point {
    Point {
      x: self.x + self.width,
      y: self.y + self.height / 2.0,
    }
  }

  fn left_middle(&self) -> Point {
    Point {
      x: self.x,
      y: self.y + self.height / 2.0,
    }
  }
}

/// A straight link segment between two node boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkPath {
  pub source: NodeId,
  pub target: NodeId,
  pub from: Point,
  pub to: Point,
}

/// Computed positions for a graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Layout {
  pub nodes: BTreeMap<NodeId, NodeBox>,
  pub links: Vec<LinkPath>,
}

impl Layout {
  pub fn get(&self, node_id: NodeId) -> Option<&NodeBox> {
    self.nodes.get(&node_id)
  }
}

/// Compute positions for every node and link in the graph.
pub fn compute_positions(graph: &WorkflowGraph, config: &LayoutConfig) -> Layout {
  let columns = assign_columns(graph);

  let column_count = columns.values().copied().max().map_or(0, |max| max + 1);
  let mut column_widths = vec![0.0_f64; column_count];
  let mut members: Vec<Vec<NodeId>> = vec![Vec::new(); column_count];
  for (id, column) in &columns {
    let (width, _) = node_size(*id, config);
    column_widths[*column] = column_widths[*column].max(width);
    members[*column].push(*id);
  }

  let mut column_x = Vec::with_capacity(column_count);
  let mut x = 0.0;
  for width in &column_widths {
    column_x.push(x);
    x += width + config.rank_sep;
  }

  let mut nodes = BTreeMap::new();
  for (column, ids) in members.iter().enumerate() {
    let mut y = 0.0;
    for (row, id) in ids.iter().enumerate() {
      let (width, height) = node_size(*id, config);
      nodes.insert(
        *id,
        NodeBox {
          x: column_x[column],
          y,
          width,
          height,
          column,
          row,
        },
      );
      y += height.max(config.node_height) + config.node_sep;
    }
  }

  let links = graph
    .links
    .iter()
    .filter_map(|link| {
      let source = nodes.get(&link.source)?;
      let target = nodes.get(&link.target)?;
      Some(LinkPath {
        source: link.source,
        target: link.target,
        from: source.right_middle(),
        to: target.left_middle(),
      })
    })
    .collect();

  Layout { nodes, links }
}

/// Longest-path column per node.
///
/// The start node sits in column 0. Other roots (orphans) run immediately
/// on launch, so they share column 1 with the start node's children. Nodes
/// on a cycle are appended after the last column.
fn assign_columns(graph: &WorkflowGraph) -> BTreeMap<NodeId, usize> {
  let topology = graph.topology();
  let (order, cyclic) = topology.topological_order();

  let mut columns: BTreeMap<NodeId, usize> = BTreeMap::new();
  for id in order {
    let column = topology
      .upstream(id)
      .iter()
      .filter_map(|parent| columns.get(parent))
      .map(|c| c + 1)
      .max()
      .unwrap_or(if id.is_start() { 0 } else { 1 });
    columns.insert(id, column);
  }

  let next = columns.values().copied().max().map_or(0, |max| max + 1);
  for id in cyclic {
    columns.insert(id, next);
  }

  columns
}

fn node_size(id: NodeId, config: &LayoutConfig) -> (f64, f64) {
  if id.is_start() {
    (config.start_width, config.start_height)
  } else {
    (config.node_width, config.node_height)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::link::{Link, LinkType};
  use crate::node::{Node, UnifiedJobTemplate};

  fn graph(ids: &[u32], edges: &[(u32, u32)]) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new();
    for id in ids {
      graph
        .nodes
        .insert(NodeId(*id), Node::new(NodeId(*id), UnifiedJobTemplate::default()));
    }
    graph.next_index = ids.iter().max().map_or(2, |max| max + 1);
    for (s, t) in edges {
      graph
        .links
        .push(Link::new(NodeId(*s), NodeId(*t), LinkType::Success));
    }
    graph
  }

  #[test]
  fn test_longest_path_columns() {
    // 1 -> 2 -> 3 -> 4 and a shortcut 1 -> 4
    let g = graph(&[2, 3, 4], &[(1, 2), (2, 3), (3, 4), (1, 4)]);
    let columns = assign_columns(&g);
    assert_eq!(columns[&NodeId(1)], 0);
    assert_eq!(columns[&NodeId(2)], 1);
    assert_eq!(columns[&NodeId(3)], 2);
    assert_eq!(columns[&NodeId(4)], 3);
  }

  #[test]
  fn test_orphans_share_first_column() {
    let g = graph(&[2, 3, 4], &[(1, 2), (3, 4)]);
    let columns = assign_columns(&g);
    assert_eq!(columns[&NodeId(2)], 1);
    assert_eq!(columns[&NodeId(3)], 1);
    assert_eq!(columns[&NodeId(4)], 2);
  }

  #[test]
  fn test_cycle_does_not_hang() {
    let g = graph(&[2, 3], &[(1, 2), (2, 3), (3, 2)]);
    let columns = assign_columns(&g);
    assert_eq!(columns[&NodeId(1)], 0);
    assert_eq!(columns[&NodeId(2)], 1);
    assert_eq!(columns[&NodeId(3)], 1);
  }

  #[test]
  fn test_start_node_uses_start_size() {
    let g = graph(&[2], &[(1, 2)]);
    let config = LayoutConfig::default();
    let layout = compute_positions(&g, &config);

    let start = layout.get(NodeId::START).unwrap();
    assert_eq!((start.width, start.height), (72.0, 40.0));
    let child = layout.get(NodeId(2)).unwrap();
    assert_eq!(child.x, 72.0 + 120.0);
  }
}
