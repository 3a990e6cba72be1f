//! Integration tests for the canvas layout.

use trellis_config::LayoutConfig;
use trellis_graph::{
  Action, LinkType, NodeId, TemplateKind, UnifiedJobTemplate, VisualizerState, compute_positions,
  reduce,
};

fn add(state: VisualizerState, parent: u32, template_id: u64) -> VisualizerState {
  reduce(
    state,
    Action::AddNode {
      parent: NodeId(parent),
      target: None,
      link_type: LinkType::Success,
      template: UnifiedJobTemplate::new(template_id, "JT", TemplateKind::JobTemplate),
    },
  )
}

/// start(1) -> 2 -> 3, 2 -> 4
fn tree() -> VisualizerState {
  let state = add(VisualizerState::new(), 1, 10);
  let state = add(state, 2, 11);
  add(state, 2, 12)
}

#[test]
fn test_layout_is_deterministic() {
  let state = tree();
  let config = LayoutConfig::default();
  assert_eq!(
    compute_positions(&state.graph, &config),
    compute_positions(&state.graph, &config)
  );
}

#[test]
fn test_columns_and_rows() {
  let layout = compute_positions(&tree().graph, &LayoutConfig::default());

  let node = |id| layout.get(NodeId(id)).copied().unwrap();
  assert_eq!((node(1).column, node(1).row), (0, 0));
  assert_eq!((node(2).column, node(2).row), (1, 0));
  assert_eq!((node(3).column, node(3).row), (2, 0));
  assert_eq!((node(4).column, node(4).row), (2, 1));

  // start is 72 wide, regular nodes 180; columns are 120 apart
  assert_eq!(node(2).x, 192.0);
  assert_eq!(node(3).x, 192.0 + 180.0 + 120.0);
  assert_eq!(node(4).y, 60.0 + 30.0);
}

#[test]
fn test_link_paths_join_box_edges() {
  let layout = compute_positions(&tree().graph, &LayoutConfig::default());

  let path = layout
    .links
    .iter()
    .find(|l| l.source == NodeId(1) && l.target == NodeId(2))
    .unwrap();
  assert_eq!((path.from.x, path.from.y), (72.0, 20.0));
  assert_eq!((path.to.x, path.to.y), (192.0, 30.0));
  assert_eq!(layout.links.len(), 3);
}

#[test]
fn test_unrelated_edit_does_not_move_existing_nodes() {
  let config = LayoutConfig::default();
  let before = compute_positions(&tree().graph, &config);
  let after = compute_positions(&add(tree(), 4, 13).graph, &config);

  for (id, node) in &before.nodes {
    assert_eq!(after.get(*id), Some(node), "node {} moved", id);
  }
}

#[test]
fn test_custom_spacing() {
  let config = LayoutConfig {
    rank_sep: 50.0,
    node_sep: 10.0,
    ..Default::default()
  };
  let layout = compute_positions(&tree().graph, &config);
  assert_eq!(layout.get(NodeId(2)).map(|n| n.x), Some(72.0 + 50.0));
  assert_eq!(layout.get(NodeId(4)).map(|n| n.y), Some(70.0));
}
