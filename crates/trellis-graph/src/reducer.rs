//! Visualizer state and the reducer that drives it.
//!
//! Every user action on the canvas is an [`Action`]; [`reduce`] turns the
//! current [`VisualizerState`] and an action into the next state. The reducer
//! never fails: actions naming ids that no longer exist leave the state as it
//! was, so stale references from the UI cannot break the visualizer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::ApiWorkflowNode;
use crate::link::{Link, LinkType};
use crate::node::{Node, NodeId, NodePatch, StatusPatch, UnifiedJobTemplate};
use crate::workflow::WorkflowGraph;

/// Everything the visualizer tracks while a workflow is being edited.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualizerState {
  pub graph: WorkflowGraph,
  /// Node staged for deletion (confirmation modal open).
  pub node_to_delete: Option<NodeId>,
  pub node_to_edit: Option<NodeId>,
  /// Link staged for deletion, with `is_convergence_link` computed.
  pub link_to_delete: Option<Link>,
  pub link_to_edit: Option<Link>,
  pub add_link_source: Option<NodeId>,
  pub add_link_target: Option<NodeId>,
  pub adding_link: bool,
  /// Server ids of saved nodes removed in this session.
  pub deleted_node_ids: Vec<u64>,
  /// Nodes left without a parent by a delete that could not relink them.
  /// They run immediately on launch.
  pub orphaned_node_ids: BTreeSet<NodeId>,
  pub unsaved_changes: bool,
  pub content_error: Option<String>,
}

impl VisualizerState {
  pub fn new() -> Self {
    Self::default()
  }

  /// State for a workflow loaded from the API.
  pub fn from_graph(graph: WorkflowGraph) -> Self {
    Self {
      graph,
      ..Default::default()
    }
  }
}

/// A user action on the visualizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
  /// Replace the graph with nodes fetched from the API.
  Load { nodes: Vec<ApiWorkflowNode> },
  /// Back to an empty graph.
  Reset,
  /// Add a node below `parent`. With `target`, the node is spliced into the
  /// existing `parent -> target` link.
  AddNode {
    parent: NodeId,
    #[serde(default)]
    target: Option<NodeId>,
    link_type: LinkType,
    template: UnifiedJobTemplate,
  },
  UpdateNode { node_id: NodeId, patch: NodePatch },
  SetNodeToEdit { node_id: Option<NodeId> },
  SetNodeToDelete { node_id: Option<NodeId> },
  DeleteNode { node_id: NodeId },
  DeleteAllNodes,
  SetLinkToDelete { source: NodeId, target: NodeId },
  CancelDeleteLink,
  DeleteLink,
  SelectSourceForLinking { node_id: NodeId },
  SetLinkTarget { node_id: NodeId },
  CreateLink { link_type: LinkType },
  CancelLink,
  SetLinkToEdit { source: NodeId, target: NodeId },
  UpdateLink { link_type: LinkType },
  /// Status update from the live feed. Never changes topology.
  MergeStatus(StatusPatch),
}

/// Apply an action to the state.
pub fn reduce(state: VisualizerState, action: Action) -> VisualizerState {
  match action {
    Action::Load { nodes } => load(state, &nodes),
    Action::Reset => VisualizerState::new(),
    Action::AddNode {
      parent,
      target,
      link_type,
      template,
    } => add_node(state, parent, target, link_type, template),
    Action::UpdateNode { node_id, patch } => update_node(state, node_id, &patch),
    Action::SetNodeToEdit { node_id } => VisualizerState {
      node_to_edit: node_id.filter(|id| state.graph.nodes.contains_key(id) && !id.is_start()),
      ..state
    },
    Action::SetNodeToDelete { node_id } => VisualizerState {
      node_to_delete: node_id.filter(|id| state.graph.nodes.contains_key(id) && !id.is_start()),
      ..state
    },
    Action::DeleteNode { node_id } => delete_node(state, node_id),
    Action::DeleteAllNodes => delete_all_nodes(state),
    Action::SetLinkToDelete { source, target } => set_link_to_delete(state, source, target),
    Action::CancelDeleteLink => VisualizerState {
      link_to_delete: None,
      ..state
    },
    Action::DeleteLink => delete_link(state),
    Action::SelectSourceForLinking { node_id } => select_source_for_linking(state, node_id),
    Action::SetLinkTarget { node_id } => set_link_target(state, node_id),
    Action::CreateLink { link_type } => create_link(state, link_type),
    Action::CancelLink => cancel_link(state),
    Action::SetLinkToEdit { source, target } => {
      let link_to_edit = state.graph.find_link(source, target).cloned();
      VisualizerState {
        link_to_edit,
        ..state
      }
    }
    Action::UpdateLink { link_type } => update_link(state, link_type),
    Action::MergeStatus(patch) => merge_status(state, &patch),
  }
}

fn load(state: VisualizerState, nodes: &[ApiWorkflowNode]) -> VisualizerState {
  match WorkflowGraph::from_api(nodes) {
    Ok(graph) => VisualizerState::from_graph(graph),
    Err(e) => {
      warn!(error = %e, "failed to load workflow nodes");
      VisualizerState {
        content_error: Some(e.to_string()),
        ..state
      }
    }
  }
}

fn add_node(
  mut state: VisualizerState,
  parent: NodeId,
  target: Option<NodeId>,
  link_type: LinkType,
  template: UnifiedJobTemplate,
) -> VisualizerState {
  if !state.graph.nodes.contains_key(&parent) {
    debug!(parent = %parent, "add node ignored: unknown parent");
    return state;
  }
  let splice = target.filter(|t| state.graph.find_link(parent, *t).is_some());
  if target.is_some() && splice.is_none() {
    debug!(parent = %parent, "add node ignored: no link to splice into");
    return state;
  }

  let id = state.graph.mint_id();
  state.graph.nodes.insert(id, Node::new(id, template));

  if let Some(target) = splice {
    for link in state.graph.links.iter_mut() {
      if link.connects(parent, target) {
        link.source = id;
      }
    }
  }
  state.graph.links.push(Link::new(parent, id, link_type));

  state.unsaved_changes = true;
  state
}

fn update_node(mut state: VisualizerState, node_id: NodeId, patch: &NodePatch) -> VisualizerState {
  if node_id.is_start() {
    return state;
  }
  let Some(node) = state.graph.nodes.get_mut(&node_id) else {
    debug!(node_id = %node_id, "update ignored: unknown node");
    return state;
  };

  if node.apply(patch) {
    state.unsaved_changes = true;
  }
  if state.node_to_edit == Some(node_id) {
    state.node_to_edit = None;
  }
  state
}

fn delete_node(mut state: VisualizerState, node_id: NodeId) -> VisualizerState {
  if node_id.is_start() {
    debug!("delete ignored: start node");
    return state;
  }
  let Some(node) = state.graph.nodes.remove(&node_id) else {
    debug!(node_id = %node_id, "delete ignored: unknown node");
    return state;
  };

  if let Some(server_id) = node.server_id() {
    state.deleted_node_ids.push(server_id);
  }

  let mut parents = Vec::new();
  let mut children = Vec::new();
  state.graph.links.retain(|link| {
    if link.target == node_id {
      parents.push(link.source);
      false
    } else if link.source == node_id {
      children.push((link.target, link.link_type));
      false
    } else {
      true
    }
  });

  let orphans: Vec<(NodeId, LinkType)> = children
    .into_iter()
    .filter(|(child, _)| state.graph.incoming(*child) == 0)
    .collect();

  match parents.as_slice() {
    [parent] => {
      for (child, link_type) in orphans {
        let link_type = if parent.is_start() {
          LinkType::Always
        } else {
          link_type
        };
        state.graph.insert_link(Link::new(*parent, child, link_type));
      }
    }
    _ => {
      for (child, _) in orphans {
        warn!(node_id = %child, "node orphaned, will run immediately on launch");
        state.orphaned_node_ids.insert(child);
      }
    }
  }

  state.orphaned_node_ids.remove(&node_id);
  if state.node_to_delete == Some(node_id) {
    state.node_to_delete = None;
  }
  if state.node_to_edit == Some(node_id) {
    state.node_to_edit = None;
  }
  clear_stale_links(&mut state);
  state.unsaved_changes = true;
  state
}

fn delete_all_nodes(state: VisualizerState) -> VisualizerState {
  let mut graph = state.graph;
  let mut deleted_node_ids = state.deleted_node_ids;

  deleted_node_ids.extend(
    graph
      .nodes
      .values()
      .filter(|n| !n.id.is_start())
      .filter_map(Node::server_id),
  );
  graph.nodes.retain(|id, _| id.is_start());
  graph
    .nodes
    .entry(NodeId::START)
    .or_insert_with(Node::start)
    .is_invalid_link_target = false;
  graph.links.clear();

  VisualizerState {
    graph,
    deleted_node_ids,
    unsaved_changes: true,
    ..Default::default()
  }
}

fn set_link_to_delete(state: VisualizerState, source: NodeId, target: NodeId) -> VisualizerState {
  let Some(link) = state.graph.find_link(source, target) else {
    debug!(source = %source, target = %target, "unknown link");
    return state;
  };
  let mut staged = link.clone();
  staged.is_convergence_link = state.graph.incoming(target) > 1;

  VisualizerState {
    link_to_delete: Some(staged),
    ..state
  }
}

fn delete_link(mut state: VisualizerState) -> VisualizerState {
  let Some(staged) = state.link_to_delete.take() else {
    return state;
  };
  let before = state.graph.links.len();
  state
    .graph
    .links
    .retain(|l| !l.connects(staged.source, staged.target));
  if state.graph.links.len() == before {
    return state;
  }

  // The staged flag can be stale if the other parent was deleted since.
  if state.graph.incoming(staged.target) == 0 {
    state
      .graph
      .insert_link(Link::new(NodeId::START, staged.target, LinkType::Always));
  }

  state.unsaved_changes = true;
  state
}

fn select_source_for_linking(mut state: VisualizerState, source: NodeId) -> VisualizerState {
  if !state.graph.nodes.contains_key(&source) {
    return state;
  }

  let topology = state.graph.topology();
  let mut invalid: BTreeSet<NodeId> = topology.ancestors(source);
  invalid.extend(topology.downstream(source).iter().copied());
  invalid.insert(source);
  // Every node descends from start; linking to it is never an option anyway.
  invalid.insert(NodeId::START);

  for node in state.graph.nodes.values_mut() {
    node.is_invalid_link_target = invalid.contains(&node.id);
  }

  state.add_link_source = Some(source);
  state.add_link_target = None;
  state.adding_link = true;
  state
}

fn set_link_target(state: VisualizerState, target: NodeId) -> VisualizerState {
  let valid = state.adding_link
    && state
      .graph
      .get_node(target)
      .is_some_and(|n| !n.is_invalid_link_target);
  if !valid {
    return state;
  }
  VisualizerState {
    add_link_target: Some(target),
    ..state
  }
}

fn create_link(state: VisualizerState, link_type: LinkType) -> VisualizerState {
  let (Some(source), Some(target)) = (state.add_link_source, state.add_link_target) else {
    return state;
  };
  let target_ok = state
    .graph
    .get_node(target)
    .is_some_and(|n| !n.is_invalid_link_target);
  if !state.graph.nodes.contains_key(&source) || !target_ok {
    return state;
  }

  let mut state = cancel_link(state);
  state
    .graph
    .links
    .retain(|l| !(l.source.is_start() && l.target == target));
  state.graph.insert_link(Link::new(source, target, link_type));
  state.orphaned_node_ids.remove(&target);
  state.unsaved_changes = true;
  state
}

fn cancel_link(mut state: VisualizerState) -> VisualizerState {
  for node in state.graph.nodes.values_mut() {
    node.is_invalid_link_target = false;
  }
  state.add_link_source = None;
  state.add_link_target = None;
  state.adding_link = false;
  state
}

fn update_link(mut state: VisualizerState, link_type: LinkType) -> VisualizerState {
  let Some(staged) = state.link_to_edit.take() else {
    return state;
  };
  let mut changed = false;
  for link in state.graph.links.iter_mut() {
    if link.connects(staged.source, staged.target) && link.link_type != link_type {
      link.link_type = link_type;
      changed = true;
    }
  }
  if changed {
    state.unsaved_changes = true;
  }
  state
}

fn merge_status(mut state: VisualizerState, patch: &StatusPatch) -> VisualizerState {
  for node in state.graph.nodes.values_mut() {
    if node.matches_status(patch) {
      node.apply_status(patch);
    }
  }
  state
}

/// Drop staged links and link-mode selections that point at removed nodes.
fn clear_stale_links(state: &mut VisualizerState) {
  let nodes = &state.graph.nodes;
  let alive = |link: &Link| nodes.contains_key(&link.source) && nodes.contains_key(&link.target);
  if state.link_to_delete.as_ref().is_some_and(|l| !alive(l)) {
    state.link_to_delete = None;
  }
  if state.link_to_edit.as_ref().is_some_and(|l| !alive(l)) {
    state.link_to_edit = None;
  }
  if state.add_link_source.is_some_and(|id| !nodes.contains_key(&id))
    || state.add_link_target.is_some_and(|id| !nodes.contains_key(&id))
  {
    *state = cancel_link(std::mem::take(state));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::TemplateKind;

  fn template(id: u64, name: &str) -> UnifiedJobTemplate {
    UnifiedJobTemplate::new(id, name, TemplateKind::JobTemplate)
  }

  /// start(1) -> 2 -> 3 -> 4, all `always`.
  fn chain() -> VisualizerState {
    let mut state = VisualizerState::new();
    for (parent, name) in [(1, "A"), (2, "B"), (3, "C")] {
      state = reduce(
        state,
        Action::AddNode {
          parent: NodeId(parent),
          target: None,
          link_type: LinkType::Always,
          template: template(parent as u64 + 100, name),
        },
      );
    }
    state.unsaved_changes = false;
    state
  }

  #[test]
  fn test_set_node_to_delete_rejects_start() {
    let state = reduce(
      chain(),
      Action::SetNodeToDelete {
        node_id: Some(NodeId::START),
      },
    );
    assert_eq!(state.node_to_delete, None);

    let state = reduce(
      state,
      Action::SetNodeToDelete {
        node_id: Some(NodeId(3)),
      },
    );
    assert_eq!(state.node_to_delete, Some(NodeId(3)));
  }

  #[test]
  fn test_delete_clears_staged_markers() {
    let state = reduce(
      chain(),
      Action::SetNodeToDelete {
        node_id: Some(NodeId(3)),
      },
    );
    let state = reduce(
      state,
      Action::SetLinkToEdit {
        source: NodeId(3),
        target: NodeId(4),
      },
    );
    let state = reduce(state, Action::DeleteNode { node_id: NodeId(3) });

    assert_eq!(state.node_to_delete, None);
    assert_eq!(state.link_to_edit, None);
  }

  #[test]
  fn test_splice_into_existing_link() {
    let state = reduce(
      chain(),
      Action::AddNode {
        parent: NodeId(2),
        target: Some(NodeId(3)),
        link_type: LinkType::Success,
        template: template(7000, "Foo JT"),
      },
    );

    assert!(state.graph.find_link(NodeId(2), NodeId(3)).is_none());
    assert_eq!(
      state.graph.find_link(NodeId(2), NodeId(5)).map(|l| l.link_type),
      Some(LinkType::Success)
    );
    assert_eq!(
      state.graph.find_link(NodeId(5), NodeId(3)).map(|l| l.link_type),
      Some(LinkType::Always)
    );
  }

  #[test]
  fn test_splice_without_link_is_noop() {
    let before = chain();
    let after = reduce(
      before.clone(),
      Action::AddNode {
        parent: NodeId(2),
        target: Some(NodeId(4)),
        link_type: LinkType::Success,
        template: template(1, "X"),
      },
    );
    assert_eq!(after, before);
  }

  #[test]
  fn test_update_link_type() {
    let state = reduce(
      chain(),
      Action::SetLinkToEdit {
        source: NodeId(2),
        target: NodeId(3),
      },
    );
    let state = reduce(
      state,
      Action::UpdateLink {
        link_type: LinkType::Failure,
      },
    );

    assert_eq!(state.link_to_edit, None);
    assert!(state.unsaved_changes);
    assert_eq!(
      state.graph.find_link(NodeId(2), NodeId(3)).map(|l| l.link_type),
      Some(LinkType::Failure)
    );
  }

  #[test]
  fn test_merge_status_does_not_mark_unsaved() {
    let state = reduce(
      chain(),
      Action::MergeStatus(StatusPatch {
        unified_job_id: Some(102),
        status: Some("running".to_string()),
        ..Default::default()
      }),
    );

    assert!(!state.unsaved_changes);
    let job = state.graph.nodes[&NodeId(3)].job.as_ref().unwrap();
    assert_eq!(job.status.as_deref(), Some("running"));
    assert!(state.graph.nodes[&NodeId(2)].job.is_none());
  }

  #[test]
  fn test_failed_load_keeps_state_and_records_error() {
    let before = chain();
    let after = reduce(
      before.clone(),
      Action::Load {
        nodes: vec![ApiWorkflowNode {
          id: 1,
          success_nodes: vec![99],
          ..Default::default()
        }],
      },
    );

    assert_eq!(after.graph, before.graph);
    assert!(after.content_error.is_some());
  }

  #[test]
  fn test_action_wire_format() {
    let action: Action = serde_json::from_value(serde_json::json!({
      "type": "DELETE_NODE",
      "node_id": 3
    }))
    .unwrap();
    assert_eq!(action, Action::DeleteNode { node_id: NodeId(3) });
  }
}
