use std::fmt;

use serde::{Deserialize, Serialize};

/// Visualizer-side node identifier.
///
/// Ids are minted per session from [`crate::WorkflowGraph::next_index`] and
/// never reused, whether or not the node exists on the server yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
  /// The artificial start node every workflow is rooted at.
  pub const START: NodeId = NodeId(1);

  pub fn is_start(self) -> bool {
    self == Self::START
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The kind of resource a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
  #[default]
  JobTemplate,
  WorkflowJobTemplate,
  Project,
  InventorySource,
  SystemJobTemplate,
  WorkflowApprovalTemplate,
  #[serde(other)]
  Other,
}

/// Reference to the template a node runs, with the summary fields the
/// visualizer caches for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnifiedJobTemplate {
  /// Server id. Absent for approval templates not yet created.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<u64>,
  #[serde(default)]
  pub name: String,
  #[serde(default, rename = "type")]
  pub kind: TemplateKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Approval timeout in seconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout: Option<u64>,
  /// Set on templates that were already turned into approval jobs.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unified_job_type: Option<String>,
}

impl UnifiedJobTemplate {
  pub fn new(id: u64, name: impl Into<String>, kind: TemplateKind) -> Self {
    Self {
      id: Some(id),
      name: name.into(),
      kind,
      ..Default::default()
    }
  }

  pub fn is_approval(&self) -> bool {
    self.kind == TemplateKind::WorkflowApprovalTemplate
      || self.unified_job_type.as_deref() == Some("workflow_approval")
  }
}

/// Live status of the job a node spawned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobSummary {
  pub id: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub finished: Option<String>,
}

/// The server record a node was loaded from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistedNode {
  pub id: u64,
  #[serde(default)]
  pub success_nodes: Vec<u64>,
  #[serde(default)]
  pub failure_nodes: Vec<u64>,
  #[serde(default)]
  pub always_nodes: Vec<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unified_job_template: Option<UnifiedJobTemplate>,
}

/// Position hint for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

/// One step in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: NodeId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unified_job_template: Option<UnifiedJobTemplate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub job: Option<JobSummary>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub persisted: Option<PersistedNode>,
  pub can_edit: bool,
  pub can_delete: bool,
  pub is_start_node: bool,
  #[serde(default)]
  pub is_edited: bool,
  #[serde(default)]
  pub is_invalid_link_target: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub position: Option<Position>,
}

impl Node {
  /// The start node. It runs nothing and can be neither edited nor deleted.
  pub fn start() -> Self {
    Self {
      id: NodeId::START,
      unified_job_template: Some(UnifiedJobTemplate {
        name: "START".to_string(),
        ..Default::default()
      }),
      job: None,
      persisted: None,
      can_edit: false,
      can_delete: false,
      is_start_node: true,
      is_edited: false,
      is_invalid_link_target: false,
      position: None,
    }
  }

  /// A node created on the canvas that has no server record yet.
  pub fn new(id: NodeId, template: UnifiedJobTemplate) -> Self {
    Self {
      id,
      unified_job_template: Some(template),
      job: None,
      persisted: None,
      can_edit: true,
      can_delete: true,
      is_start_node: false,
      is_edited: false,
      is_invalid_link_target: false,
      position: None,
    }
  }

  /// Server id, if this node has been saved.
  pub fn server_id(&self) -> Option<u64> {
    self.persisted.as_ref().map(|p| p.id)
  }

  /// Display name of the linked template.
  pub fn name(&self) -> &str {
    self
      .unified_job_template
      .as_ref()
      .map(|t| t.name.as_str())
      .unwrap_or("")
  }

  /// Shallow-merge a patch into this node. Returns true if anything changed.
  pub fn apply(&mut self, patch: &NodePatch) -> bool {
    let mut changed = false;

    if let Some(template) = &patch.unified_job_template {
      if self.unified_job_template.as_ref() != Some(template) {
        self.unified_job_template = Some(template.clone());
        self.is_edited = true;
        changed = true;
      }
    }

    if let Some(approval) = &patch.approval {
      let template = self.unified_job_template.get_or_insert_with(|| UnifiedJobTemplate {
        kind: TemplateKind::WorkflowApprovalTemplate,
        ..Default::default()
      });
      if let Some(name) = &approval.name {
        template.name = name.clone();
      }
      if approval.description.is_some() {
        template.description = approval.description.clone();
      }
      if approval.timeout.is_some() {
        template.timeout = approval.timeout;
      }
      self.is_edited = true;
      changed = true;
    }

    if let Some(position) = patch.position {
      self.position = Some(position);
      changed = true;
    }

    changed
  }

  /// Whether a live status message concerns this node.
  ///
  /// A node matches on the id of the job it spawned; before a job exists it
  /// matches on its template id, and inventory syncs also match on the
  /// inventory source id.
  ///
  /// The template fallback compares a unified job id against a template id.
  /// The two are separate id spaces, so a node with no job yet whose
  /// template id happens to equal an unrelated job's id takes that job's
  /// status, and `apply_status` then records it as the node's job.
  pub fn matches_status(&self, patch: &StatusPatch) -> bool {
    if let Some(job_id) = patch.unified_job_id {
      if self.job.as_ref().is_some_and(|job| job.id == job_id) {
        return true;
      }
      if self.job.is_none() && self.template_id() == Some(job_id) {
        return true;
      }
    }

    match (patch.inventory_source_id, &self.unified_job_template) {
      (Some(source_id), Some(template)) => {
        template.kind == TemplateKind::InventorySource && template.id == Some(source_id)
      }
      _ => false,
    }
  }

  /// Replace only the status/finished sub-fields from a live message.
  pub fn apply_status(&mut self, patch: &StatusPatch) {
    let fallback_id = patch.unified_job_id.or(patch.inventory_source_id).unwrap_or_default();
    let job = self.job.get_or_insert_with(|| JobSummary {
      id: fallback_id,
      ..Default::default()
    });
    if patch.status.is_some() {
      job.status = patch.status.clone();
    }
    if patch.finished.is_some() {
      job.finished = patch.finished.clone();
    }
  }

  fn template_id(&self) -> Option<u64> {
    self.unified_job_template.as_ref().and_then(|t| t.id)
  }
}

/// Fields of an approval node that can be edited inline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApprovalFields {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout: Option<u64>,
}

/// A local edit to a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodePatch {
  /// Swap the linked template.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unified_job_template: Option<UnifiedJobTemplate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub approval: Option<ApprovalFields>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub position: Option<Position>,
}

/// A status change received from the live feed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unified_job_id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inventory_source_id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub finished: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn job_node(template_id: u64) -> Node {
    Node::new(
      NodeId(2),
      UnifiedJobTemplate::new(template_id, "Job A", TemplateKind::JobTemplate),
    )
  }

  #[test]
  fn test_status_matches_template_before_job_exists() {
    let node = job_node(42);
    let patch = StatusPatch {
      unified_job_id: Some(42),
      ..Default::default()
    };
    assert!(node.matches_status(&patch));
  }

  #[test]
  fn test_status_matches_job_id_once_spawned() {
    let mut node = job_node(42);
    node.job = Some(JobSummary {
      id: 900,
      status: Some("pending".to_string()),
      finished: None,
    });

    let by_job = StatusPatch {
      unified_job_id: Some(900),
      ..Default::default()
    };
    let by_template = StatusPatch {
      unified_job_id: Some(42),
      ..Default::default()
    };
    assert!(node.matches_status(&by_job));
    assert!(!node.matches_status(&by_template));
  }

  #[test]
  fn test_inventory_source_match() {
    let node = Node::new(
      NodeId(3),
      UnifiedJobTemplate::new(7, "Cloud sync", TemplateKind::InventorySource),
    );
    let patch = StatusPatch {
      inventory_source_id: Some(7),
      status: Some("running".to_string()),
      ..Default::default()
    };
    assert!(node.matches_status(&patch));
    assert!(!job_node(7).matches_status(&patch));
  }

  #[test]
  fn test_apply_status_keeps_other_fields() {
    let mut node = job_node(42);
    node.apply(&NodePatch {
      unified_job_template: Some(UnifiedJobTemplate::new(
        42,
        "Renamed locally",
        TemplateKind::JobTemplate,
      )),
      ..Default::default()
    });

    node.apply_status(&StatusPatch {
      unified_job_id: Some(42),
      status: Some("successful".to_string()),
      finished: Some("2024-01-01T00:00:00Z".to_string()),
      ..Default::default()
    });

    assert_eq!(node.name(), "Renamed locally");
    assert!(node.is_edited);
    let job = node.job.unwrap();
    assert_eq!(job.status.as_deref(), Some("successful"));
    assert_eq!(job.finished.as_deref(), Some("2024-01-01T00:00:00Z"));
  }

  #[test]
  fn test_approval_patch_creates_template() {
    let mut node = Node::new(NodeId(4), UnifiedJobTemplate::default());
    node.unified_job_template = None;
    node.apply(&NodePatch {
      approval: Some(ApprovalFields {
        name: Some("Sign off".to_string()),
        description: None,
        timeout: Some(3600),
      }),
      ..Default::default()
    });

    let template = node.unified_job_template.unwrap();
    assert!(template.is_approval());
    assert_eq!(template.name, "Sign off");
    assert_eq!(template.timeout, Some(3600));
  }

  #[test]
  fn test_same_template_is_not_an_edit() {
    let mut node = job_node(42);
    let patch = NodePatch {
      unified_job_template: node.unified_job_template.clone(),
      ..Default::default()
    };
    assert!(!node.apply(&patch));
    assert!(!node.is_edited);
  }
}
