//! Workflow node records as returned by the controller's REST API.
//!
//! Only the fields the visualizer reads are modelled; everything else in
//! the payload is ignored.

use serde::{Deserialize, Serialize};

use crate::node::{JobSummary, PersistedNode, UnifiedJobTemplate};

/// One workflow job template node (or workflow job node) from the API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiWorkflowNode {
  pub id: u64,
  #[serde(default)]
  pub success_nodes: Vec<u64>,
  #[serde(default)]
  pub failure_nodes: Vec<u64>,
  #[serde(default)]
  pub always_nodes: Vec<u64>,
  #[serde(default)]
  pub summary_fields: SummaryFields,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryFields {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unified_job_template: Option<UnifiedJobTemplate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub job: Option<JobSummary>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_capabilities: Option<UserCapabilities>,
}

/// Capability flags mirrored from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserCapabilities {
  #[serde(default)]
  pub edit: bool,
  #[serde(default)]
  pub delete: bool,
}

/// A page of results, as returned by list endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiNodeList {
  Page { results: Vec<ApiWorkflowNode> },
  Bare(Vec<ApiWorkflowNode>),
}

impl ApiNodeList {
  pub fn into_nodes(self) -> Vec<ApiWorkflowNode> {
    match self {
      Self::Page { results } => results,
      Self::Bare(nodes) => nodes,
    }
  }
}

impl ApiWorkflowNode {
  pub(crate) fn persisted(&self) -> PersistedNode {
    PersistedNode {
      id: self.id,
      success_nodes: self.success_nodes.clone(),
      failure_nodes: self.failure_nodes.clone(),
      always_nodes: self.always_nodes.clone(),
      unified_job_template: self.summary_fields.unified_job_template.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_page_and_bare_list() {
    let page: ApiNodeList = serde_json::from_value(json!({
      "count": 1,
      "results": [{ "id": 10, "success_nodes": [11] }]
    }))
    .unwrap();
    let bare: ApiNodeList = serde_json::from_value(json!([{ "id": 10 }])).unwrap();

    assert_eq!(page.into_nodes()[0].success_nodes, vec![11]);
    assert_eq!(bare.into_nodes()[0].id, 10);
  }

  #[test]
  fn test_parse_summary_fields() {
    let node: ApiWorkflowNode = serde_json::from_value(json!({
      "id": 5,
      "summary_fields": {
        "unified_job_template": { "id": 42, "name": "Deploy", "type": "job_template" },
        "job": { "id": 900, "status": "running" },
        "user_capabilities": { "edit": true, "delete": false }
      },
      "related": { "ignored": "/api/v2/..." }
    }))
    .unwrap();

    let template = node.summary_fields.unified_job_template.unwrap();
    assert_eq!(template.id, Some(42));
    assert_eq!(template.name, "Deploy");
    assert_eq!(node.summary_fields.job.unwrap().status.as_deref(), Some("running"));
    assert!(!node.summary_fields.user_capabilities.unwrap().delete);
  }
}
