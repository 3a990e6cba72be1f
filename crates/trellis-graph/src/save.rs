//! Persistence requests derived from an edited graph.
//!
//! Saving a workflow happens in phases against the REST API: node requests
//! first, approval-template requests once the nodes exist, then link
//! disassociations, then link associations. [`SavePlan`] lists the requests
//! of each phase; issuing them is up to the API client.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::link::LinkType;
use crate::node::{ApprovalFields, Node, NodeId};
use crate::reducer::VisualizerState;

/// A node on either side of a link request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRef {
  /// Already exists on the server.
  Persisted(u64),
  /// Created by a `NodeRequest::Create` earlier in the same save.
  Pending(NodeId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NodeRequest {
  Delete { id: u64 },
  /// Create a node. `unified_job_template` is absent for approval nodes,
  /// whose template is created afterwards.
  Create {
    node_id: NodeId,
    unified_job_template: Option<u64>,
  },
  Update { id: u64, unified_job_template: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ApprovalRequest {
  Create { node: NodeRef, fields: ApprovalFields },
  Update { template_id: u64, fields: ApprovalFields },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
  pub source: NodeRef,
  pub target: NodeRef,
  pub link_type: LinkType,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavePlan {
  pub node_requests: Vec<NodeRequest>,
  pub approval_requests: Vec<ApprovalRequest>,
  pub disassociate: Vec<LinkRequest>,
  pub associate: Vec<LinkRequest>,
}

impl SavePlan {
  pub fn is_empty(&self) -> bool {
    self.node_requests.is_empty()
      && self.approval_requests.is_empty()
      && self.disassociate.is_empty()
      && self.associate.is_empty()
  }

  /// Work out every request needed to persist `state`.
  pub fn from_state(state: &VisualizerState) -> Result<Self, GraphError> {
    let mut plan = Self::default();
    let nodes = &state.graph.nodes;

    for id in &state.deleted_node_ids {
      plan.node_requests.push(NodeRequest::Delete { id: *id });
    }

    for node in nodes.values().filter(|n| !n.is_start_node) {
      plan.plan_node(node);
    }

    // Links as they stand now, keyed by server-side endpoints.
    let mut current: HashMap<(NodeRef, NodeRef), LinkType> = HashMap::new();
    let mut current_order = Vec::new();
    for link in state.graph.links.iter().filter(|l| !l.source.is_start()) {
      let (Some(source), Some(target)) = (nodes.get(&link.source), nodes.get(&link.target)) else {
        return Err(GraphError::UnresolvedLink {
          from: link.source,
          to: link.target,
        });
      };
      let key = (node_ref(source), node_ref(target));
      current.insert(key, link.link_type);
      current_order.push((key, link.link_type));
    }

    // Links as the server has them.
    let deleted: HashSet<u64> = state.deleted_node_ids.iter().copied().collect();
    let mut original: HashSet<(NodeRef, NodeRef, LinkType)> = HashSet::new();
    for node in nodes.values() {
      let Some(persisted) = &node.persisted else {
        continue;
      };
      let typed = [
        (LinkType::Success, &persisted.success_nodes),
        (LinkType::Failure, &persisted.failure_nodes),
        (LinkType::Always, &persisted.always_nodes),
      ];
      for (link_type, targets) in typed {
        for target in targets {
          let source = NodeRef::Persisted(persisted.id);
          original.insert((source, NodeRef::Persisted(*target), link_type));

          // Links to deleted nodes go away with the node.
          if deleted.contains(target) {
            continue;
          }
          let target = NodeRef::Persisted(*target);
          if current.get(&(source, target)) != Some(&link_type) {
            plan.disassociate.push(LinkRequest {
              source,
              target,
              link_type,
            });
          }
        }
      }
    }

    for ((source, target), link_type) in current_order {
      if !original.contains(&(source, target, link_type)) {
        plan.associate.push(LinkRequest {
          source,
          target,
          link_type,
        });
      }
    }

    Ok(plan)
  }

  fn plan_node(&mut self, node: &Node) {
    let template = node.unified_job_template.as_ref();
    let is_approval = template.is_some_and(|t| t.is_approval());
    let fields = || {
      template
        .map(|t| ApprovalFields {
          name: Some(t.name.clone()),
          description: t.description.clone(),
          timeout: t.timeout,
        })
        .unwrap_or_default()
    };

    match &node.persisted {
      None => {
        self.node_requests.push(NodeRequest::Create {
          node_id: node.id,
          unified_job_template: if is_approval {
            None
          } else {
            template.and_then(|t| t.id)
          },
        });
        if is_approval {
          self.approval_requests.push(ApprovalRequest::Create {
            node: NodeRef::Pending(node.id),
            fields: fields(),
          });
        }
      }
      Some(persisted) if node.is_edited => {
        let original_template = persisted.unified_job_template.as_ref();
        let was_approval = original_template.is_some_and(|t| t.is_approval());

        if is_approval {
          match original_template.and_then(|t| t.id) {
            Some(template_id) if was_approval => {
              self
                .approval_requests
                .push(ApprovalRequest::Update { template_id, fields: fields() });
            }
            _ => {
              self.approval_requests.push(ApprovalRequest::Create {
                node: NodeRef::Persisted(persisted.id),
                fields: fields(),
              });
            }
          }
        } else if let Some(template_id) = template.and_then(|t| t.id) {
          self.node_requests.push(NodeRequest::Update {
            id: persisted.id,
            unified_job_template: template_id,
          });
        }
      }
      Some(_) => {}
    }
  }
}

fn node_ref(node: &Node) -> NodeRef {
  match node.server_id() {
    Some(id) => NodeRef::Persisted(id),
    None => NodeRef::Pending(node.id),
  }
}
