//! Trellis Graph
//!
//! The workflow graph model behind the trellis visualizer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     VisualizerState                         │
//! │  - graph: nodes keyed by NodeId, typed links                │
//! │  - staged deletes/edits, link mode, unsaved flag            │
//! │  - reduce(state, action) → next state                       │
//! └─────────────────────────────────────────────────────────────┘
//!               │                                │
//!               ▼                                ▼
//! ┌────────────────────────────┐   ┌────────────────────────────┐
//! │          Layout            │   │         SavePlan           │
//! │  - longest-path columns    │   │  - node/approval requests  │
//! │  - node boxes, link paths  │   │  - link (dis)associations  │
//! └────────────────────────────┘   └────────────────────────────┘
//! ```
//!
//! The start node (id 1) is a synthetic root: it is never persisted, never
//! deleted and every node with no other parent hangs off it.

mod api;
mod error;
mod graph;
mod layout;
mod link;
mod node;
mod reducer;
mod save;
mod workflow;

pub use api::{ApiNodeList, ApiWorkflowNode, SummaryFields, UserCapabilities};
pub use error::GraphError;
pub use graph::Topology;
pub use layout::{Layout, LinkPath, NodeBox, Point, compute_positions};
pub use link::{Link, LinkType};
pub use node::{
  ApprovalFields, JobSummary, Node, NodeId, NodePatch, PersistedNode, Position, StatusPatch,
  TemplateKind, UnifiedJobTemplate,
};
pub use reducer::{Action, VisualizerState, reduce};
pub use save::{ApprovalRequest, LinkRequest, NodeRef, NodeRequest, SavePlan};
pub use workflow::WorkflowGraph;
