use serde::{Deserialize, Serialize};

/// Node sizes and spacing for the left-to-right graph layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
  pub node_width: f64,
  pub node_height: f64,
  /// The start node is drawn smaller than regular nodes.
  pub start_width: f64,
  pub start_height: f64,
  /// Vertical gap between nodes in the same column.
  pub node_sep: f64,
  /// Horizontal gap between columns.
  pub rank_sep: f64,
}

impl Default for LayoutConfig {
  fn default() -> Self {
    Self {
      node_width: 180.0,
      node_height: 60.0,
      start_width: 72.0,
      start_height: 40.0,
      node_sep: 30.0,
      rank_sep: 120.0,
    }
  }
}
