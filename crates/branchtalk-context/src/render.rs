//! Tree presentation.
//!
//! Flattened node lists for clients that render the tree themselves, and a
//! box-drawing outline for terminals.

use branchtalk_core::{EngineConfig, MessageId, Role, TreeNode, TreeSession};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One tree node in pre-order, with its position made explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNode {
    pub id: MessageId,
    pub parent_id: Option<MessageId>,
    pub role: Role,
    pub content: String,
    pub depth: u32,
    pub child_count: usize,
    pub is_leaf: bool,
    /// On the root-to-active path
    pub on_active_path: bool,
}

/// Flatten a session's tree in pre-order.
///
/// `active_id` marks the root-to-active path; an unknown ID marks nothing.
pub fn flatten(session: &TreeSession, active_id: Option<&str>) -> Vec<FlatNode> {
    let Some(root) = session.root() else {
        return Vec::new();
    };
    let active = active_path(session, active_id);

    root.iter()
        .map(|node| FlatNode {
            id: node.message.id.clone(),
            parent_id: session.parent_id(node.id()).map(str::to_string),
            role: node.message.role,
            content: node.message.content.clone(),
            depth: node.message.depth,
            child_count: node.children.len(),
            is_leaf: node.is_leaf(),
            on_active_path: active.contains(node.id()),
        })
        .collect()
}

fn active_path<'a>(session: &'a TreeSession, active_id: Option<&str>) -> HashSet<&'a str> {
    active_id
        .map(|id| session.path_to_node(id).into_iter().map(|n| n.id()).collect())
        .unwrap_or_default()
}

/// Renderer for tree outlines.
pub struct TreeRenderer {
    /// Maximum content characters per line
    preview_width: usize,
}

impl TreeRenderer {
    /// Create a new renderer with default settings.
    pub fn new() -> Self {
        Self { preview_width: 48 }
    }

    /// Create a renderer with a custom preview width.
    pub fn with_preview_width(preview_width: usize) -> Self {
        Self { preview_width }
    }

    /// Create a renderer from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_preview_width(config.preview_width)
    }

    /// Render the session's tree as an outline.
    ///
    /// Nodes on the active path are starred and the active node itself is
    /// flagged.
    pub fn render(&self, session: &TreeSession, active_id: Option<&str>) -> String {
        let Some(root) = session.root() else {
            return String::new();
        };
        let active = active_path(session, active_id);
        let mut output = String::new();

        // (node, prefix for its children, is_last among siblings, is_root)
        let mut stack: Vec<(&TreeNode, String, bool, bool)> =
            vec![(root, String::new(), true, true)];

        while let Some((node, prefix, is_last, is_root)) = stack.pop() {
            let marker = if active.contains(node.id()) { "*" } else { "" };
            let focus = if active_id == Some(node.id()) {
                " ← (active)"
            } else {
                ""
            };
            let line = format!(
                "{}{}: {}{}",
                marker,
                node.message.role,
                self.preview(&node.message.content),
                focus
            );

            let child_prefix = if is_root {
                output.push_str(&line);
                output.push('\n');
                String::new()
            } else {
                let connector = if is_last { "└── " } else { "├── " };
                output.push_str(&format!("{}{}{}\n", prefix, connector, line));
                format!("{}{}   ", prefix, if is_last { " " } else { "│" })
            };

            let child_count = node.children.len();
            for (i, child) in node.children.iter().enumerate().rev() {
                stack.push((child, child_prefix.clone(), i == child_count - 1, false));
            }
        }

        output
    }

    /// Single-line content preview, truncated to the preview width.
    fn preview(&self, content: &str) -> String {
        let flat: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= self.preview_width {
            return flat;
        }
        let mut truncated: String = flat
            .chars()
            .take(self.preview_width.saturating_sub(1))
            .collect();
        truncated.push('…');
        truncated
    }
}

impl Default for TreeRenderer {
    fn default() -> Self {
        Self::new()
    }
}
