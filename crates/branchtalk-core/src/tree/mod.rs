//! Conversation tree.
//!
//! Reconstructs a rooted tree from a flat, parent-linked message snapshot and
//! answers navigation queries against it. All traversals are pre-order with
//! an explicit stack, so depth is bounded by heap rather than call stack.

mod builder;
mod session;

pub use builder::{build_tree, build_tree_with_report, BuildReport, BuiltTree};
pub use session::{CacheStats, TreeSession};

use crate::message::Message;
use std::fmt;

/// A node in the conversation tree.
///
/// Each node exclusively owns its children; there is no parent pointer.
/// Parent lookups go through [`TreeSession::parent_id`].
///
/// Not `Clone` or `PartialEq`: a derived impl would recurse once per level.
/// `Debug` prints the message and the number of direct replies only.
pub struct TreeNode {
    /// The wrapped message
    pub message: Message,

    /// Replies, in snapshot order
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a childless node.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            children: Vec::new(),
        }
    }

    /// ID of the wrapped message.
    pub fn id(&self) -> &str {
        &self.message.id
    }

    /// Check if this node has no replies.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if this node has more than one reply.
    pub fn is_branch_point(&self) -> bool {
        self.children.len() > 1
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Pre-order iterator over this subtree, starting with `self`.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("message", &self.message)
            .field("children", &self.children.len())
            .finish()
    }
}

impl Drop for TreeNode {
    // Flatten before dropping so long linear chains don't recurse per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Depth-first pre-order traversal of a subtree.
pub struct PreOrder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Find a node by message ID. Returns the first pre-order match.
pub fn find_node_by_id<'a>(tree: &'a TreeNode, id: &str) -> Option<&'a TreeNode> {
    tree.iter().find(|node| node.id() == id)
}

/// Path from the root to the node with `id`, inclusive.
///
/// Empty only when `id` is absent; the root's own path is `[root]`.
/// This is the uncached form; [`TreeSession::path_to_node`] memoizes it.
pub fn path_to_node<'a>(tree: &'a TreeNode, id: &str) -> Vec<&'a TreeNode> {
    route_to(tree, id)
        .map(|route| follow_route(tree, &route))
        .unwrap_or_default()
}

/// All nodes without replies, in left-to-right branch order.
pub fn leaf_nodes(tree: &TreeNode) -> Vec<&TreeNode> {
    tree.iter().filter(|node| node.is_leaf()).collect()
}

/// All nodes strictly below `node`, pre-order.
pub fn descendants(node: &TreeNode) -> Vec<&TreeNode> {
    node.iter().skip(1).collect()
}

/// All nodes with more than one reply, pre-order.
pub fn branch_points(tree: &TreeNode) -> Vec<&TreeNode> {
    tree.iter().filter(|node| node.is_branch_point()).collect()
}

/// Child indices leading from `tree` to the node with `target`.
///
/// `Some(vec![])` means the root itself matched.
pub(crate) fn route_to(tree: &TreeNode, target: &str) -> Option<Vec<usize>> {
    if tree.id() == target {
        return Some(Vec::new());
    }

    // (node, next child to visit); route mirrors the stack below the root
    let mut stack: Vec<(&TreeNode, usize)> = vec![(tree, 0)];
    let mut route = Vec::new();

    while let Some(top) = stack.last_mut() {
        let node = top.0;
        let index = top.1;
        top.1 += 1;

        match node.children.get(index) {
            Some(child) => {
                route.push(index);
                if child.id() == target {
                    return Some(route);
                }
                stack.push((child, 0));
            }
            None => {
                stack.pop();
                route.pop();
            }
        }
    }

    None
}

/// Materialize a route into the nodes it passes through, root first.
pub(crate) fn follow_route<'a>(tree: &'a TreeNode, route: &[usize]) -> Vec<&'a TreeNode> {
    let mut path = Vec::with_capacity(route.len() + 1);
    let mut current = tree;
    path.push(current);

    for &index in route {
        match current.children.get(index) {
            Some(child) => {
                current = child;
                path.push(child);
            }
            None => return Vec::new(),
        }
    }

    path
}
