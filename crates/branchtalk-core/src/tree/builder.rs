//! Tree builder from a flat message snapshot.

use super::TreeNode;
use crate::message::{Message, MessageId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Structural anomalies found while building a tree.
///
/// Building never fails; anything that cannot be placed under the chosen
/// root is left out and counted here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Nodes in the resulting tree
    pub node_count: usize,

    /// Parentless messages after the first, in input order. Not in the tree.
    /// Duplicates of an ID already seen are counted in `duplicate_ids` instead.
    pub dropped_roots: Vec<MessageId>,

    /// Messages not reachable from the chosen root (dangling parent, or
    /// below a dropped root). Dropped roots and duplicates are not counted.
    pub unreachable: usize,

    /// Input messages whose ID was already seen earlier in the input
    pub duplicate_ids: usize,
}

impl BuildReport {
    /// Check if every input message ended up in the tree exactly once.
    pub fn is_clean(&self) -> bool {
        self.dropped_roots.is_empty() && self.unreachable == 0 && self.duplicate_ids == 0
    }
}

/// Result of [`build_tree_with_report`].
#[derive(Debug)]
pub struct BuiltTree {
    /// Root node, or None when the snapshot has no parentless message
    pub root: Option<TreeNode>,

    /// What was left out and why
    pub report: BuildReport,
}

/// Build a tree from an unordered message snapshot.
///
/// Returns None for an empty snapshot or one without a parentless message.
/// When several messages lack a parent the first in input order is the root.
pub fn build_tree(messages: &[Message]) -> Option<TreeNode> {
    build_tree_with_report(messages).root
}

/// Build a tree and report what could not be placed in it.
pub fn build_tree_with_report(messages: &[Message]) -> BuiltTree {
    let mut seen: HashSet<&str> = HashSet::with_capacity(messages.len());
    let mut is_duplicate = vec![false; messages.len()];
    let mut children: HashMap<Option<&str>, Vec<usize>> = HashMap::new();

    for (index, message) in messages.iter().enumerate() {
        if !seen.insert(message.id.as_str()) {
            is_duplicate[index] = true;
        }
        children
            .entry(message.parent_message_id.as_deref())
            .or_default()
            .push(index);
    }

    let mut report = BuildReport {
        duplicate_ids: is_duplicate.iter().filter(|d| **d).count(),
        ..Default::default()
    };

    let roots = children.get(&None).map(Vec::as_slice).unwrap_or(&[]);
    let Some((&root_index, extra_roots)) = roots.split_first() else {
        report.unreachable = messages.len() - report.duplicate_ids;
        if !messages.is_empty() {
            warn!(messages = messages.len(), "No root message in snapshot");
        }
        return BuiltTree { root: None, report };
    };

    let extra_roots: Vec<usize> = extra_roots
        .iter()
        .copied()
        .filter(|&index| !is_duplicate[index])
        .collect();
    report.dropped_roots = extra_roots
        .iter()
        .map(|&index| messages[index].id.clone())
        .collect();

    let mut materialized: HashSet<&str> = HashSet::with_capacity(messages.len());
    let root = materialize(root_index, messages, &children, &mut materialized);

    report.node_count = materialized.len();
    report.unreachable = messages
        .iter()
        .enumerate()
        .filter(|(index, message)| {
            !is_duplicate[*index]
                && !extra_roots.contains(index)
                && !materialized.contains(message.id.as_str())
        })
        .count();

    if !report.dropped_roots.is_empty() {
        warn!(
            root = %messages[root_index].id,
            dropped = ?report.dropped_roots,
            "Multiple root messages, keeping the first"
        );
    }
    if report.unreachable > 0 {
        warn!(count = report.unreachable, "Messages unreachable from root");
    }
    if report.duplicate_ids > 0 {
        warn!(count = report.duplicate_ids, "Duplicate message IDs skipped");
    }

    debug!(
        nodes = report.node_count,
        input = messages.len(),
        "Tree built"
    );

    BuiltTree { root, report }
}

/// A node under construction: its message, the replies still to visit,
/// and the replies already built.
struct Frame<'a> {
    message: &'a Message,
    pending: std::slice::Iter<'a, usize>,
    children: Vec<TreeNode>,
}

impl<'a> Frame<'a> {
    fn new(message: &'a Message, children: &'a HashMap<Option<&str>, Vec<usize>>) -> Self {
        let pending = children
            .get(&Some(message.id.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter();

        Self {
            message,
            pending,
            children: Vec::new(),
        }
    }

    fn into_node(self) -> TreeNode {
        TreeNode {
            message: self.message.clone(),
            children: self.children,
        }
    }
}

/// Materialize the subtree under `root_index` top-down.
///
/// Each ID is materialized at most once, so duplicated IDs cannot make the
/// expansion revisit an ancestor.
fn materialize<'a>(
    root_index: usize,
    messages: &'a [Message],
    children: &'a HashMap<Option<&str>, Vec<usize>>,
    materialized: &mut HashSet<&'a str>,
) -> Option<TreeNode> {
    let root = &messages[root_index];
    materialized.insert(root.id.as_str());
    let mut stack = vec![Frame::new(root, children)];

    while let Some(top) = stack.last_mut() {
        if let Some(&index) = top.pending.next() {
            let message = &messages[index];
            if materialized.insert(message.id.as_str()) {
                stack.push(Frame::new(message, children));
            }
            continue;
        }

        let node = stack.pop()?.into_node();
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => return Some(node),
        }
    }

    None
}
