//! Tree session: one built tree paired with its path cache.
//!
//! The cache is only ever valid for the tree it sits next to. Replacing the
//! tree goes through [`TreeSession::rebuild`], which clears the cache in the
//! same `&mut self` step, so no reader can see stale routes against a new tree.

use super::{
    build_tree_with_report, descendants, find_node_by_id, follow_route, leaf_nodes, route_to,
    BuildReport, TreeNode,
};
use crate::message::{Message, MessageId};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Path cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Memoized root-to-node routes, stored as child indices.
///
/// Absent targets are cached as `None`; the tree is immutable so a miss
/// stays a miss until the next rebuild.
#[derive(Debug, Default)]
struct PathCache {
    routes: HashMap<MessageId, Option<Vec<usize>>>,
    hits: u64,
    misses: u64,
}

impl PathCache {
    fn clear(&mut self) {
        self.routes.clear();
        self.hits = 0;
        self.misses = 0;
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.routes.len(),
        }
    }
}

/// A built conversation tree with memoized navigation.
#[derive(Debug, Default)]
pub struct TreeSession {
    root: Option<TreeNode>,
    /// Child ID -> parent ID, for nodes in the tree
    parents: HashMap<MessageId, MessageId>,
    report: BuildReport,
    cache: Mutex<PathCache>,
}

impl TreeSession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session from a message snapshot.
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut session = Self::new();
        session.rebuild(messages);
        session
    }

    /// Replace the tree with one built from `messages` and drop all cached
    /// paths.
    pub fn rebuild(&mut self, messages: &[Message]) {
        let built = build_tree_with_report(messages);

        let mut parents = HashMap::with_capacity(built.report.node_count);
        if let Some(root) = &built.root {
            for node in root.iter() {
                for child in &node.children {
                    parents.insert(child.message.id.clone(), node.message.id.clone());
                }
            }
        }

        self.root = built.root;
        self.parents = parents;
        self.report = built.report;
        self.cache.get_mut().clear();

        debug!(nodes = self.report.node_count, "Tree session rebuilt");
    }

    /// Root node, or None for an empty session.
    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Anomalies found by the last rebuild.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.report.node_count
    }

    /// Check if the session holds no tree.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Check if a message is in the tree.
    pub fn contains(&self, id: &str) -> bool {
        self.root.as_ref().is_some_and(|root| root.id() == id) || self.parents.contains_key(id)
    }

    /// Find a node by message ID.
    pub fn find_node(&self, id: &str) -> Option<&TreeNode> {
        find_node_by_id(self.root.as_ref()?, id)
    }

    /// Path from the root to `id`, inclusive, memoized per session.
    ///
    /// Empty when `id` is not in the tree. Repeated calls return the same
    /// nodes in the same order.
    pub fn path_to_node(&self, id: &str) -> Vec<&TreeNode> {
        let Some(root) = self.root.as_ref() else {
            return Vec::new();
        };

        let mut cache = self.cache.lock();
        if let Some(route) = cache.routes.get(id) {
            let path = route
                .as_deref()
                .map(|route| follow_route(root, route))
                .unwrap_or_default();
            cache.hits += 1;
            return path;
        }

        let route = route_to(root, id);
        let path = route
            .as_deref()
            .map(|route| follow_route(root, route))
            .unwrap_or_default();
        cache.misses += 1;
        cache.routes.insert(id.to_string(), route);
        path
    }

    /// All leaf nodes (branch heads), left to right.
    pub fn leaf_nodes(&self) -> Vec<&TreeNode> {
        self.root.as_ref().map(leaf_nodes).unwrap_or_default()
    }

    /// All nodes strictly below `id`. Empty when `id` is not in the tree.
    ///
    /// Does not touch the path cache.
    pub fn descendants(&self, id: &str) -> Vec<&TreeNode> {
        self.find_node(id).map(descendants).unwrap_or_default()
    }

    /// Parent ID of a node in the tree. None for the root and unknown IDs.
    pub fn parent_id(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// The other replies to this node's parent, in stored order. Does not
    /// touch the path cache.
    pub fn siblings(&self, id: &str) -> Vec<&TreeNode> {
        let Some(parent_id) = self.parent_id(id) else {
            return Vec::new();
        };

        self.find_node(parent_id)
            .map(|parent| parent.children.iter().filter(|c| c.id() != id).collect())
            .unwrap_or_default()
    }

    /// Drop all cached paths for this tree.
    pub fn clear_path_cache(&self) {
        self.cache.lock().clear();
    }

    /// Path cache counters since the last clear.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn ids(nodes: &[&TreeNode]) -> Vec<String> {
        nodes.iter().map(|n| n.message.id.clone()).collect()
    }

    fn conversation() -> Vec<Message> {
        let root = Message::root("conv1", "sys").with_id("root");
        let m1 = Message::reply(&root, Role::User, "hi").with_id("m1");
        let m2 = Message::reply(&m1, Role::Assistant, "a").with_id("m2");
        let m3 = Message::reply(&m1, Role::Assistant, "b").with_id("m3");
        vec![root, m1, m2, m3]
    }

    #[test]
    fn test_empty_session() {
        let session = TreeSession::new();
        assert!(session.is_empty());
        assert!(session.path_to_node("root").is_empty());
        assert!(session.leaf_nodes().is_empty());
        assert!(session.find_node("root").is_none());
    }

    #[test]
    fn test_path_is_cached() {
        let session = TreeSession::from_messages(&conversation());

        let first = session.path_to_node("m3");
        let second = session.path_to_node("m3");

        assert_eq!(ids(&first), vec!["root", "m1", "m3"]);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert!(std::ptr::eq(*a, *b));
        }

        let stats = session.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_misses_are_cached() {
        let session = TreeSession::from_messages(&conversation());

        assert!(session.path_to_node("ghost").is_empty());
        assert!(session.path_to_node("ghost").is_empty());
        assert_eq!(session.cache_stats().hits, 1);
    }

    #[test]
    fn test_clear_path_cache_recomputes_equal_path() {
        let session = TreeSession::from_messages(&conversation());
        let before = ids(&session.path_to_node("m2"));

        session.clear_path_cache();
        assert_eq!(session.cache_stats(), CacheStats::default());

        let after = ids(&session.path_to_node("m2"));
        assert_eq!(before, after);
        assert_eq!(session.cache_stats().misses, 1);
    }

    #[test]
    fn test_rebuild_invalidates_cache() {
        let mut messages = conversation();
        let mut session = TreeSession::from_messages(&messages);
        assert_eq!(ids(&session.path_to_node("m4")), Vec::<String>::new());

        let m2 = messages[2].clone();
        messages.push(Message::reply(&m2, Role::User, "more").with_id("m4"));
        session.rebuild(&messages);

        assert_eq!(session.cache_stats().entries, 0);
        assert_eq!(ids(&session.path_to_node("m4")), vec!["root", "m1", "m2", "m4"]);
    }

    #[test]
    fn test_siblings_and_parents() {
        let session = TreeSession::from_messages(&conversation());

        assert_eq!(ids(&session.siblings("m2")), vec!["m3"]);
        assert_eq!(ids(&session.siblings("m3")), vec!["m2"]);
        assert!(session.siblings("m1").is_empty());
        assert!(session.siblings("root").is_empty());
        assert!(session.siblings("ghost").is_empty());

        assert_eq!(session.parent_id("m3"), Some("m1"));
        assert_eq!(session.parent_id("root"), None);
        assert!(session.contains("root"));
        assert!(!session.contains("ghost"));
    }

    #[test]
    fn test_descendants_by_id() {
        let session = TreeSession::from_messages(&conversation());
        assert_eq!(ids(&session.descendants("m1")), vec!["m2", "m3"]);
        assert!(session.descendants("m3").is_empty());
        assert!(session.descendants("ghost").is_empty());
    }

    #[test]
    fn test_sibling_and_descendant_queries_leave_cache_alone() {
        let session = TreeSession::from_messages(&conversation());

        session.siblings("m2");
        session.descendants("m1");
        session.descendants("ghost");

        assert_eq!(session.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_session_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TreeSession>();
    }
}
