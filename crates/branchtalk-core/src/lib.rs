//! Branchtalk Core
//!
//! Conversation-tree engine: turns a flat, parent-linked message snapshot
//! into a rooted tree, navigates it, and memoizes root-to-node paths.

mod config;
mod error;
pub mod message;
pub mod tree;

pub use config::EngineConfig;
pub use error::ConfigError;
pub use message::{
    ChatTurn, Conversation, ConversationId, ConversationSummary, Message, MessageId, Role,
};
pub use tree::{
    branch_points, build_tree, build_tree_with_report, descendants, find_node_by_id, leaf_nodes,
    path_to_node, BuildReport, BuiltTree, CacheStats, PreOrder, TreeNode, TreeSession,
};
