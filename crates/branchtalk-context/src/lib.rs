//! Branchtalk Context Management
//!
//! Message store contract, root-to-message context assembly for model
//! requests, and conversation management on top of the core tree engine.

mod assembler;
mod error;
mod manager;
mod render;
mod store;

pub use assembler::{build_context, model_turns};
pub use error::{ConversationError, Result, StoreError};
pub use manager::{ConversationManager, NewConversation};
pub use render::{flatten, FlatNode, TreeRenderer};
pub use store::{MemoryMessageStore, MessageStore};
