//! Error types for message storage and conversation management.

use branchtalk_core::{ConversationId, MessageId};
use thiserror::Error;

/// Errors reported by a [`crate::MessageStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// No message with this ID
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// A message with this ID already exists
    #[error("Message already exists: {0}")]
    Duplicate(MessageId),

    /// No conversation with this ID
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// A conversation with this ID already exists
    #[error("Conversation already exists: {0}")]
    ConversationExists(ConversationId),

    /// Backend could not be reached or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during conversation operations.
#[derive(Error, Debug)]
pub enum ConversationError {
    /// Conversation has no messages
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Message not found
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// Parent is missing or belongs to another conversation
    #[error("Invalid parent message {parent_id} for conversation {conversation_id}")]
    InvalidParent {
        parent_id: MessageId,
        conversation_id: ConversationId,
    },

    /// Required field was empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ConversationError>;
