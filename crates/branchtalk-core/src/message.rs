//! Message data model.
//!
//! Messages are parent-linked records; a conversation is the set of messages
//! sharing a `conversation_id`, rooted at the single message without a parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a message.
pub type MessageId = String;

/// Unique identifier for a conversation.
pub type ConversationId = String;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lower-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A single message in a branching conversation.
///
/// Everything except `content` is fixed at creation; `content` is patched
/// while a reply streams in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,

    /// Owning conversation
    pub conversation_id: ConversationId,

    /// Parent message (None only for the conversation root)
    #[serde(default)]
    pub parent_message_id: Option<MessageId>,

    /// Author role
    pub role: Role,

    /// Text payload
    pub content: String,

    /// Distance from the root (root is 0)
    #[serde(default)]
    pub depth: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a root system message for a conversation.
    pub fn root(conversation_id: impl Into<ConversationId>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            parent_message_id: None,
            role: Role::System,
            content: content.into(),
            depth: 0,
            created_at: Utc::now(),
        }
    }

    /// Create a reply to `parent` in the same conversation.
    pub fn reply(parent: &Message, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: parent.conversation_id.clone(),
            parent_message_id: Some(parent.id.clone()),
            role,
            content: content.into(),
            depth: parent.depth + 1,
            created_at: Utc::now(),
        }
    }

    /// Override the generated ID.
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    /// Check if this message has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_message_id.is_none()
    }

    /// Replace the message content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }
}

/// Conversation record: the container a message tree hangs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,

    /// Display title, unset until renamed
    #[serde(default)]
    pub title: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an untitled conversation stamped now.
    pub fn new(id: impl Into<ConversationId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            created_at: Utc::now(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Conversation listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

impl ConversationSummary {
    pub fn new(conversation: &Conversation, message_count: usize) -> Self {
        Self {
            id: conversation.id.clone(),
            title: conversation.title.clone(),
            created_at: conversation.created_at,
            message_count,
        }
    }
}

/// A `{role, content}` pair as submitted to a language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_inherits_conversation_and_depth() {
        let root = Message::root("conv1", "You are helpful.");
        let user = Message::reply(&root, Role::User, "Hello!");
        let assistant = Message::reply(&user, Role::Assistant, "Hi there!");

        assert!(root.is_root());
        assert_eq!(user.conversation_id, "conv1");
        assert_eq!(user.parent_message_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(assistant.depth, 2);
        assert_ne!(user.id, assistant.id);
    }

    #[test]
    fn test_message_serialization_uses_camel_case() {
        let root = Message::root("conv1", "sys").with_id("root");
        let json = serde_json::to_value(&root).unwrap();

        assert_eq!(json["conversationId"], "conv1");
        assert!(json["parentMessageId"].is_null());
        assert_eq!(json["role"], "system");
        assert!(json.get("createdAt").is_some());

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn test_conversation_summary_serialization() {
        let conversation = Conversation::new("conv1").with_title("Trip ideas");
        let json = serde_json::to_value(ConversationSummary::new(&conversation, 3)).unwrap();

        assert_eq!(json["id"], "conv1");
        assert_eq!(json["title"], "Trip ideas");
        assert_eq!(json["messageCount"], 3);
        assert!(json.get("createdAt").is_some());

        let untitled: Conversation =
            serde_json::from_str(r#"{"id":"c2","createdAt":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(untitled.title, None);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("User".parse::<Role>(), Ok(Role::User));
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_set_content() {
        let root = Message::root("conv1", "");
        let mut reply = Message::reply(&root, Role::Assistant, "Hel");
        reply.set_content("Hello");
        assert_eq!(reply.content, "Hello");
        assert_eq!(ChatTurn::from(&reply).content, "Hello");
    }
}
