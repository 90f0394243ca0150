//! Message store contract and an in-memory implementation.
//!
//! The engine only needs point lookups, whole-conversation fetches, inserts
//! and content patches, plus the conversation records messages hang under.
//! Retry and timeout policy belong to the store.

use crate::error::StoreError;
use async_trait::async_trait;
use branchtalk_core::{Conversation, ConversationId, ConversationSummary, Message, MessageId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Durable, parent-linked message storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch one message. `Ok(None)` when it does not exist.
    async fn fetch_message(&self, id: &str) -> Result<Option<Message>, StoreError>;

    /// Fetch every message of a conversation, in storage order.
    async fn fetch_conversation(&self, conversation_id: &str)
        -> Result<Vec<Message>, StoreError>;

    /// Insert a new message.
    async fn insert_message(&self, message: Message) -> Result<(), StoreError>;

    /// Replace a message's content and return the updated message.
    async fn update_content(&self, id: &str, content: &str) -> Result<Message, StoreError>;

    /// Register a new conversation record.
    async fn insert_conversation(&self, conversation: Conversation) -> Result<(), StoreError>;

    /// All conversations, newest first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Set or clear a conversation's title.
    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: Option<String>,
    ) -> Result<ConversationSummary, StoreError>;

    /// Delete a conversation and all of its messages. Returns the number of
    /// messages removed.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<usize, StoreError>;
}

#[async_trait]
impl<S: MessageStore + ?Sized> MessageStore for Arc<S> {
    async fn fetch_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        (**self).fetch_message(id).await
    }

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        (**self).fetch_conversation(conversation_id).await
    }

    async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        (**self).insert_message(message).await
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<Message, StoreError> {
        (**self).update_content(id, content).await
    }

    async fn insert_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        (**self).insert_conversation(conversation).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        (**self).list_conversations().await
    }

    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: Option<String>,
    ) -> Result<ConversationSummary, StoreError> {
        (**self).rename_conversation(conversation_id, title).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<usize, StoreError> {
        (**self).delete_conversation(conversation_id).await
    }
}

/// In-memory message store.
///
/// Keeps insertion order, both globally and per conversation, so snapshots
/// and conversation fetches are deterministic. A message whose conversation
/// has no record yet registers it, untitled and stamped with the message's
/// creation time.
#[derive(Default)]
pub struct MemoryMessageStore {
    index: RwLock<StoreIndex>,
}

#[derive(Default)]
struct StoreIndex {
    conversations: HashMap<ConversationId, Conversation>,
    conversation_order: Vec<ConversationId>,
    messages: HashMap<MessageId, Message>,
    by_conversation: HashMap<ConversationId, Vec<MessageId>>,
    order: Vec<MessageId>,
}

impl StoreIndex {
    fn insert_conversation(&mut self, conversation: Conversation) -> Result<(), StoreError> {
        if self.conversations.contains_key(&conversation.id) {
            return Err(StoreError::ConversationExists(conversation.id));
        }

        self.conversation_order.push(conversation.id.clone());
        self.conversations.insert(conversation.id.clone(), conversation);
        Ok(())
    }

    fn insert(&mut self, message: Message) -> Result<(), StoreError> {
        if self.messages.contains_key(&message.id) {
            return Err(StoreError::Duplicate(message.id));
        }

        if !self.conversations.contains_key(&message.conversation_id) {
            let mut conversation = Conversation::new(message.conversation_id.clone());
            conversation.created_at = message.created_at;
            self.insert_conversation(conversation)?;
        }

        self.by_conversation
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.id.clone());
        self.order.push(message.id.clone());
        self.messages.insert(message.id.clone(), message);
        Ok(())
    }

    fn summary(&self, conversation: &Conversation) -> ConversationSummary {
        let count = self.by_conversation.get(&conversation.id).map_or(0, Vec::len);
        ConversationSummary::new(conversation, count)
    }
}

impl MemoryMessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `messages`, in order.
    pub fn from_messages(
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<Self, StoreError> {
        Self::from_parts(Vec::new(), messages)
    }

    /// Create a store from conversation records and their messages.
    ///
    /// Records are registered first, so their titles and timestamps win over
    /// the ones implied by messages.
    pub fn from_parts(
        conversations: impl IntoIterator<Item = Conversation>,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<Self, StoreError> {
        let mut index = StoreIndex::default();
        for conversation in conversations {
            index.insert_conversation(conversation)?;
        }
        for message in messages {
            index.insert(message)?;
        }
        Ok(Self {
            index: RwLock::new(index),
        })
    }

    /// All messages in insertion order.
    pub fn snapshot(&self) -> Vec<Message> {
        let index = self.index.read();
        index
            .order
            .iter()
            .filter_map(|id| index.messages.get(id).cloned())
            .collect()
    }

    /// All conversation records in registration order.
    pub fn conversations(&self) -> Vec<Conversation> {
        let index = self.index.read();
        index
            .conversation_order
            .iter()
            .filter_map(|id| index.conversations.get(id).cloned())
            .collect()
    }

    /// IDs of all conversations, in registration order.
    pub fn conversation_ids(&self) -> Vec<ConversationId> {
        self.index.read().conversation_order.clone()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.index.read().messages.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn fetch_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        Ok(self.index.read().messages.get(id).cloned())
    }

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let index = self.index.read();
        let messages = index
            .by_conversation
            .get(conversation_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| index.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(messages)
    }

    async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        self.index.write().insert(message)
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<Message, StoreError> {
        let mut index = self.index.write();
        let message = index
            .messages
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        message.set_content(content);
        Ok(message.clone())
    }

    async fn insert_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        self.index.write().insert_conversation(conversation)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let index = self.index.read();

        // Latest registration first among equal timestamps
        let mut summaries: Vec<ConversationSummary> = index
            .conversation_order
            .iter()
            .rev()
            .filter_map(|id| index.conversations.get(id))
            .map(|conversation| index.summary(conversation))
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: Option<String>,
    ) -> Result<ConversationSummary, StoreError> {
        let mut index = self.index.write();
        let conversation = index
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;
        conversation.title = title;

        let conversation = conversation.clone();
        Ok(index.summary(&conversation))
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<usize, StoreError> {
        let mut index = self.index.write();
        if index.conversations.remove(conversation_id).is_none() {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }
        index.conversation_order.retain(|id| id != conversation_id);

        let ids = index.by_conversation.remove(conversation_id).unwrap_or_default();
        let StoreIndex {
            messages, order, ..
        } = &mut *index;
        for id in &ids {
            messages.remove(id);
        }
        order.retain(|id| messages.contains_key(id));

        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchtalk_core::Role;

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = MemoryMessageStore::new();
        let root = Message::root("conv1", "sys");
        let reply = Message::reply(&root, Role::User, "hello");

        store.insert_message(root.clone()).await.unwrap();
        store.insert_message(reply.clone()).await.unwrap();

        assert_eq!(store.fetch_message(&root.id).await.unwrap(), Some(root.clone()));
        assert_eq!(store.fetch_message("missing").await.unwrap(), None);

        let conversation = store.fetch_conversation("conv1").await.unwrap();
        assert_eq!(conversation, vec![root, reply]);
        assert!(store.fetch_conversation("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryMessageStore::new();
        let root = Message::root("conv1", "sys");

        store.insert_message(root.clone()).await.unwrap();
        let err = store.insert_message(root).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_content() {
        let root = Message::root("conv1", "sys").with_id("root");
        let store = MemoryMessageStore::from_messages([root]).unwrap();

        let updated = store.update_content("root", "new prompt").await.unwrap();
        assert_eq!(updated.content, "new prompt");
        assert_eq!(
            store.fetch_message("root").await.unwrap().unwrap().content,
            "new prompt"
        );

        let err = store.update_content("missing", "x").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let a = Message::root("conv-a", "a").with_id("a");
        let b = Message::root("conv-b", "b").with_id("b");
        let a1 = Message::reply(&a, Role::User, "a1").with_id("a1");

        let store = MemoryMessageStore::from_messages([a, b, a1]).unwrap();
        let ids: Vec<_> = store.snapshot().into_iter().map(|m| m.id).collect();

        assert_eq!(ids, vec!["a", "b", "a1"]);
        assert_eq!(store.conversation_ids(), vec!["conv-a", "conv-b"]);
    }

    #[tokio::test]
    async fn test_messages_register_their_conversation() {
        let root = Message::root("conv1", "sys").with_id("root");
        let created_at = root.created_at;
        let store = MemoryMessageStore::from_messages([root]).unwrap();

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "conv1");
        assert_eq!(listed[0].title, None);
        assert_eq!(listed[0].created_at, created_at);
        assert_eq!(listed[0].message_count, 1);
    }

    #[tokio::test]
    async fn test_list_conversations_newest_first() {
        let store = MemoryMessageStore::new();
        for id in ["old", "mid", "new"] {
            store.insert_conversation(Conversation::new(id)).await.unwrap();
        }
        store.insert_message(Message::root("mid", "sys")).await.unwrap();

        let listed = store.list_conversations().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(listed[1].message_count, 1);
        assert_eq!(listed[0].message_count, 0);

        let err = store
            .insert_conversation(Conversation::new("old"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationExists(_)));
    }

    #[tokio::test]
    async fn test_rename_conversation() {
        let store = MemoryMessageStore::from_parts(
            [Conversation::new("conv1").with_title("Draft")],
            [Message::root("conv1", "sys")],
        )
        .unwrap();

        let renamed = store
            .rename_conversation("conv1", Some("Trip ideas".to_string()))
            .await
            .unwrap();
        assert_eq!(renamed.title.as_deref(), Some("Trip ideas"));
        assert_eq!(renamed.message_count, 1);
        assert_eq!(store.conversations()[0].title.as_deref(), Some("Trip ideas"));

        let cleared = store.rename_conversation("conv1", None).await.unwrap();
        assert_eq!(cleared.title, None);

        let err = store
            .rename_conversation("ghost", Some("x".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_conversation_cascades() {
        let a = Message::root("conv-a", "a").with_id("a");
        let b = Message::root("conv-b", "b").with_id("b");
        let a1 = Message::reply(&a, Role::User, "a1").with_id("a1");
        let store = MemoryMessageStore::from_messages([a, b, a1]).unwrap();

        assert_eq!(store.delete_conversation("conv-a").await.unwrap(), 2);

        assert_eq!(store.len(), 1);
        assert!(store.fetch_message("a1").await.unwrap().is_none());
        assert!(store.fetch_conversation("conv-a").await.unwrap().is_empty());
        assert_eq!(store.conversation_ids(), vec!["conv-b"]);
        let ids: Vec<_> = store.snapshot().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["b"]);

        let err = store.delete_conversation("conv-a").await.unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn test_arc_store_delegates() {
        let store: Arc<dyn MessageStore> = Arc::new(MemoryMessageStore::new());
        let root = Message::root("conv1", "sys");
        store.insert_message(root.clone()).await.unwrap();
        assert!(store.fetch_message(&root.id).await.unwrap().is_some());
    }
}
