//! Conversation manager.
//!
//! Owns the message store handle and an LRU of built tree sessions. Any write
//! to a conversation evicts its session, so the next read rebuilds the tree
//! (with a fresh path cache) from the store.

use crate::assembler::{build_context, model_turns};
use crate::error::{ConversationError, Result, StoreError};
use crate::store::MessageStore;
use branchtalk_core::{
    ChatTurn, Conversation, ConversationId, ConversationSummary, EngineConfig, Message, MessageId,
    Role, TreeSession,
};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// IDs created by [`ConversationManager::create_conversation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub conversation_id: ConversationId,
    pub root_message_id: MessageId,
}

/// Central manager for branching conversations.
pub struct ConversationManager {
    /// Backing message store
    store: Arc<dyn MessageStore>,
    /// Built trees (conversation_id -> session)
    sessions: Mutex<LruCache<ConversationId, Arc<TreeSession>>>,
    /// Bumped on every invalidation; a load that straddles one is not cached
    generation: AtomicU64,
    /// Root prompt for new conversations
    default_system_prompt: String,
}

impl ConversationManager {
    /// Create a new conversation manager.
    pub fn new(store: Arc<dyn MessageStore>, config: &EngineConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);

        Self {
            store,
            sessions: Mutex::new(LruCache::new(capacity)),
            generation: AtomicU64::new(0),
            default_system_prompt: config.default_system_prompt.clone(),
        }
    }

    /// The backing message store.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Start an untitled conversation with a root system message.
    pub async fn create_conversation(
        &self,
        system_prompt: Option<String>,
    ) -> Result<NewConversation> {
        let conversation_id = uuid::Uuid::new_v4().to_string();
        let prompt = system_prompt.unwrap_or_else(|| self.default_system_prompt.clone());
        let root = Message::root(conversation_id.clone(), prompt);
        let root_message_id = root.id.clone();

        self.store
            .insert_conversation(Conversation::new(conversation_id.clone()))
            .await?;
        self.store.insert_message(root).await?;

        info!(conversation = %conversation_id, "Conversation created");
        Ok(NewConversation {
            conversation_id,
            root_message_id,
        })
    }

    /// Append a reply to `parent_id` in `conversation_id`.
    ///
    /// The parent must exist and belong to the same conversation. Depth is
    /// derived from the parent.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        parent_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        if conversation_id.is_empty() {
            return Err(ConversationError::MissingField("conversation_id"));
        }
        if parent_id.is_empty() {
            return Err(ConversationError::MissingField("parent_message_id"));
        }
        if content.is_empty() {
            return Err(ConversationError::MissingField("content"));
        }

        let parent = self
            .store
            .fetch_message(parent_id)
            .await?
            .filter(|parent| parent.conversation_id == conversation_id)
            .ok_or_else(|| ConversationError::InvalidParent {
                parent_id: parent_id.to_string(),
                conversation_id: conversation_id.to_string(),
            })?;

        let message = Message::reply(&parent, role, content);
        self.store.insert_message(message.clone()).await?;
        self.invalidate(conversation_id);

        debug!(
            conversation = %conversation_id,
            message = %message.id,
            depth = message.depth,
            "Message appended"
        );
        Ok(message)
    }

    /// Replace a message's content, e.g. while a reply streams in.
    pub async fn update_content(&self, message_id: &str, content: &str) -> Result<Message> {
        let message = self
            .store
            .update_content(message_id, content)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(id) => ConversationError::MessageNotFound(id),
                other => other.into(),
            })?;

        self.invalidate(&message.conversation_id);
        Ok(message)
    }

    /// All conversations, newest first.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        Ok(self.store.list_conversations().await?)
    }

    /// Set a conversation's title. A blank title clears it.
    pub async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: Option<&str>,
    ) -> Result<ConversationSummary> {
        let title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string);

        let summary = self
            .store
            .rename_conversation(conversation_id, title)
            .await
            .map_err(not_found_as_conversation)?;

        debug!(conversation = %conversation_id, title = ?summary.title, "Conversation renamed");
        Ok(summary)
    }

    /// Delete a conversation with all of its messages and drop its session.
    /// Returns the number of messages removed.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<usize> {
        let removed = self
            .store
            .delete_conversation(conversation_id)
            .await
            .map_err(not_found_as_conversation)?;
        self.invalidate(conversation_id);

        info!(conversation = %conversation_id, messages = removed, "Conversation deleted");
        Ok(removed)
    }

    /// Get the built tree for a conversation, loading it on a cache miss.
    pub async fn session(&self, conversation_id: &str) -> Result<Arc<TreeSession>> {
        // Check cache
        let cached = self.sessions.lock().get(conversation_id).cloned();
        if let Some(session) = cached {
            return Ok(session);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let messages = self.store.fetch_conversation(conversation_id).await?;
        if messages.is_empty() {
            return Err(ConversationError::ConversationNotFound(
                conversation_id.to_string(),
            ));
        }

        let session = Arc::new(TreeSession::from_messages(&messages));

        // Add to cache unless a write landed while loading
        {
            let mut sessions = self.sessions.lock();
            if self.generation.load(Ordering::Acquire) == generation {
                sessions.put(conversation_id.to_string(), session.clone());
            }
        }

        debug!(
            conversation = %conversation_id,
            nodes = session.len(),
            "Session loaded"
        );
        Ok(session)
    }

    /// Root-to-message history for `message_id`.
    pub async fn context(&self, message_id: &str) -> Result<Vec<Message>> {
        Ok(build_context(self.store.as_ref(), message_id).await?)
    }

    /// Root-to-message history as model turns.
    pub async fn model_context(&self, message_id: &str) -> Result<Vec<ChatTurn>> {
        let context = self.context(message_id).await?;
        Ok(model_turns(&context))
    }

    /// Drop the cached session for a conversation. Returns whether one was cached.
    pub fn invalidate(&self, conversation_id: &str) -> bool {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.sessions.lock().pop(conversation_id).is_some()
    }

    /// Number of cached sessions.
    pub fn cached_sessions(&self) -> usize {
        self.sessions.lock().len()
    }
}

fn not_found_as_conversation(err: StoreError) -> ConversationError {
    match err {
        StoreError::ConversationNotFound(id) => ConversationError::ConversationNotFound(id),
        other => other.into(),
    }
}
