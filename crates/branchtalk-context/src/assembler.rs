//! Context assembly: the root-to-message history sent to a language model.
//!
//! Walks ancestry through the message store, one point lookup per ancestor,
//! so callers need nothing but a message ID.

use crate::error::StoreError;
use crate::store::MessageStore;
use branchtalk_core::{ChatTurn, Message};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Build the ordered context ending at `leaf_id`, root first.
///
/// The walk stops at the first ID the store does not know, which is not an
/// error: a missing start yields an empty context, a missing ancestor
/// truncates it. Store failures abort the whole walk. Lookups are strictly
/// sequential since each depends on the previous result.
pub async fn build_context<S>(store: &S, leaf_id: &str) -> Result<Vec<Message>, StoreError>
where
    S: MessageStore + ?Sized,
{
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(leaf_id.to_string());

    while let Some(id) = current.take() {
        if !seen.insert(id.clone()) {
            warn!(leaf = %leaf_id, repeated = %id, "Cycle in message ancestry");
            break;
        }

        let Some(message) = store.fetch_message(&id).await? else {
            break;
        };

        current = message.parent_message_id.clone();
        chain.push(message);
    }

    chain.reverse();

    debug!(leaf = %leaf_id, messages = chain.len(), "Context assembled");
    Ok(chain)
}

/// Convert a context into `{role, content}` turns for a model request.
pub fn model_turns(context: &[Message]) -> Vec<ChatTurn> {
    context.iter().map(ChatTurn::from).collect()
}
