//! JSON snapshot files: conversation records plus their messages in storage
//! order. A bare message array is read as a snapshot without records.

use anyhow::{Context, Result};
use branchtalk_context::MemoryMessageStore;
use branchtalk_core::{Conversation, Message};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Full {
        #[serde(default)]
        conversations: Vec<Conversation>,
        messages: Vec<Message>,
    },
    Messages(Vec<Message>),
}

/// Load a snapshot into a fresh store. A missing file is an empty store.
pub async fn load(path: &Path) -> Result<MemoryMessageStore> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        tracing::debug!(path = ?path, "Snapshot not found, starting empty");
        return Ok(MemoryMessageStore::new());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let file: SnapshotFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid snapshot {}", path.display()))?;

    let (conversations, messages) = match file {
        SnapshotFile::Full {
            conversations,
            messages,
        } => (conversations, messages),
        SnapshotFile::Messages(messages) => (Vec::new(), messages),
    };

    let store = MemoryMessageStore::from_parts(conversations, messages)
        .with_context(|| format!("Inconsistent snapshot {}", path.display()))?;
    tracing::debug!(path = ?path, messages = store.len(), "Snapshot loaded");
    Ok(store)
}

/// Write the store's conversations and messages back to `path`.
pub async fn save(path: &Path, store: &MemoryMessageStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file = SnapshotFile::Full {
        conversations: store.conversations(),
        messages: store.snapshot(),
    };
    let content = serde_json::to_string_pretty(&file)?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchtalk_core::Role;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let temp_dir = tempdir().unwrap();
        let store = load(&temp_dir.path().join("none.json")).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("chat.json");

        let root = Message::root("conv1", "sys").with_id("root");
        let reply = Message::reply(&root, Role::User, "hi").with_id("m1");
        let store = MemoryMessageStore::from_messages([root, reply]).unwrap();

        save(&path, &store).await.unwrap();
        let loaded = load(&path).await.unwrap();

        assert_eq!(loaded.snapshot(), store.snapshot());
        assert_eq!(loaded.conversations(), store.conversations());
    }

    #[tokio::test]
    async fn test_titles_survive_save() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("chat.json");

        let store = MemoryMessageStore::from_parts(
            [Conversation::new("conv1").with_title("Trip ideas")],
            [Message::root("conv1", "sys")],
        )
        .unwrap();
        save(&path, &store).await.unwrap();

        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded.conversations()[0].title.as_deref(), Some("Trip ideas"));
    }

    #[tokio::test]
    async fn test_bare_message_array() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("legacy.json");

        let root = Message::root("conv1", "sys").with_id("root");
        std::fs::write(&path, serde_json::to_string(&vec![root]).unwrap()).unwrap();

        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.conversation_ids(), vec!["conv1"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dup.json");

        let root = Message::root("conv1", "sys").with_id("root");
        let json = serde_json::to_string(&vec![root.clone(), root]).unwrap();
        std::fs::write(&path, json).unwrap();

        assert!(load(&path).await.is_err());
    }
}
