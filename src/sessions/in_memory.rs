//! In-memory conversation store implementation.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{Conversation, ConversationEntry, ConversationStore};

/// A conversation store backed by a mutex-protected hash map.
///
/// Grows without bound for the life of the process.
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_or_create(&self, user_id: &str) -> Result<Conversation> {
        let mut conversations = self.conversations.lock();
        Ok(conversations
            .entry(user_id.to_string())
            .or_default()
            .clone())
    }

    async fn append(&self, user_id: &str, entry: ConversationEntry) -> Result<()> {
        let mut conversations = self.conversations.lock();
        conversations
            .entry(user_id.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn len(&self, user_id: &str) -> Result<usize> {
        let conversations = self.conversations.lock();
        Ok(conversations.get(user_id).map_or(0, Vec::len))
    }

    async fn user_count(&self) -> Result<usize> {
        Ok(self.conversations.lock().len())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
