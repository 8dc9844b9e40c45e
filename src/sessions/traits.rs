//! Conversation storage traits and types for per-user chat history.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a user's conversation. Never edited after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
}

impl ConversationEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered history for one user, oldest entry first.
pub type Conversation = Vec<ConversationEntry>;

/// Process-lifetime storage of conversations keyed by user identifier.
///
/// Append-only: there is deliberately no way to remove or rewrite entries.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return a snapshot of the user's conversation, registering an empty one
    /// on first access.
    async fn get_or_create(&self, user_id: &str) -> Result<Conversation>;

    /// Append an entry to the end of the user's conversation.
    async fn append(&self, user_id: &str, entry: ConversationEntry) -> Result<()>;

    /// Number of entries recorded for the user (0 for unknown users).
    async fn len(&self, user_id: &str) -> Result<usize>;

    /// Number of users with a registered conversation.
    async fn user_count(&self) -> Result<usize>;

    /// The name of this store implementation.
    fn name(&self) -> &str;
}
