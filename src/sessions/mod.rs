//! Per-user chat history, kept for the life of the process.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryConversationStore;
pub use traits::{Conversation, ConversationEntry, ConversationStore, Role};

use std::sync::Arc;

/// Create the default in-memory conversation store.
pub fn create_conversation_store() -> Arc<dyn ConversationStore> {
    Arc::new(InMemoryConversationStore::new())
}
