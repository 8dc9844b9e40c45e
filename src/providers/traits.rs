use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single message in the request sent to a model provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// A model backend able to stream a completion for a message history.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stream a completion for `messages`.
    ///
    /// Each text fragment is sent on `tx` as soon as it arrives; the full text
    /// is returned once the provider signals the end of the stream. A closed
    /// receiver is not an error for the provider.
    async fn stream_chat_with_history(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
        tx: mpsc::UnboundedSender<String>,
    ) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}
