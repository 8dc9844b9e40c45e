//! Wire types for the chat socket: inbound payloads, outbound frames and the
//! sink abstraction the relay writes to.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

/// One role-tagged message as sent by chat clients.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InputMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// User input for one turn: raw text or a client-side message list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChatInput {
    Text(String),
    Messages(Vec<InputMessage>),
}

impl From<&str> for ChatInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A JSON payload received on the chat socket.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub init: bool,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub message: Option<ChatInput>,
}

/// Extract the text to send to the agent.
///
/// Raw text is used as-is; for a message list the content of the last
/// `"user"` entry wins. Returns an empty string when there is nothing to send.
pub fn extract_user_input(input: &ChatInput) -> String {
    match input {
        ChatInput::Text(text) => text.clone(),
        ChatInput::Messages(messages) => messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default(),
    }
}

/// A frame sent to the chat client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// `{"on_chat_model_stream": "<text>"}`
    Stream(String),
    /// `{"on_chat_model_end": true}`
    End,
}

impl OutboundFrame {
    pub fn to_json(&self) -> String {
        match self {
            Self::Stream(text) => serde_json::json!({ "on_chat_model_stream": text }).to_string(),
            Self::End => serde_json::json!({ "on_chat_model_end": true }).to_string(),
        }
    }
}

/// Destination for outbound frames of a chat turn.
#[async_trait]
pub trait FrameSink: Send {
    /// Deliver one frame. An error means the client is gone.
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<()>;
}

/// Writes each frame as one JSON line to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink {
    frames_written: usize,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

#[async_trait]
impl FrameSink for StdoutSink {
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<()> {
        let mut line = frame.to_json();
        line.push('\n');
        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        self.frames_written += 1;
        Ok(())
    }
}
