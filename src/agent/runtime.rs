//! Streaming agent runtime.
//!
//! Drives a [`Provider`] for one turn on a background task and decodes its
//! output into the closed [`AgentEvent`] set consumed by the relay.

use crate::agent::AgentDescriptor;
use crate::providers::{sanitize_api_error, ChatMessage, Provider};
use crate::sessions::ConversationEntry;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One decoded event from a streaming agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// An incremental, non-empty fragment of generated text.
    Token(String),
    /// The run finished successfully. Always the last event.
    Done,
    /// The run failed. Always the last event; carries a sanitized reason.
    Fault(String),
}

/// Receiver side of a streaming run. Dropping it aborts the run.
pub struct AgentEventStream {
    rx: mpsc::UnboundedReceiver<AgentEvent>,
    task: JoinHandle<()>,
}

impl AgentEventStream {
    /// Next event, or `None` once the run has ended and every event was read.
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }
}

impl Drop for AgentEventStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs agents against a shared provider.
#[derive(Clone)]
pub struct AgentRuntime {
    provider: Arc<dyn Provider>,
}

impl AgentRuntime {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Start a streaming run of `agent` over `history`.
    ///
    /// The agent instructions go first as the system message, followed by the
    /// history in order.
    pub fn run_streamed(
        &self,
        agent: &AgentDescriptor,
        history: &[ConversationEntry],
    ) -> AgentEventStream {
        let messages = build_messages(agent, history);
        let provider = Arc::clone(&self.provider);
        let agent = agent.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            tracing::info!(
                agent = %agent.name,
                model = %agent.model,
                provider = provider.name(),
                messages = messages.len(),
                "Agent stream started"
            );

            let (token_tx, mut token_rx) = mpsc::unbounded_channel::<String>();
            let call =
                provider.stream_chat_with_history(&messages, &agent.model, agent.temperature, token_tx);
            tokio::pin!(call);

            let mut chunks = 0usize;
            let mut forward = |token: String| {
                if token.is_empty() {
                    return;
                }
                chunks += 1;
                let _ = events_tx.send(AgentEvent::Token(token));
            };

            let result = loop {
                tokio::select! {
                    biased;
                    Some(token) = token_rx.recv() => forward(token),
                    result = &mut call => break result,
                }
            };

            // Tokens sent just before the call returned are still queued.
            while let Ok(token) = token_rx.try_recv() {
                forward(token);
            }

            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match result {
                Ok(_) => {
                    tracing::info!(agent = %agent.name, chunks, elapsed_ms, "Agent stream finished");
                    let _ = events_tx.send(AgentEvent::Done);
                }
                Err(e) => {
                    let reason = sanitize_api_error(&format!("{e:#}"));
                    tracing::warn!(agent = %agent.name, chunks, elapsed_ms, error = %reason, "Agent stream failed");
                    let _ = events_tx.send(AgentEvent::Fault(reason));
                }
            }
        });

        AgentEventStream {
            rx: events_rx,
            task,
        }
    }

    /// Run `agent` over `history` to completion and return the full text.
    pub async fn run(&self, agent: &AgentDescriptor, history: &[ConversationEntry]) -> Result<String> {
        let mut stream = self.run_streamed(agent, history);
        let mut output = String::new();
        while let Some(event) = stream.next().await {
            match event {
                AgentEvent::Token(token) => output.push_str(&token),
                AgentEvent::Done => return Ok(output),
                AgentEvent::Fault(reason) => return Err(anyhow!(reason)),
            }
        }
        Err(anyhow!("Agent run ended without a result"))
    }
}

fn build_messages(agent: &AgentDescriptor, history: &[ConversationEntry]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(agent.instructions.clone()));
    messages.extend(history.iter().map(|entry| ChatMessage {
        role: entry.role.as_str().to_string(),
        content: entry.content.clone(),
    }));
    messages
}
