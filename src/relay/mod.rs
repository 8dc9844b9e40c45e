//! Streaming chat relay.
//!
//! One call to [`ChatRelay::handle_turn`] runs a full turn: validate, record
//! the user input, stream the agent's tokens to a [`FrameSink`], and record the
//! assembled response. Turns for the same user are serialized.

pub mod frames;

pub use frames::{
    extract_user_input, ChatInput, FrameSink, InboundFrame, InputMessage, OutboundFrame,
    StdoutSink,
};

use crate::agent::{create_agent, AgentEvent, AgentRuntime, AgentSettings};
use crate::sessions::{ConversationEntry, ConversationStore};
use crate::util::truncate_with_ellipsis;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Sent instead of a response when no model credential is configured.
pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "OPENAI_API_KEY is not configured. Please set it in your environment.";

/// Sent and recorded when the agent run fails.
pub const APOLOGY_MESSAGE: &str = "Sorry\u{2014}there was an error generating the response.";

const INPUT_PREVIEW_CHARS: usize = 50;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Input was empty; nothing was sent or recorded.
    Skipped,
    /// No credential; the error text was sent and nothing was recorded.
    Misconfigured,
    Completed { response: String },
    /// The agent run failed; the apology was sent and recorded.
    Failed { reason: String },
}

pub struct ChatRelay {
    store: Arc<dyn ConversationStore>,
    runtime: AgentRuntime,
    settings: AgentSettings,
    credential_configured: bool,
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatRelay {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        runtime: AgentRuntime,
        settings: AgentSettings,
        credential_configured: bool,
    ) -> Self {
        Self {
            store,
            runtime,
            settings,
            credential_configured,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn credential_configured(&self) -> bool {
        self.credential_configured
    }

    fn turn_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.turn_locks.lock();
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// Run one chat turn for `user_id`, writing frames to `sink`.
    ///
    /// Agent failures are contained and reported as [`TurnOutcome::Failed`];
    /// only sink and store errors are returned as `Err`.
    pub async fn handle_turn(
        &self,
        sink: &mut dyn FrameSink,
        input: &ChatInput,
        user_id: &str,
    ) -> Result<TurnOutcome> {
        if !self.credential_configured {
            tracing::warn!(user = user_id, "Chat turn rejected: no API key configured");
            sink.send_frame(OutboundFrame::Stream(MISSING_CREDENTIAL_MESSAGE.to_string()))
                .await?;
            sink.send_frame(OutboundFrame::End).await?;
            return Ok(TurnOutcome::Misconfigured);
        }

        let text = extract_user_input(input);
        if text.is_empty() {
            tracing::debug!(user = user_id, "Chat turn skipped: empty input");
            return Ok(TurnOutcome::Skipped);
        }

        let lock = self.turn_lock(user_id);
        let _turn = lock.lock().await;

        tracing::info!(
            user = user_id,
            op = "chat",
            input = %truncate_with_ellipsis(&text, INPUT_PREVIEW_CHARS),
            "Chat turn started"
        );

        self.store
            .append(user_id, ConversationEntry::user(text))
            .await?;
        let history = self.store.get_or_create(user_id).await?;
        let agent = create_agent(&self.settings);

        let mut events = self.runtime.run_streamed(&agent, &history);
        let mut response = String::new();
        let fault = loop {
            match events.next().await {
                Some(AgentEvent::Token(token)) => {
                    sink.send_frame(OutboundFrame::Stream(token.clone())).await?;
                    response.push_str(&token);
                }
                Some(AgentEvent::Done) => break None,
                Some(AgentEvent::Fault(reason)) => break Some(reason),
                None => break Some("agent stream closed before completion".to_string()),
            }
        };

        match fault {
            None => {
                sink.send_frame(OutboundFrame::End).await?;
                self.store
                    .append(user_id, ConversationEntry::assistant(response.clone()))
                    .await?;
                tracing::info!(
                    user = user_id,
                    op = "chat",
                    chars = response.chars().count(),
                    "Chat turn completed"
                );
                Ok(TurnOutcome::Completed { response })
            }
            Some(reason) => {
                tracing::error!(user = user_id, op = "chat", error = %reason, "Chat turn failed");
                sink.send_frame(OutboundFrame::Stream(APOLOGY_MESSAGE.to_string()))
                    .await?;
                sink.send_frame(OutboundFrame::End).await?;
                self.store
                    .append(user_id, ConversationEntry::assistant(APOLOGY_MESSAGE))
                    .await?;
                Ok(TurnOutcome::Failed { reason })
            }
        }
    }
}
