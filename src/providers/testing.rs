//! Scripted provider used by relay and gateway tests.

use super::traits::{ChatMessage, Provider};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Replays a fixed token script, optionally failing after a number of tokens.
pub(crate) struct ScriptedProvider {
    tokens: Vec<String>,
    fail_after: Option<usize>,
    /// When set, each call answers with the next whole reply instead.
    replies: Option<Mutex<VecDeque<String>>>,
    /// Message histories received, one per call.
    pub(crate) calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub(crate) fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            fail_after: None,
            replies: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer call N with `replies[N]`; calls past the end fail.
    pub(crate) fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Some(Mutex::new(
                replies.iter().map(|r| (*r).to_string()).collect(),
            )),
            ..Self::new(&[])
        }
    }

    /// Emit the first `count` tokens, then fail.
    pub(crate) fn failing_after(tokens: &[&str], count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::new(tokens)
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub(crate) fn last_call(&self) -> Option<Vec<ChatMessage>> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn stream_chat_with_history(
        &self,
        messages: &[ChatMessage],
        _model: &str,
        _temperature: f64,
        tx: mpsc::UnboundedSender<String>,
    ) -> anyhow::Result<String> {
        self.calls.lock().push(messages.to_vec());

        if let Some(replies) = &self.replies {
            let reply = replies.lock().pop_front();
            let Some(reply) = reply else {
                anyhow::bail!("scripted replies exhausted");
            };
            let _ = tx.send(reply.clone());
            return Ok(reply);
        }

        let mut full = String::new();
        for (i, token) in self.tokens.iter().enumerate() {
            if self.fail_after == Some(i) {
                anyhow::bail!("scripted failure after {i} tokens");
            }
            full.push_str(token);
            let _ = tx.send(token.clone());
            tokio::task::yield_now().await;
        }
        if let Some(limit) = self.fail_after {
            if limit >= self.tokens.len() {
                anyhow::bail!("scripted failure after {limit} tokens");
            }
        }
        Ok(full)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
