//! Request/response assistant behind `POST /api/ai/query`.
//!
//! A query first goes to the [`frontline`] agent. It either answers directly
//! or routes the request to the [`erp_worker`], which runs one operation
//! against the fixture tables. History is kept per session id and can be
//! cleared, unlike the append-only chat history of the WebSocket relay.

pub mod erp_worker;
pub mod frontline;

pub use frontline::FrontlineDecision;

use crate::agent::{create_task_agent, AgentRuntime, AgentSettings};
use crate::erp::ErpTables;
use crate::sessions::{Conversation, ConversationEntry};
use crate::util::truncate_with_ellipsis;
use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const RESULT_MARKER: &str = "\n\nResult:\n";
const QUERY_PREVIEW_CHARS: usize = 80;

/// Outcome of one assistant query.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub message: String,
    /// Structured operation result, when the ERP worker produced one.
    pub data: Option<Value>,
    pub routed: bool,
}

pub struct Assistant {
    runtime: AgentRuntime,
    erp: Arc<ErpTables>,
    settings: AgentSettings,
    credential_configured: bool,
    sessions: Mutex<HashMap<String, Conversation>>,
}

impl Assistant {
    pub fn new(
        runtime: AgentRuntime,
        erp: Arc<ErpTables>,
        settings: AgentSettings,
        credential_configured: bool,
    ) -> Self {
        Self {
            runtime,
            erp,
            settings,
            credential_configured,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn credential_configured(&self) -> bool {
        self.credential_configured
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn session_len(&self, session_id: &str) -> usize {
        self.sessions.lock().get(session_id).map_or(0, Vec::len)
    }

    /// Drop a session's history. Returns false for unknown sessions.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.lock().remove(session_id).is_some()
    }

    fn record(&self, session_id: &str, entry: ConversationEntry) -> Conversation {
        let mut sessions = self.sessions.lock();
        let conversation = sessions.entry(session_id.to_string()).or_default();
        conversation.push(entry);
        conversation.clone()
    }

    /// Answer `query` within `session_id`.
    ///
    /// The query is recorded before any agent runs, so it stays in the
    /// session even when the run fails. The reply is recorded only on success.
    pub async fn answer(&self, session_id: &str, query: &str) -> Result<AssistantReply> {
        tracing::info!(
            session_id,
            query = %truncate_with_ellipsis(query, QUERY_PREVIEW_CHARS),
            "Assistant query"
        );
        let history = self.record(session_id, ConversationEntry::user(query));

        let agent = create_task_agent(
            frontline::FRONTLINE_AGENT_NAME,
            frontline::FRONTLINE_PROMPT,
            &self.settings,
        );
        let context = frontline::build_context(&history, query);
        let output = self
            .runtime
            .run(&agent, &[ConversationEntry::user(context)])
            .await?;

        let (routed, response) = match frontline::parse_decision(&output) {
            FrontlineDecision::Respond(text) => {
                tracing::info!(session_id, "Frontline answered directly");
                (false, text)
            }
            FrontlineDecision::Route { reason } => {
                tracing::info!(session_id, %reason, "Routing to ERP worker");
                let text =
                    erp_worker::run(&self.runtime, &self.settings, &self.erp, query, &reason)
                        .await?;
                (true, text)
            }
        };

        self.record(session_id, ConversationEntry::assistant(response.clone()));
        let (message, data) = split_result(&response);
        Ok(AssistantReply {
            message,
            data,
            routed,
        })
    }
}

/// Split `"{message}\n\nResult:\n{json}"` into its parts. Text without a
/// parseable result comes back whole.
pub fn split_result(response: &str) -> (String, Option<Value>) {
    if let Some((message, payload)) = response.split_once(RESULT_MARKER) {
        if let Ok(data) = serde_json::from_str::<Value>(payload.trim()) {
            return (message.trim().to_string(), Some(data));
        }
    }
    (response.to_string(), None)
}

/// Body of a ```` ``` ```` fenced block (an optional `json` tag dropped), or
/// the text itself.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let body = text.split("```").nth(1).unwrap_or_default();
    body.strip_prefix("json").unwrap_or(body)
}
