//! Frontline agent: answers small talk itself and routes data requests to the
//! ERP worker.

use super::strip_code_fence;
use crate::sessions::ConversationEntry;
use serde::Deserialize;

pub const FRONTLINE_AGENT_NAME: &str = "Frontline";

pub const FRONTLINE_PROMPT: &str = r#"You are the frontline assistant for an inventory and order management system.

Handle greetings, small talk and general questions about what you can do yourself.
Route anything that needs live data or changes it (stock levels, transfers, orders,
customers, reports, demand forecasts) to the specialist.

Respond with a single JSON object and nothing else:
{"route_to_orchestrator": false, "response": "<your answer>"}
or
{"route_to_orchestrator": true, "reason": "<what the specialist should do>"}"#;

/// Entries of history shown to the frontline agent.
const HISTORY_WINDOW: usize = 4;

const DEFAULT_ROUTE_REASON: &str = "Specialized task detected";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontlineDecision {
    /// Answer the user with this text.
    Respond(String),
    /// Hand the request to the ERP worker.
    Route { reason: String },
}

#[derive(Deserialize)]
struct RawDecision {
    #[serde(default)]
    route_to_orchestrator: bool,
    response: Option<String>,
    reason: Option<String>,
}

/// Prompt for one frontline run. `history` already ends with `input`.
pub fn build_context(history: &[ConversationEntry], input: &str) -> String {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let lines: Vec<String> = recent
        .iter()
        .map(|entry| format!("{}: {}", entry.role.as_str().to_uppercase(), entry.content))
        .collect();

    format!(
        "Recent conversation:\n{}\n\nCurrent user message: {input}\n\n\
         Decide whether to handle this directly or route to the orchestrator.",
        lines.join("\n")
    )
}

/// Read the agent's decision. Output that is not a decision object is
/// treated as a direct answer.
pub fn parse_decision(output: &str) -> FrontlineDecision {
    match serde_json::from_str::<RawDecision>(strip_code_fence(output.trim())) {
        Ok(raw) if raw.route_to_orchestrator => FrontlineDecision::Route {
            reason: raw
                .reason
                .unwrap_or_else(|| DEFAULT_ROUTE_REASON.to_string()),
        },
        Ok(raw) => FrontlineDecision::Respond(raw.response.unwrap_or_default()),
        Err(_) => {
            tracing::warn!("Frontline output was not a decision; answering with it directly");
            FrontlineDecision::Respond(output.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_keeps_reason() {
        let decision =
            parse_decision(r#"{"route_to_orchestrator": true, "reason": "stock lookup"}"#);
        assert_eq!(
            decision,
            FrontlineDecision::Route {
                reason: "stock lookup".into()
            }
        );
    }

    #[test]
    fn route_without_reason_gets_default() {
        assert_eq!(
            parse_decision(r#"{"route_to_orchestrator": true}"#),
            FrontlineDecision::Route {
                reason: "Specialized task detected".into()
            }
        );
    }

    #[test]
    fn direct_answer_and_missing_response() {
        assert_eq!(
            parse_decision(r#"{"route_to_orchestrator": false, "response": "Hello!"}"#),
            FrontlineDecision::Respond("Hello!".into())
        );
        assert_eq!(
            parse_decision(r#"{"route_to_orchestrator": false}"#),
            FrontlineDecision::Respond(String::new())
        );
    }

    #[test]
    fn fenced_json_is_accepted() {
        let output = "```json\n{\"route_to_orchestrator\": true, \"reason\": \"orders\"}\n```";
        assert_eq!(
            parse_decision(output),
            FrontlineDecision::Route {
                reason: "orders".into()
            }
        );
    }

    #[test]
    fn plain_text_is_a_direct_answer() {
        assert_eq!(
            parse_decision("  Sure, happy to help.  "),
            FrontlineDecision::Respond("  Sure, happy to help.  ".into())
        );
    }

    #[test]
    fn context_shows_last_four_entries() {
        let history = vec![
            ConversationEntry::user("one"),
            ConversationEntry::assistant("two"),
            ConversationEntry::user("three"),
            ConversationEntry::assistant("four"),
            ConversationEntry::user("five"),
        ];
        let context = build_context(&history, "five");

        assert!(!context.contains("USER: one"));
        assert!(context.starts_with("Recent conversation:\nASSISTANT: two\nUSER: three"));
        assert!(context.contains("USER: five\n\nCurrent user message: five\n\n"));
        assert!(context.ends_with("route to the orchestrator."));
    }
}
