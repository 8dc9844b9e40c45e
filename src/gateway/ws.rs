//! Chat WebSocket endpoint.
//!
//! Each connection processes frames one at a time. A `uuid` in any frame
//! identifies the user for the rest of the connection.

use super::AppState;
use crate::relay::{ChatInput, FrameSink, InboundFrame, OutboundFrame};
use crate::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

/// User id for connections that never sent a `uuid`.
pub const ANONYMOUS_USER: &str = "anonymous";

const LOG_PREVIEW_CHARS: usize = 120;

/// GET /ws: upgrade to the chat protocol
pub async fn handle_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct SocketSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameSink for SocketSink {
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<()> {
        self.sender
            .send(Message::Text(frame.to_json().into()))
            .await
            .context("Failed to send chat frame")
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn = Uuid::new_v4();
    let (sender, mut receiver) = socket.split();
    let mut sink = SocketSink { sender };
    let mut user_id: Option<String> = None;

    tracing::info!(%conn, "Chat connection opened");

    while let Some(message) = receiver.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(%conn, user = ?user_id, "WebSocket error: {e}");
                break;
            }
        };

        let frame: InboundFrame = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    %conn,
                    user = ?user_id,
                    raw = %truncate_with_ellipsis(text.as_str(), LOG_PREVIEW_CHARS),
                    "Ignoring malformed chat frame: {e}"
                );
                continue;
            }
        };

        if let Some(uuid) = frame.uuid {
            user_id = Some(uuid);
        }

        if frame.init {
            tracing::info!(%conn, user = ?user_id, "Chat client initialized");
            continue;
        }

        let input = match frame.message {
            Some(ChatInput::Text(text)) if text.is_empty() => continue,
            Some(input) => input,
            None => continue,
        };

        let user = user_id.as_deref().unwrap_or(ANONYMOUS_USER);
        match state.relay.handle_turn(&mut sink, &input, user).await {
            Ok(outcome) => tracing::debug!(%conn, user, ?outcome, "Chat turn finished"),
            Err(e) => {
                tracing::warn!(%conn, user, "Chat turn aborted: {e:#}");
                break;
            }
        }
    }

    tracing::info!(%conn, user = ?user_id, "Chat connection closed");
}
