//! Generic OpenAI-compatible provider.
//! Most LLM APIs follow the same `/v1/chat/completions` format, so a single
//! streaming implementation covers OpenAI itself and any compatible proxy.

use crate::providers::traits::{ChatMessage, Provider};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) auth_header: AuthStyle,
    client: Client,
}

/// How the provider expects the API key to be sent.
#[derive(Debug, Clone)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>`
    XApiKey,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, auth_style: AuthStyle) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            auth_header: auth_style,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build the full URL for chat completions, detecting if base_url already includes the path.
    fn chat_completions_url(&self) -> String {
        let has_full_endpoint = reqwest::Url::parse(&self.base_url)
            .map(|url| {
                url.path()
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            })
            .unwrap_or_else(|_| {
                self.base_url
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            });

        if has_full_endpoint {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn apply_auth_header(
        &self,
        req: reqwest::RequestBuilder,
        api_key: &str,
    ) -> reqwest::RequestBuilder {
        match &self.auth_header {
            AuthStyle::Bearer => req.header("Authorization", format!("Bearer {api_key}")),
            AuthStyle::XApiKey => req.header("x-api-key", api_key),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamChatResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Error object some compatible servers emit inside the event stream instead
/// of failing the HTTP request.
#[derive(Debug, Deserialize)]
struct StreamErrorEnvelope {
    error: StreamError,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: Option<String>,
}

/// Incremental decoder for the `data:` lines of a server-sent event stream.
///
/// Bytes are buffered until a newline so multi-byte characters split across
/// network chunks decode intact.
#[derive(Debug, Default)]
struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the payload of every line completed so far.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let Some(end) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.pending.drain(..=end).collect();
        String::from_utf8_lossy(&complete)
            .lines()
            .filter_map(data_payload)
            .collect()
    }

    /// Payload of a final line that arrived without a newline.
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        data_payload(&String::from_utf8_lossy(&rest))
    }
}

/// `data:` payload of one line. Comments, event names and `[DONE]` yield nothing.
fn data_payload(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        None
    } else {
        Some(data.to_string())
    }
}

/// Decode one SSE payload, forwarding its text deltas.
fn forward_payload(
    payload: &str,
    content_buf: &mut String,
    tx: &mpsc::UnboundedSender<String>,
) -> anyhow::Result<()> {
    if let Ok(chunk) = serde_json::from_str::<StreamChatResponse>(payload) {
        for choice in &chunk.choices {
            if let Some(ref content) = choice.delta.content {
                if content.is_empty() {
                    continue;
                }
                content_buf.push_str(content);
                let _ = tx.send(content.clone());
            }
            if let Some(reason) = choice.finish_reason.as_deref() {
                tracing::debug!(finish_reason = reason, "Stream choice finished");
            }
        }
        return Ok(());
    }

    if let Ok(envelope) = serde_json::from_str::<StreamErrorEnvelope>(payload) {
        let message = envelope
            .error
            .message
            .unwrap_or_else(|| "unknown stream error".to_string());
        anyhow::bail!(
            "provider stream error: {}",
            super::sanitize_api_error(&message)
        );
    }

    tracing::debug!("Skipping unrecognized stream payload");
    Ok(())
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    async fn stream_chat_with_history(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
        tx: mpsc::UnboundedSender<String>,
    ) -> anyhow::Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "{} API key not set. Set OPENAI_API_KEY or api_key in config.toml.",
                self.name
            )
        })?;

        let request = ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            temperature,
            stream: true,
        };

        let url = self.chat_completions_url();
        let response = self
            .apply_auth_header(self.client.post(&url).json(&request), api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error(&self.name, response).await);
        }

        let mut content = String::new();
        let mut decoder = SseDecoder::default();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk) = byte_stream.next().await {
            for payload in decoder.push(&chunk?) {
                forward_payload(&payload, &mut content, &tx)?;
            }
        }
        if let Some(payload) = decoder.finish() {
            forward_payload(&payload, &mut content, &tx)?;
        }

        Ok(content)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
