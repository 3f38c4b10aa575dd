//! Language-model client over a messages API.
//!
//! Speaks a minimal messages wire shape: system string plus role/content
//! turns in, text out, with optional SSE streaming of text deltas.

use anyhow::{Context, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Messages-API client.
#[derive(Clone)]
pub struct LlmClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        }
    }

    /// Buffered completion: the whole response text at once.
    pub async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            system,
            messages,
            max_tokens,
            temperature,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach the language model")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Model API error ({}): {}", status, body);
        }

        let result: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse model response")?;

        let text: String = result
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        debug!(chars = text.len(), "Model completion received");
        Ok(text)
    }

    /// Streaming completion: a stream of text deltas in arrival order.
    pub async fn stream_complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let request = MessagesRequest {
            model: &self.model,
            system,
            messages,
            max_tokens,
            temperature,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach the language model")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Model API error ({}): {}", status, body);
        }

        struct SseState {
            inner: BoxStream<'static, reqwest::Result<Vec<u8>>>,
            buffer: String,
            pending: VecDeque<String>,
            done: bool,
        }

        let state = SseState {
            inner: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(text) = st.pending.pop_front() {
                    return Some((Ok(text), st));
                }
                if st.done {
                    return None;
                }
                match st.inner.next().await {
                    Some(Ok(chunk)) => {
                        st.buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(pos) = st.buffer.find('\n') {
                            let line = st.buffer[..pos].trim_end_matches('\r').to_string();
                            st.buffer.drain(..=pos);
                            if let Some(text) = delta_from_sse_line(&line) {
                                st.pending.push_back(text);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        st.done = true;
                        return Some((Err(anyhow::Error::new(e)), st));
                    }
                    None => {
                        st.done = true;
                        let rest = std::mem::take(&mut st.buffer);
                        if let Some(text) = delta_from_sse_line(rest.trim_end()) {
                            st.pending.push_back(text);
                        }
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// Extract the text delta carried by one SSE data line, if any.
///
/// Only `content_block_delta` events carry prose; every other event kind
/// (message_start, ping, message_stop, …) is dropped.
fn delta_from_sse_line(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    if value.get("type").and_then(|t| t.as_str()) != Some("content_block_delta") {
        return None;
    }
    value
        .get("delta")
        .and_then(|d| d.get("text"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_deltas() {
        let line = r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hello"}}"#;
        assert_eq!(delta_from_sse_line(line).as_deref(), Some("Hello"));
    }

    #[test]
    fn ignores_non_delta_events() {
        for line in [
            r#"data: {"type":"message_start"}"#,
            r#"data: {"type":"ping"}"#,
            r#"data: {"type":"message_stop"}"#,
            "event: content_block_delta",
            "",
            "data: [DONE]",
            "data: not json",
        ] {
            assert!(delta_from_sse_line(line).is_none(), "{line:?}");
        }
    }

    #[test]
    fn message_constructors() {
        assert_eq!(ChatMessage::user("hi").role, "user");
        assert_eq!(ChatMessage::assistant("ok").role, "assistant");
    }
}
