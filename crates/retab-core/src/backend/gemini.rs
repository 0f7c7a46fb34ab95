//! Gemini-style generative-language backend adapter.
//!
//! Posts the instruction to `models/<model>:streamGenerateContent?alt=sse`
//! and parses the SSE `data:` lines into text fragments. All failures are
//! converted to [`BackendError`] at this boundary; the adapter never retries
//! on its own.

use futures::StreamExt;
use serde_json::{Value, json};
use tracing::debug;

use super::trait_def::{FragmentStream, GenerationBackend};
use crate::error::BackendError;

/// Configuration for [`GeminiBackend`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Model id.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Fallback API key used when the env var is unset or empty.
    pub api_key: Option<String>,
    /// Base URL of the generative-language API.
    pub endpoint: String,
    /// Sampling temperature. Extraction wants determinism, so keep it low.
    pub temperature: f32,
    /// Connect timeout in seconds. Streams themselves have no total
    /// deadline; a slow generation is not an error.
    pub connect_timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-flash-preview".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            api_key: None,
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.1,
            connect_timeout_seconds: 10,
        }
    }
}

/// Backend adapter for the Gemini streaming API.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    cfg: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(cfg: GeminiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(cfg.connect_timeout_seconds))
            .build()
            .map_err(|e| BackendError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                timeout: false,
            })?;
        Ok(Self { cfg, client })
    }

    /// API key resolution: env var first, config fallback second. Empty
    /// values count as unset.
    fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.cfg.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.cfg
                    .api_key
                    .as_ref()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.cfg.endpoint.trim_end_matches('/'),
            self.cfg.model
        )
    }
}

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn stream_generate(&self, instruction: &str) -> FragmentStream {
        let client = self.client.clone();
        let url = self.request_url();
        let key = self.resolve_api_key();
        let key_env = self.cfg.api_key_env.clone();
        let body = build_request_body(instruction, self.cfg.temperature);

        Box::pin(async_stream::stream! {
            let Some(key) = key else {
                yield Err(BackendError::MissingCredential(format!(
                    "{key_env} is not set and no api_key is configured"
                )));
                return;
            };

            let response = client
                .post(&url)
                .header("x-goog-api-key", key)
                .json(&body)
                .send()
                .await;
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    yield Err(transport_error(&e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                yield Err(api_error(status.as_u16(), &body));
                return;
            }

            let mut lines = LineBuffer::default();
            let mut bytes = response.bytes_stream();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(transport_error(&e));
                        return;
                    }
                };
                for line in lines.push(&chunk) {
                    if let Some(text) = parse_sse_line(&line) {
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                }
            }
            // Flush a final line without a trailing newline.
            if let Some(text) = lines.finish().as_deref().and_then(parse_sse_line) {
                if !text.is_empty() {
                    yield Ok(text);
                }
            }
        })
    }
}

/// Request payload. Thinking is disabled for latency; extraction does not
/// benefit from it.
fn build_request_body(instruction: &str, temperature: f32) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": instruction }] }],
        "generationConfig": {
            "temperature": temperature,
            "thinkingConfig": { "thinkingBudget": 0 }
        }
    })
}

/// Split incoming byte chunks into complete lines, holding back the
/// unterminated remainder between chunks.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(at) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(at + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Extract the text fragment from one SSE line, if it carries one.
///
/// Non-`data:` lines (comments, blank keep-alives) and the `[DONE]` sentinel
/// return `None`. Malformed JSON is skipped rather than failing the stream.
fn parse_sse_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "skipping malformed SSE payload");
            return None;
        }
    };
    Some(extract_fragment(&value))
}

/// Concatenated text parts of the first candidate, empty when absent.
fn extract_fragment(value: &Value) -> String {
    let parts = value
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());
    let Some(parts) = parts else {
        return String::new();
    };
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect()
}

/// Build the API error for a non-success response, preferring the message
/// from the JSON error body.
fn api_error(status: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    BackendError::Api { status, message }
}

fn transport_error(err: &reqwest::Error) -> BackendError {
    BackendError::Transport {
        message: err.to_string(),
        timeout: err.is_timeout(),
    }
}
