//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Images as base64 `image` content blocks ahead of the text
//! - Streaming via SSE with `content_block_delta` events

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use glimpse_core::error::ProviderError;
use glimpse_core::media::audio_note;
use glimpse_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::http::{self, LineBuffer};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            client: http::build_client(Duration::from_secs(http::DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Defaults used when a request does not carry its own.
    pub fn with_defaults(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http::build_client(timeout);
        self
    }

    /// Build the single user turn: images first, then the text.
    fn to_api_message(request: &ProviderRequest) -> AnthropicMessage {
        let mut text = request.prompt.clone();
        if let Some(ref audio) = request.audio {
            text.push_str(&audio_note(audio));
        }

        if request.images.is_empty() {
            return AnthropicMessage {
                role: "user".into(),
                content: AnthropicContent::Text(text),
            };
        }

        let mut blocks: Vec<ContentBlock> = request
            .images
            .iter()
            .map(|img| ContentBlock::Image {
                source: ImageSource {
                    kind: "base64".into(),
                    media_type: img.media_type.clone(),
                    data: img.to_base64(),
                },
            })
            .collect();
        blocks.push(ContentBlock::Text { text });

        AnthropicMessage {
            role: "user".into(),
            content: AnthropicContent::Blocks(blocks),
        }
    }

    fn request_body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [Self::to_api_message(request)],
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "temperature": request.temperature.unwrap_or(self.temperature),
        });

        if let Some(ref sys) = request.system_prompt {
            body["system"] = serde_json::json!(sys);
        }

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        body
    }

    async fn send(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        http::require_key(&self.name, &self.api_key)?;
        let url = format!("{}/v1/messages", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(http::send_error)?;
        http::check_status(&self.name, response).await
    }

    /// Convert Anthropic API response to our ProviderResponse.
    fn response_to_provider_response(
        resp: AnthropicResponse,
    ) -> Result<ProviderResponse, ProviderError> {
        let text = resp
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("id".into(), serde_json::Value::String(resp.id));

        Ok(ProviderResponse {
            text,
            model: resp.model,
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
            finish_reason: resp.stop_reason,
            metadata,
        })
    }
}

/// What a single SSE `data:` payload means for the consumer.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Text(String),
    Usage(Usage),
    Stop,
    Failed(String),
}

fn parse_stream_event(event: &serde_json::Value) -> Option<StreamEvent> {
    match event["type"].as_str().unwrap_or("") {
        "content_block_delta" => {
            let delta = &event["delta"];
            if delta["type"].as_str() == Some("text_delta") {
                delta["text"]
                    .as_str()
                    .map(|t| StreamEvent::Text(t.to_string()))
            } else {
                None
            }
        }
        "message_delta" => {
            let usage = event.get("usage")?;
            let out = usage["output_tokens"].as_u64()?;
            let inp = usage
                .get("input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            Some(StreamEvent::Usage(Usage {
                prompt_tokens: inp as u32,
                completion_tokens: out as u32,
                total_tokens: (inp + out) as u32,
            }))
        }
        "message_stop" => Some(StreamEvent::Stop),
        "error" => Some(StreamEvent::Failed(
            event["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error")
                .to_string(),
        )),
        _ => None,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = self.request_body(&request, false);

        debug!(provider = %self.name, model = %self.model, images = request.images.len(), "Sending completion request");

        let response = self.send(&body, false).await?;

        let api_resp: AnthropicResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse Anthropic response: {e}"),
                })?;

        Self::response_to_provider_response(api_resp)
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = self.request_body(&request, true);

        debug!(provider = %self.name, model = %self.model, "Sending streaming request");

        let response = self.send(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut usage = None;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                lines.push(&bytes);

                while let Some(line) = lines.next_line() {
                    // Event names are repeated in the payload's `type` field.
                    let Some(data) = http::sse_data(&line) else {
                        continue;
                    };

                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                            continue;
                        }
                    };

                    match parse_stream_event(&event) {
                        Some(StreamEvent::Text(text)) => {
                            if tx.send(Ok(StreamChunk::text(text))).await.is_err() {
                                return;
                            }
                        }
                        Some(StreamEvent::Usage(u)) => usage = Some(u),
                        Some(StreamEvent::Stop) => {
                            let _ = tx.send(Ok(StreamChunk::done(usage))).await;
                            return;
                        }
                        Some(StreamEvent::Failed(message)) => {
                            let _ = tx
                                .send(Err(ProviderError::StreamInterrupted(message)))
                                .await;
                            return;
                        }
                        None => {}
                    }
                }
            }

            // Stream ended without message_stop
            let _ = tx.send(Ok(StreamChunk::done(usage))).await;
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        // Try a minimal request to verify API key
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 1,
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        // 200 = works, 401 = bad key, anything else = reachable but error
        Ok(response.status().is_success() || response.status().as_u16() != 401)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
