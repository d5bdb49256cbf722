//! Provider trait, the capability every model backend satisfies.
//!
//! Backends implement two fallible primitives, `complete()` and `stream()`.
//! On top of those the trait provides the capability surface the pipeline
//! consumes, and none of it returns an error:
//!
//! - `call()` folds backend failures into an error-marked response
//! - `stream_call()` yields text chunks and reports a mid-stream failure
//!   as a final in-band chunk
//! - `schema_call()` appends a schema instruction, calls, and runs the
//!   structured output parser over the reply
//!
//! Implementations: Gemini, Anthropic, OpenAI-compatible endpoints.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::media::ImageInput;
use crate::schema::Schema;
use crate::structured::extract_json;

/// Prefix of `CallResponse::response_text` when the backend failed.
pub const ERROR_MARKER: &str = "Error: ";

/// A single request to a backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The user text.
    pub prompt: String,

    /// Ordered images, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageInput>,

    /// Optional path to an audio file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,

    /// Optional system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Sampling temperature; the backend's configured default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Output token cap; the backend's configured default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ProviderRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_images(mut self, images: Vec<ImageInput>) -> Self {
        self.images = images;
        self
    }

    pub fn with_audio(mut self, audio: Option<PathBuf>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|s| !s.is_empty());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A complete (non-streaming) response from a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text.
    pub text: String,

    /// Which model actually responded.
    pub model: String,

    /// Token usage statistics.
    pub usage: Option<Usage>,

    /// Why generation stopped, as reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Provider-specific metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
            usage: None,
        }
    }

    pub fn done(usage: Option<Usage>) -> Self {
        Self {
            content: None,
            done: true,
            usage,
        }
    }
}

/// Receiving half of a backend stream.
pub type ChunkReceiver = tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// Finite, single-pass sequence of text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Result of `Provider::call`: always text plus metadata, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    pub response_text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CallResponse {
    /// An error-marked response carrying the failure in its metadata.
    pub fn from_error(error: &ProviderError) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error".into(), Value::String(error.to_string()));
        Self {
            response_text: format!("{ERROR_MARKER}{error}"),
            metadata,
        }
    }

    /// Whether the backend reported a failure.
    pub fn is_error(&self) -> bool {
        self.metadata.contains_key("error")
    }

    pub fn error(&self) -> Option<&str> {
        self.metadata.get("error").and_then(Value::as_str)
    }
}

impl From<ProviderResponse> for CallResponse {
    fn from(resp: ProviderResponse) -> Self {
        let mut metadata = resp.metadata;
        metadata.insert("model".into(), Value::String(resp.model));
        if let Some(reason) = resp.finish_reason {
            metadata.insert("finish_reason".into(), Value::String(reason));
        }
        if let Some(usage) = resp.usage {
            metadata.insert(
                "usage".into(),
                serde_json::to_value(usage).unwrap_or(Value::Null),
            );
        }
        Self {
            response_text: resp.text,
            metadata,
        }
    }
}

/// The in-band annotation that terminates a failed stream.
pub fn stream_error_annotation(error: &ProviderError) -> String {
    format!("\n\n{ERROR_MARKER}{error}")
}

/// Adapt a backend chunk receiver into a text stream.
///
/// Empty deltas are skipped; a `done` chunk or a closed channel ends the
/// stream; an error becomes the last element.
pub fn text_stream(rx: ChunkReceiver) -> TextStream {
    Box::pin(futures::stream::unfold(Some(rx), |state| async move {
        let mut rx = state?;
        loop {
            match rx.recv().await {
                Some(Ok(chunk)) => {
                    let next = if chunk.done { None } else { Some(rx) };
                    match chunk.content.filter(|c| !c.is_empty()) {
                        Some(text) => return Some((text, next)),
                        None if chunk.done => return None,
                        None => rx = next?,
                    }
                }
                Some(Err(e)) => return Some((stream_error_annotation(&e), None)),
                None => return None,
            }
        }
    }))
}

/// The core Provider trait.
///
/// Every backend (Gemini, Anthropic, OpenAI-compatible) implements
/// `complete()`; the pipeline only touches the provided, infallible
/// capability methods.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "anthropic").
    fn name(&self) -> &str;

    /// The model id requests are sent to.
    fn model(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a single chunk.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::text(response.text))).await;
        let _ = tx.send(Ok(StreamChunk::done(response.usage))).await;
        Ok(rx)
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Single request/response. Backend failures come back as a response
    /// whose text starts with [`ERROR_MARKER`] and whose metadata has `error`.
    async fn call(&self, request: ProviderRequest) -> CallResponse {
        debug!(
            provider = %self.name(),
            model = %self.model(),
            images = request.images.len(),
            "Calling provider"
        );
        match self.complete(request).await {
            Ok(response) => response.into(),
            Err(e) => {
                warn!(provider = %self.name(), error = %e, "Provider call failed");
                CallResponse::from_error(&e)
            }
        }
    }

    /// Streaming request. Never ends abnormally: failures are reported as
    /// the final chunk.
    async fn stream_call(&self, request: ProviderRequest) -> TextStream {
        match self.stream(request).await {
            Ok(rx) => text_stream(rx),
            Err(e) => {
                warn!(provider = %self.name(), error = %e, "Provider stream failed to start");
                Box::pin(futures::stream::once(async move {
                    stream_error_annotation(&e)
                }))
            }
        }
    }

    /// Schema-guided request: appends the schema instruction, calls, and
    /// returns whatever the structured output parser makes of the reply
    /// (possibly the `{"raw": ...}` sentinel).
    async fn schema_call(&self, text: &str, schema: &Schema, images: &[ImageInput]) -> Value {
        let request =
            ProviderRequest::new(format!("{text}{}", schema.instruction())).with_images(images.to_vec());
        let response = self.call(request).await;
        extract_json(&response.response_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;

    /// Echoes the prompt back, or fails when told to.
    struct EchoProvider {
        fail: Option<ProviderError>,
        reply: Option<String>,
        last_prompt: Mutex<Option<String>>,
    }

    impl EchoProvider {
        fn ok() -> Self {
            Self {
                fail: None,
                reply: None,
                last_prompt: Mutex::new(None),
            }
        }

        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.into()),
                ..Self::ok()
            }
        }

        fn failing(error: ProviderError) -> Self {
            Self {
                fail: Some(error),
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.last_prompt.lock().unwrap() = Some(request.prompt.clone());
            if let Some(ref e) = self.fail {
                return Err(e.clone());
            }
            Ok(ProviderResponse {
                text: self.reply.clone().unwrap_or(request.prompt),
                model: "echo-1".into(),
                usage: Some(Usage {
                    prompt_tokens: 3,
                    completion_tokens: 2,
                    total_tokens: 5,
                }),
                finish_reason: Some("stop".into()),
                metadata: Map::new(),
            })
        }
    }

    #[test]
    fn request_builder() {
        let req = ProviderRequest::new("hi")
            .with_images(vec![ImageInput::png(vec![1])])
            .with_system_prompt(Some(String::new()))
            .with_temperature(0.2)
            .with_max_tokens(10);
        assert_eq!(req.images.len(), 1);
        assert!(req.system_prompt.is_none());
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(10));
    }

    #[tokio::test]
    async fn call_success_carries_metadata() {
        let provider = EchoProvider::ok();
        let resp = provider.call(ProviderRequest::new("hello")).await;
        assert_eq!(resp.response_text, "hello");
        assert!(!resp.is_error());
        assert_eq!(resp.metadata["model"], "echo-1");
        assert_eq!(resp.metadata["finish_reason"], "stop");
        assert_eq!(resp.metadata["usage"]["total_tokens"], 5);
    }

    #[tokio::test]
    async fn call_failure_is_in_band() {
        let provider = EchoProvider::failing(ProviderError::Network("connection refused".into()));
        let resp = provider.call(ProviderRequest::new("hello")).await;
        assert!(resp.response_text.starts_with(ERROR_MARKER));
        assert!(resp.is_error());
        assert!(resp.error().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let provider = EchoProvider::ok();
        let chunks: Vec<String> = provider
            .stream_call(ProviderRequest::new("streamed"))
            .await
            .collect()
            .await;
        assert_eq!(chunks, vec!["streamed".to_string()]);
    }

    #[tokio::test]
    async fn stream_start_failure_is_single_annotation() {
        let provider = EchoProvider::failing(ProviderError::Timeout("30s".into()));
        let chunks: Vec<String> = provider
            .stream_call(ProviderRequest::new("x"))
            .await
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("\n\nError: "));
    }

    #[tokio::test]
    async fn mid_stream_failure_is_final_chunk() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(Ok(StreamChunk::text("Hel"))).await.unwrap();
        tx.send(Ok(StreamChunk::text(""))).await.unwrap();
        tx.send(Ok(StreamChunk::text("lo"))).await.unwrap();
        tx.send(Err(ProviderError::StreamInterrupted("reset".into())))
            .await
            .unwrap();
        tx.send(Ok(StreamChunk::text("never seen"))).await.unwrap();
        drop(tx);

        let chunks: Vec<String> = text_stream(rx).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "Hel");
        assert_eq!(chunks[1], "lo");
        assert!(chunks[2].contains("reset"));
    }

    #[tokio::test]
    async fn done_chunk_ends_stream() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(Ok(StreamChunk::text("a"))).await.unwrap();
        tx.send(Ok(StreamChunk::done(None))).await.unwrap();
        tx.send(Ok(StreamChunk::text("b"))).await.unwrap();
        let chunks: Vec<String> = text_stream(rx).collect().await;
        assert_eq!(chunks, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn schema_call_appends_instruction_and_parses() {
        let provider = EchoProvider::replying("```json\n{\"answer\": \"4\"}\n```");
        let schema = Schema::object([("answer", Schema::string())], &["answer"]);
        let value = provider.schema_call("What is 2+2?", &schema, &[]).await;
        assert_eq!(value, json!({"answer": "4"}));

        let prompt = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.starts_with("What is 2+2?"));
        assert!(prompt.contains("Respond ONLY with valid JSON"));
    }

    #[tokio::test]
    async fn schema_call_failure_yields_sentinel() {
        let provider = EchoProvider::failing(ProviderError::EmptyResponse);
        let value = provider.schema_call("x", &Schema::open_object(), &[]).await;
        let raw = crate::structured::raw_text(&value).unwrap();
        assert!(raw.starts_with(ERROR_MARKER));
    }
}
