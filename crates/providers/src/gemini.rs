//! Google Gemini provider implementation.
//!
//! Talks to the Generative Language REST API:
//! - `models/{model}:generateContent` for single responses
//! - `models/{model}:streamGenerateContent?alt=sse` for streaming
//!
//! Request parts are ordered text, images, audio. Gemini accepts audio
//! natively, so the file is sent as inline data rather than a note.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt;
use glimpse_core::error::ProviderError;
use glimpse_core::media::read_audio;
use glimpse_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::http::{self, LineBuffer};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            client: http::build_client(Duration::from_secs(http::DEFAULT_TIMEOUT_SECS)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
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

    fn endpoint(&self, stream: bool) -> String {
        if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, self.model)
        }
    }

    /// Build the request body. Fails only if the audio file cannot be read.
    fn request_body(&self, request: &ProviderRequest) -> Result<GenerateRequest, ProviderError> {
        let mut parts = Vec::with_capacity(request.images.len() + 2);

        if !request.prompt.is_empty() {
            parts.push(Part::Text {
                text: request.prompt.clone(),
            });
        }

        for img in &request.images {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: img.media_type.clone(),
                    data: img.to_base64(),
                },
            });
        }

        if let Some(ref path) = request.audio {
            let (mime_type, bytes) = read_audio(path)?;
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: STANDARD.encode(bytes),
                },
            });
        }

        if parts.is_empty() {
            return Err(ProviderError::InvalidInput("Request has no content".into()));
        }

        Ok(GenerateRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts,
            }],
            system_instruction: request.system_prompt.as_ref().map(|sys| Content {
                role: None,
                parts: vec![Part::Text { text: sys.clone() }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.temperature),
                max_output_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            },
        })
    }

    async fn send(&self, body: &GenerateRequest, stream: bool) -> Result<reqwest::Response, ProviderError> {
        http::require_key(&self.name, &self.api_key)?;
        let response = self
            .client
            .post(self.endpoint(stream))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(http::send_error)?;
        http::check_status(&self.name, response).await
    }

    fn response_to_provider_response(
        &self,
        resp: GenerateResponse,
    ) -> Result<ProviderResponse, ProviderError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let text = candidate.text();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(ProviderResponse {
            text,
            model: resp.model_version.unwrap_or_else(|| self.model.clone()),
            usage: resp.usage_metadata.map(UsageMetadata::into_usage),
            finish_reason: candidate.finish_reason,
            metadata: serde_json::Map::new(),
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = self.request_body(&request)?;

        debug!(provider = %self.name, model = %self.model, images = request.images.len(), audio = request.audio.is_some(), "Sending completion request");

        let response = self.send(&body, false).await?;

        let api_resp: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        self.response_to_provider_response(api_resp)
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = self.request_body(&request)?;

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
                    let Some(data) = http::sse_data(&line) else {
                        continue;
                    };

                    let chunk: GenerateResponse = match serde_json::from_str(data) {
                        Ok(c) => c,
                        Err(e) => {
                            trace!(error = %e, data = %data, "Ignoring unparseable Gemini SSE");
                            continue;
                        }
                    };

                    if let Some(u) = chunk.usage_metadata {
                        usage = Some(u.into_usage());
                    }

                    let text = chunk
                        .candidates
                        .first()
                        .map(Candidate::text)
                        .unwrap_or_default();
                    if !text.is_empty() && tx.send(Ok(StreamChunk::text(text))).await.is_err() {
                        return;
                    }
                }
            }

            // Gemini has no terminal marker; the body simply ends.
            let _ = tx.send(Ok(StreamChunk::done(usage))).await;
        });

        Ok(rx)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl UsageMetadata {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_token_count,
            completion_tokens: self.candidates_token_count,
            total_tokens: self.total_token_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_core::ImageInput;
    use std::io::Write;
    use std::path::PathBuf;

    #[tokio::test]
    async fn missing_key_fails_before_sending() {
        let provider = GeminiProvider::new("");
        let err = provider
            .complete(ProviderRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let reply = provider.call(ProviderRequest::new("hello")).await;
        assert_eq!(
            reply.response_text,
            "Error: Provider not configured: no API key for gemini"
        );
    }

    #[test]
    fn constructor_defaults() {
        let p = GeminiProvider::new("key");
        assert_eq!(p.name(), "gemini");
        assert_eq!(p.model(), DEFAULT_MODEL);
        assert_eq!(
            p.endpoint(false),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
        assert!(p.endpoint(true).ends_with(":streamGenerateContent?alt=sse"));
    }

    #[test]
    fn parts_are_text_then_images() {
        let p = GeminiProvider::new("key").with_defaults(0.2, 512);
        let request = ProviderRequest::new("Solve")
            .with_images(vec![ImageInput::png(b"abc".to_vec())])
            .with_system_prompt(Some("Be exact".into()));
        let body = serde_json::to_value(p.request_body(&request).unwrap()).unwrap();

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "Solve");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "YWJj");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be exact");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn audio_is_inlined() {
        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(b"ID3").unwrap();
        let request = ProviderRequest::new("Transcribe").with_audio(Some(file.path().to_path_buf()));
        let body = serde_json::to_value(GeminiProvider::new("k").request_body(&request).unwrap()).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[1]["inlineData"]["mimeType"], "audio/mp3");
        assert_eq!(parts[1]["inlineData"]["data"], "SUQz");
    }

    #[test]
    fn unreadable_audio_is_invalid_input() {
        let request = ProviderRequest::new("x").with_audio(Some(PathBuf::from("/nonexistent/a.wav")));
        assert!(matches!(
            GeminiProvider::new("k").request_body(&request),
            Err(ProviderError::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_generate_response() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "world"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6},
                "modelVersion": "gemini-2.5-flash-lite-001"
            }"#,
        )
        .unwrap();
        let pr = GeminiProvider::new("k").response_to_provider_response(resp).unwrap();
        assert_eq!(pr.text, "Hello world");
        assert_eq!(pr.model, "gemini-2.5-flash-lite-001");
        assert_eq!(pr.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(pr.usage.unwrap().total_tokens, 6);
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let resp: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(matches!(
            GeminiProvider::new("k").response_to_provider_response(resp),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn non_text_parts_are_ignored() {
        let c: Candidate = serde_json::from_str(
            r#"{"content": {"parts": [{"functionCall": {"name": "f"}}, {"text": "ok"}]}}"#,
        )
        .unwrap();
        assert_eq!(c.text(), "ok");
    }
}
