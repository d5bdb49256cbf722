//! The two-stage reasoning pipeline.
//!
//! ```text
//!  Idle ──(no image)──────────────────────────────► plain call ─► Done
//!   │
//!   ▼
//!  Classifying ──► Generating ──► Formatting ──────────────────► Done
//!   │                 │
//!   └────(fault)──────┴──► Degraded ──► plain call ────────────► Done
//! ```
//!
//! Stage 1 sends the images with an extraction schema and gets back a
//! [`ProblemInfo`]. Stage 2 sends only text: the compact-encoded problem plus
//! a type-specific solution schema. The renderer turns the result into
//! markdown. Any stage fault abandons structured mode and re-issues the
//! original request as one plain call; the caller never sees an error.

use std::sync::Arc;

use glimpse_core::{ImageInput, Provider, ProviderRequest};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::encoder::{ContextFormat, encode_with_format};
use crate::error::{Stage, StageError};
use crate::prompts::{classify_prompt, extraction_schema, solution_prompt, solution_schema};
use crate::render::render;
use crate::types::{ProblemInfo, SolutionData};

/// Prompt used when the caller sends images without any text.
pub const DEFAULT_PROMPT: &str = "Analyze this image.";

/// Knobs the caller may set; usually filled from the `[pipeline]` config table.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// When false every request takes the plain path.
    pub enabled: bool,

    /// Encoding for the problem context embedded in the Stage 2 prompt.
    pub context_format: ContextFormat,

    /// User note substituted for empty text when images are present.
    pub default_prompt: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            context_format: ContextFormat::default(),
            default_prompt: DEFAULT_PROMPT.into(),
        }
    }
}

/// What a pipeline run hands back.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Presentation text, or the plain call's reply.
    pub final_text: String,

    /// Stage 1 output; only present on the structured path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_info: Option<ProblemInfo>,

    /// Stage 2 output; only present on the structured path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_data: Option<SolutionData>,

    /// True when a stage fault forced the plain fallback.
    pub degraded: bool,

    pub metadata: Map<String, Value>,
}

impl PipelineResult {
    pub fn is_structured(&self) -> bool {
        self.problem_info.is_some()
    }
}

/// Runs requests against one injected provider.
///
/// Holds no per-run state, so a single instance may serve concurrent runs.
pub struct Pipeline {
    provider: Arc<dyn Provider>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the pipeline for text plus images.
    pub async fn run(
        &self,
        text: &str,
        images: Vec<ImageInput>,
        system_prompt: Option<String>,
    ) -> PipelineResult {
        let request = ProviderRequest::new(text)
            .with_images(images)
            .with_system_prompt(system_prompt);
        self.handle(request).await
    }

    /// Run the pipeline for a full request (including an audio reference).
    pub async fn handle(&self, mut request: ProviderRequest) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "pipeline",
            %run_id,
            provider = %self.provider.name(),
            model = %self.provider.model(),
        );

        async move {
            if !self.options.enabled || request.images.is_empty() {
                debug!(
                    stage = %Stage::Idle,
                    enabled = self.options.enabled,
                    images = request.images.len(),
                    "Taking the plain path"
                );
                return self.plain(request, false).await;
            }

            if request.prompt.trim().is_empty() {
                request.prompt = self.options.default_prompt.clone();
            }

            match self.structured(&request).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(stage = %Stage::Degraded, error = %e, "Structured run failed, falling back to a plain call");
                    self.plain(request, true).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn structured(&self, request: &ProviderRequest) -> Result<PipelineResult, StageError> {
        // ── Stage 1: classify and extract ──
        debug!(
            stage = %Stage::Classifying,
            images = request.images.len(),
            "Entering stage"
        );
        let extracted = self
            .provider
            .schema_call(
                &classify_prompt(&request.prompt),
                &extraction_schema(),
                &request.images,
            )
            .await;
        let info = ProblemInfo::from_value(extracted)?;

        // ── Stage 2: generate a solution from text only ──
        debug!(
            stage = %Stage::Generating,
            problem_type = %info.problem_type,
            "Entering stage"
        );
        let (context, format) = encode_with_format(&info.to_value(), self.options.context_format);
        if format != self.options.context_format {
            debug!(requested = %self.options.context_format, used = %format, "Context encoding fell back");
        }
        let schema = solution_schema(info.problem_type);
        let prompt = solution_prompt(info.problem_type, &context, format);
        let reply = self.provider.schema_call(&prompt, &schema, &[]).await;

        if let (Some(inner), Some(solution)) = (schema.property("solution"), reply.get("solution")) {
            let missing = inner.missing_required(solution);
            if !missing.is_empty() {
                debug!(?missing, "Solution is missing required fields; renderer will fall back");
            }
        }
        let solution = SolutionData::from_value(reply)?;

        // ── Stage 3: format ──
        debug!(stage = %Stage::Formatting, "Entering stage");
        let final_text = render(&solution, &info);

        let mut metadata = Map::new();
        metadata.insert("model".into(), Value::String(self.provider.model().to_string()));
        metadata.insert(
            "problem_type".into(),
            Value::String(info.problem_type.as_str().to_string()),
        );

        info!(stage = %Stage::Done, problem_type = %info.problem_type, "Structured run complete");

        Ok(PipelineResult {
            final_text,
            problem_info: Some(info),
            solution_data: Some(solution),
            degraded: false,
            metadata,
        })
    }

    async fn plain(&self, request: ProviderRequest, degraded: bool) -> PipelineResult {
        let response = self.provider.call(request).await;
        PipelineResult {
            final_text: response.response_text,
            problem_info: None,
            solution_data: None,
            degraded,
            metadata: response.metadata,
        }
    }
}
