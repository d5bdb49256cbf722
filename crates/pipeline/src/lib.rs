//! # Glimpse Pipeline
//!
//! Turns an image plus a short note into a rendered, structured answer:
//! classify and extract, solve from the extracted text, render markdown.
//! Every failure inside the structured path falls back to one plain call.
//!
//! The pipeline never reads configuration or the environment. It is handed a
//! constructed [`Provider`](glimpse_core::Provider) and a [`PipelineOptions`].

pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use encoder::{ContextFormat, EncodeError, decode, encode, encode_with_format};
pub use error::{Stage, StageError};
pub use pipeline::{DEFAULT_PROMPT, Pipeline, PipelineOptions, PipelineResult};
pub use render::render;
pub use types::{ProblemInfo, ProblemType, SolutionData};
