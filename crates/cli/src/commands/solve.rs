//! `glimpse solve`: run the structured pipeline over images.

use std::path::PathBuf;

use glimpse_config::AppConfig;
use glimpse_core::ProviderRequest;
use glimpse_pipeline::{ContextFormat, Pipeline, PipelineOptions};
use tracing::{info, warn};

use super::{CliResult, load_images, load_provider};

pub struct SolveArgs {
    pub images: Vec<PathBuf>,
    pub prompt: Option<String>,
    pub system: Option<String>,
    pub audio: Option<PathBuf>,
    pub json: bool,
}

/// Translate the `[pipeline]` table into pipeline options.
pub(crate) fn pipeline_options(config: &AppConfig) -> Result<PipelineOptions, String> {
    let context_format = config
        .pipeline
        .context_format
        .parse::<ContextFormat>()
        .map_err(|e| format!("Invalid [pipeline] context_format: {e}"))?;
    Ok(PipelineOptions {
        enabled: config.pipeline.enabled,
        context_format,
        default_prompt: config.pipeline.default_prompt.clone(),
    })
}

pub async fn run(args: SolveArgs) -> CliResult<()> {
    let (config, provider) = load_provider()?;
    let options = pipeline_options(&config)?;
    let images = load_images(&args.images)?;

    info!(
        provider = %provider.name(),
        model = %provider.model(),
        images = images.len(),
        "Solving"
    );

    let pipeline = Pipeline::new(provider).with_options(options);
    let request = ProviderRequest::new(args.prompt.unwrap_or_default())
        .with_images(images)
        .with_system_prompt(args.system)
        .with_audio(args.audio);

    let result = pipeline.handle(request).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.final_text);
    }

    if result.degraded {
        warn!("Structured reasoning failed; showing a plain answer");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let mut config = AppConfig::default();
        config.pipeline.enabled = false;
        config.pipeline.context_format = "JSON".into();
        config.pipeline.default_prompt = "Solve it.".into();

        let options = pipeline_options(&config).unwrap();
        assert!(!options.enabled);
        assert_eq!(options.context_format, ContextFormat::Json);
        assert_eq!(options.default_prompt, "Solve it.");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.context_format = "yaml".into();
        let err = pipeline_options(&config).unwrap_err();
        assert_eq!(
            err,
            "Invalid [pipeline] context_format: unknown context format: yaml"
        );
    }

    #[test]
    fn default_config_uses_toon() {
        let options = pipeline_options(&AppConfig::default()).unwrap();
        assert_eq!(options.context_format, ContextFormat::Toon);
    }
}
