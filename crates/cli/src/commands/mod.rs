//! Subcommand implementations and the setup they share.

pub mod ask;
pub mod config_cmd;
pub mod providers;
pub mod solve;
pub mod stream;

use std::path::PathBuf;
use std::sync::Arc;

use glimpse_config::AppConfig;
use glimpse_core::{ImageInput, Provider};

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load the config and build the selected backend.
pub(crate) fn load_provider() -> CliResult<(AppConfig, Arc<dyn Provider>)> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.provider != "ollama" {
        eprintln!();
        eprintln!("  WARNING: no API key configured for '{}'.", config.provider);
        eprintln!("  Set {}_API_KEY or GLIMPSE_API_KEY, or add it to:", config.provider.to_ascii_uppercase());
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
    }

    let router = glimpse_providers::build_from_config(&config);
    let provider = router
        .default()
        .ok_or_else(|| format!("Provider '{}' could not be built", router.default_name()))?;
    Ok((config, provider))
}

/// Read every image argument, failing on the first unreadable one.
pub(crate) fn load_images(paths: &[PathBuf]) -> CliResult<Vec<ImageInput>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let image = ImageInput::from_path(path)
            .map_err(|e| format!("Cannot load image {}: {e}", path.display()))?;
        images.push(image);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_images_reads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, [1u8, 2]).unwrap();
        std::fs::write(&b, [3u8]).unwrap();

        let images = load_images(&[a, b]).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].media_type, "image/png");
        assert_eq!(images[1].media_type, "image/jpeg");
        assert_eq!(images[1].data, vec![3]);
    }

    #[test]
    fn load_images_rejects_missing_file() {
        let err = load_images(&[PathBuf::from("/definitely/not/here.png")]).unwrap_err();
        assert!(err.to_string().contains("Cannot load image"));
    }
}
