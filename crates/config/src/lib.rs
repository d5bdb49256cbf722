//! Configuration loading, validation, and management for Glimpse.
//!
//! Loads configuration from `~/.glimpse/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! The pipeline never reads this directly: the binary turns it into a
//! constructed provider plus pipeline options and injects those.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.glimpse/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global API key (per-provider keys take precedence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Selected backend
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model override for the selected backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default max tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout for a single backend request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Reasoning pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("providers", &self.providers)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// Per-provider overrides.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Use the multi-stage pipeline for image requests
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How problem context is re-encoded for the second stage: "toon" or "json".
    /// Parsed (and rejected if unknown) by the consumer that builds the pipeline.
    #[serde(default = "default_context_format")]
    pub context_format: String,

    /// User note sent when an image arrives without any text
    #[serde(default = "default_prompt")]
    pub default_prompt: String,
}

fn default_true() -> bool {
    true
}
fn default_context_format() -> String {
    "toon".into()
}
fn default_prompt() -> String {
    "Analyze this image.".into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_format: default_context_format(),
            default_prompt: default_prompt(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.glimpse/config.toml),
    /// then apply environment overrides:
    /// - `GLIMPSE_PROVIDER`, `GLIMPSE_MODEL`
    /// - `GEMINI_MODEL` (model for the gemini provider)
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = env("GLIMPSE_PROVIDER").filter(|p| !p.is_empty()) {
            self.provider = provider;
        }

        if let Some(model) = env("GLIMPSE_MODEL").filter(|m| !m.is_empty()) {
            self.model = Some(model);
        }

        if let Some(model) = env("GEMINI_MODEL").filter(|m| !m.is_empty()) {
            self.providers.entry("gemini".into()).or_default().model = Some(model);
        }

        if self.api_key.is_none() {
            self.api_key = env("GLIMPSE_API_KEY").filter(|k| !k.is_empty());
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".glimpse")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be > 0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        if self.provider.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the API key for a provider using the process environment.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.api_key_for_with(provider, |key| std::env::var(key).ok())
    }

    /// Resolve the API key for a provider:
    /// provider table → `<PROVIDER>_API_KEY` → global key → `GLIMPSE_API_KEY`.
    pub fn api_key_for_with(
        &self,
        provider: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        if let Some(key) = self.providers.get(provider).and_then(|p| p.api_key.clone()) {
            return Some(key);
        }

        for var in provider_env_vars(provider) {
            if let Some(key) = env(&var).filter(|k| !k.is_empty()) {
                return Some(key);
            }
        }

        self.api_key
            .clone()
            .or_else(|| env("GLIMPSE_API_KEY").filter(|k| !k.is_empty()))
    }

    /// The model to use for a provider, if one is configured.
    pub fn model_for(&self, provider: &str) -> Option<String> {
        if provider == self.provider {
            if let Some(ref model) = self.model {
                return Some(model.clone());
            }
        }
        self.providers.get(provider).and_then(|p| p.model.clone())
    }

    /// Check if an API key is available for the selected provider.
    pub fn has_api_key(&self) -> bool {
        self.api_key_for(&self.provider).is_some()
    }

    /// A copy with every API key replaced by a placeholder, for display.
    pub fn redacted(&self) -> Self {
        const MASK: &str = "[REDACTED]";
        let mut config = self.clone();
        if config.api_key.is_some() {
            config.api_key = Some(MASK.into());
        }
        for provider in config.providers.values_mut() {
            if provider.api_key.is_some() {
                provider.api_key = Some(MASK.into());
            }
        }
        config
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Write the default config to `path` unless a file already exists.
    /// Returns whether a file was written.
    pub fn write_default(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(path, Self::default_toml()).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            providers: HashMap::new(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Environment variables that may hold a provider's key.
fn provider_env_vars(provider: &str) -> Vec<String> {
    let normalized: String = provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    let mut vars = vec![format!("{normalized}_API_KEY")];
    if provider == "claude" {
        vars.push("ANTHROPIC_API_KEY".into());
    }
    vars
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "gemini");
        assert!(config.pipeline.enabled);
        assert_eq!(config.pipeline.context_format, "toon");
        assert_eq!(config.pipeline.default_prompt, "Analyze this image.");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.max_tokens, config.max_tokens);
        assert_eq!(parsed.pipeline.context_format, config.pipeline.context_format);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn context_format_is_kept_verbatim() {
        let mut config = AppConfig::default();
        config.pipeline.context_format = "JSON".into();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.context_format, "JSON");
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().provider, "gemini");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = [unclosed").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn provider_tables_parse() {
        let toml_str = r#"
provider = "anthropic"
temperature = 0.2

[providers.anthropic]
api_key = "sk-ant-file"
model = "claude-3-5-sonnet-20241022"

[providers.ollama]
api_url = "http://localhost:11434/v1"

[pipeline]
enabled = false
context_format = "json"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider, "anthropic");
        assert!(!config.pipeline.enabled);
        assert_eq!(config.pipeline.context_format, "json");
        assert_eq!(config.pipeline.default_prompt, "Analyze this image.");
        assert_eq!(
            config.providers["ollama"].api_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
        assert_eq!(
            config.model_for("anthropic").as_deref(),
            Some("claude-3-5-sonnet-20241022")
        );
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env_of(&[
            ("GLIMPSE_PROVIDER", "openai"),
            ("GLIMPSE_MODEL", "gpt-4o"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
        ]));
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model_for("openai").as_deref(), Some("gpt-4o"));
        assert_eq!(config.model_for("gemini").as_deref(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn api_key_resolution_order() {
        let mut config = AppConfig::default();
        let env = env_of(&[("GEMINI_API_KEY", "from-env"), ("GLIMPSE_API_KEY", "generic")]);

        assert_eq!(config.api_key_for_with("gemini", &env).as_deref(), Some("from-env"));
        assert_eq!(config.api_key_for_with("openai", &env).as_deref(), Some("generic"));

        config.api_key = Some("global".into());
        assert_eq!(config.api_key_for_with("openai", &env).as_deref(), Some("global"));

        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: Some("from-file".into()),
                ..ProviderConfig::default()
            },
        );
        assert_eq!(config.api_key_for_with("gemini", &env).as_deref(), Some("from-file"));
    }

    #[test]
    fn claude_alias_reads_anthropic_key() {
        let config = AppConfig::default();
        let env = env_of(&[("ANTHROPIC_API_KEY", "sk-ant")]);
        assert_eq!(config.api_key_for_with("claude", &env).as_deref(), Some("sk-ant"));
    }

    #[test]
    fn debug_redacts_keys() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                ..ProviderConfig::default()
            },
        );
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("sk-other"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn write_default_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(AppConfig::write_default(&path).unwrap());
        assert!(!AppConfig::write_default(&path).unwrap());
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.provider, "gemini");
    }

    #[test]
    fn redacted_masks_every_key() {
        let mut config = AppConfig {
            api_key: Some("sk-global".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-openai".into()),
                ..ProviderConfig::default()
            },
        );
        config.providers.insert("ollama".into(), ProviderConfig::default());

        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-global"));
        assert!(!shown.contains("sk-openai"));
        assert!(shown.contains("[REDACTED]"));
        assert!(config.redacted().providers["ollama"].api_key.is_none());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("Analyze this image."));
    }
}
