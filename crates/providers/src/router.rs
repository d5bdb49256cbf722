//! Provider router: selects the correct LLM provider based on config.
//!
//! Handles provider creation and hands the selected backend to callers as
//! an `Arc<dyn Provider>` for injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use glimpse_config::AppConfig;
use glimpse_core::provider::Provider;
use tracing::{debug, warn};

use crate::anthropic::{self, AnthropicProvider};
use crate::gemini::{self, GeminiProvider};
use crate::openai_compat::{self, OpenAiCompatProvider};

/// Backend names with built-in defaults, as shown by `glimpse providers`.
pub const SUPPORTED_PROVIDERS: &[(&str, &str)] = &[
    ("gemini", "Google Gemini generateContent API"),
    ("anthropic", "Anthropic Messages API (alias: claude)"),
    ("openai", "OpenAI chat completions"),
    ("openrouter", "OpenRouter (OpenAI-compatible)"),
    ("ollama", "Local Ollama server (OpenAI-compatible)"),
    ("groq", "Groq (OpenAI-compatible)"),
    ("deepseek", "DeepSeek (OpenAI-compatible)"),
    ("together", "Together AI (OpenAI-compatible)"),
    ("vllm", "vLLM server (OpenAI-compatible)"),
];

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration: every `[providers.<name>]` table
/// plus the selected default.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.provider);

    let mut names: Vec<&str> = config.providers.keys().map(String::as_str).collect();
    if !config.providers.contains_key(&config.provider) {
        names.push(&config.provider);
    }

    for name in names {
        match build_provider(name, config) {
            Some(provider) => {
                debug!(provider = %name, model = %provider.model(), "Registered provider");
                router.register(name, provider);
            }
            None => warn!(provider = %name, "Unknown provider without api_url, skipping"),
        }
    }

    router
}

/// Construct a single backend by name.
fn build_provider(name: &str, config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let table = config.providers.get(name);
    let api_url = table.and_then(|t| t.api_url.clone());
    let model = config.model_for(name);
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let api_key = config.api_key_for(name).unwrap_or_else(|| {
        if name != "ollama" {
            warn!(provider = %name, "No API key configured");
        }
        String::new()
    });

    let provider: Arc<dyn Provider> = match name {
        "gemini" => {
            let mut p = GeminiProvider::new(api_key)
                .with_defaults(config.temperature, config.max_tokens)
                .with_timeout(timeout);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            if let Some(model) = model {
                p = p.with_model(model);
            }
            Arc::new(p)
        }
        "anthropic" | "claude" => {
            // Use native Anthropic provider for direct API access
            let mut p = AnthropicProvider::new(api_key)
                .with_name(name)
                .with_defaults(config.temperature, config.max_tokens)
                .with_timeout(timeout);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            if let Some(model) = model {
                p = p.with_model(model);
            }
            Arc::new(p)
        }
        _ => {
            let base_url = api_url.or_else(|| default_base_url(name))?;
            let key = if api_key.is_empty() && name == "ollama" {
                "ollama".to_string()
            } else {
                api_key
            };
            let mut p = OpenAiCompatProvider::new(name, base_url, key)
                .with_defaults(config.temperature, config.max_tokens)
                .with_timeout(timeout);
            if let Some(model) = model {
                p = p.with_model(model);
            }
            Arc::new(p)
        }
    };

    Some(provider)
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "gemini" => gemini::DEFAULT_BASE_URL,
        "anthropic" | "claude" => anthropic::DEFAULT_BASE_URL,
        "openrouter" => openai_compat::OPENROUTER_BASE_URL,
        "openai" => openai_compat::OPENAI_BASE_URL,
        "ollama" => openai_compat::OLLAMA_BASE_URL,
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        _ => return None,
    };
    Some(url.to_string())
}
