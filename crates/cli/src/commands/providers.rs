//! `glimpse providers`: list supported and configured backends.

use glimpse_config::AppConfig;
use glimpse_providers::{SUPPORTED_PROVIDERS, build_from_config};

use super::CliResult;

pub async fn run() -> CliResult<()> {
    println!("Supported LLM providers");
    println!("=======================");
    println!();
    for (name, description) in SUPPORTED_PROVIDERS {
        println!("  {name:<12} {description}");
    }
    println!();
    println!("  Any other name with an api_url is treated as OpenAI-compatible:");
    println!("    [providers.my-endpoint]");
    println!("    api_url = \"https://your-endpoint.example/v1\"");
    println!();

    match AppConfig::load() {
        Ok(config) => {
            let router = build_from_config(&config);
            println!("Configured (selected: {})", config.provider);
            for name in router.list() {
                let key = if config.api_key_for(name).is_some() {
                    "key set"
                } else {
                    "no key"
                };
                let model = router
                    .get(name)
                    .map(|p| p.model().to_string())
                    .unwrap_or_default();
                let marker = if name == router.default_name() { "*" } else { " " };
                println!("  {marker} {name:<12} {model:<32} {key}");
            }
        }
        Err(e) => println!("Config could not be loaded: {e}"),
    }

    println!();
    println!("Environment variables:");
    println!("  GLIMPSE_PROVIDER, GLIMPSE_MODEL, GLIMPSE_API_KEY, GEMINI_MODEL");
    println!("  <PROVIDER>_API_KEY (e.g. GEMINI_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY)");

    Ok(())
}
