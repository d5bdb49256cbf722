//! `glimpse config`: configuration management commands.

use glimpse_config::AppConfig;

use super::CliResult;

pub async fn show() -> CliResult<()> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init() -> CliResult<()> {
    let path = AppConfig::config_path();
    if AppConfig::write_default(&path)? {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

pub async fn path() -> CliResult<()> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
