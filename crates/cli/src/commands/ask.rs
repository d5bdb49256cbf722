//! `glimpse ask`: one plain request.

use std::path::PathBuf;

use glimpse_core::ProviderRequest;

use super::{CliResult, load_images, load_provider};

pub async fn run(text: String, images: Vec<PathBuf>, system: Option<String>) -> CliResult<()> {
    let (_, provider) = load_provider()?;
    let request = ProviderRequest::new(text)
        .with_images(load_images(&images)?)
        .with_system_prompt(system);

    let response = provider.call(request).await;
    if let Some(error) = response.error() {
        return Err(format!("Provider call failed: {error}").into());
    }
    println!("{}", response.response_text);
    Ok(())
}
