//! `glimpse stream`: one plain request, printed as it arrives.

use std::io::Write;
use std::path::PathBuf;

use futures::StreamExt;
use glimpse_core::ProviderRequest;

use super::{CliResult, load_images, load_provider};

pub async fn run(text: String, images: Vec<PathBuf>, system: Option<String>) -> CliResult<()> {
    let (_, provider) = load_provider()?;
    let request = ProviderRequest::new(text)
        .with_images(load_images(&images)?)
        .with_system_prompt(system);

    let mut chunks = provider.stream_call(request).await;
    let mut stdout = std::io::stdout();
    while let Some(chunk) = chunks.next().await {
        write!(stdout, "{chunk}")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
