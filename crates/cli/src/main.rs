//! Glimpse CLI, the main entry point.
//!
//! Commands:
//! - `solve`     Run the structured pipeline over one or more images
//! - `ask`       Single plain request
//! - `stream`    Plain request, printing chunks as they arrive
//! - `providers` List supported and configured backends
//! - `config`    Show or initialise the config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "glimpse",
    about = "Glimpse: structured reasoning over screenshots",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify, solve, and render the problem shown in the image(s)
    Solve {
        /// Image file (png, jpg, webp, gif); repeat for several
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        /// Note sent with the images
        #[arg(short, long)]
        prompt: Option<String>,

        /// System prompt, used on the plain path
        #[arg(short, long)]
        system: Option<String>,

        /// Audio file forwarded to the backend
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send one plain request and print the reply
    Ask {
        text: String,

        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        #[arg(short, long)]
        system: Option<String>,
    },

    /// Send one plain request and stream the reply
    Stream {
        text: String,

        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        #[arg(short, long)]
        system: Option<String>,
    },

    /// List supported LLM providers
    Providers,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Write the default config file if none exists
    Init,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the answer.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Solve {
            images,
            prompt,
            system,
            audio,
            json,
        } => {
            let args = commands::solve::SolveArgs {
                images,
                prompt,
                system,
                audio,
                json,
            };
            commands::solve::run(args).await?
        }
        Commands::Ask {
            text,
            images,
            system,
        } => commands::ask::run(text, images, system).await?,
        Commands::Stream {
            text,
            images,
            system,
        } => commands::stream::run(text, images, system).await?,
        Commands::Providers => commands::providers::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
