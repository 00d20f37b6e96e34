//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dino_cli::settings::load_settings;
use dino_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::Say(args) => handlers::handle_say(settings, &args).await,
        Commands::Voices => handlers::handle_voices(&settings).await,
    }
}
