mod commands;
mod prompt;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "t212-export")]
#[command(about = "Export a month of Trading 212 history, reshape it for Digrin, and archive both")]
struct Cli {
    #[command(flatten)]
    export: commands::export::ExportArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env values win over the inherited environment.
    let _ = dotenvy::dotenv_override();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("t212=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    commands::export::run(&cli.export).await
}
