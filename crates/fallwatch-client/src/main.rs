//! Fallwatch edge client entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fallwatch_client::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_from_env("FALLWATCH_LOG_LEVEL"))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor(args) => {
            commands::execute_monitor(args).await?;
        }
        Commands::CameraTest(args) => {
            commands::execute_camera_test(args).await?;
        }
        Commands::Version => {
            println!("fallwatch-client {}", env!("CARGO_PKG_VERSION"));
            println!("Engine version: {}", fallwatch_core::VERSION);
        }
    }

    Ok(())
}
