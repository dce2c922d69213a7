//! Fallwatch detection service binary.
//!
//! Binds the HTTP/WebSocket API and serves until interrupted. Engine
//! thresholds come from `FALLWATCH_*` environment variables; the bind
//! address and backend URL can be overridden on the command line.

use clap::Parser;
use tracing::info;

use fallwatch_service::api::create_router;
use fallwatch_service::{AppState, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "fallwatch-service", about = "Fall-detection HTTP/WebSocket service")]
struct Args {
    /// Bind host (overrides FALLWATCH_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides FALLWATCH_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Notification backend base URL (overrides FALLWATCH_BACKEND_URL)
    #[arg(long)]
    backend_url: Option<String>,

    /// Disable outbound notifications entirely
    #[arg(long, default_value_t = false)]
    no_backend: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_env("FALLWATCH_LOG_LEVEL"))
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(backend_url) = args.backend_url {
        config.backend_url = Some(backend_url);
    }
    if args.no_backend {
        config.backend_url = None;
    }

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Startup error: {e}");
            std::process::exit(1);
        }
    };
    let app = create_router(state);

    info!(
        angle_threshold = config.engine.angle_threshold,
        velocity_threshold = config.engine.velocity_threshold,
        confidence_threshold = config.engine.confidence_threshold,
        cooldown_secs = config.engine.notification_cooldown_secs,
        "Engine configured"
    );
    match &config.backend_url {
        Some(url) => info!(backend = %url, "Notifications enabled"),
        None => info!("Notifications disabled (console only)"),
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind HTTP port");
    info!("Fall-detection service listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("Shutdown signal received");
        })
        .await
        .expect("server error");

    info!("Server shut down cleanly");
}
