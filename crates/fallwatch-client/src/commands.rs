//! Command execution for the edge client CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fallwatch_core::PersonId;

use crate::capture::CaptureChain;
use crate::pipeline::FramePipeline;
use crate::transport::{HttpDetectionChannel, RetryPolicy, TransportSession};
use crate::{summary, ClientConfig};

/// Arguments for the `monitor` command. Unset options fall back to
/// `FALLWATCH_*` environment variables, then to defaults.
#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Detection service base URL
    #[arg(long)]
    pub server: Option<String>,

    /// Identity frames are scored under
    #[arg(long)]
    pub user_id: Option<String>,

    /// Replay a recorded frame directory instead of probing a camera
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    /// Target capture rate in frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Capture width for generated frames
    #[arg(long)]
    pub width: Option<u32>,

    /// Capture height for generated frames
    #[arg(long)]
    pub height: Option<u32>,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Where the latest annotated frame is written
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Disable the snapshot sink and the interactive command reader
    #[arg(long)]
    pub headless: bool,
}

impl MonitorArgs {
    fn into_config(self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(server) = self.server {
            config.server_url = server;
        }
        if let Some(user_id) = self.user_id {
            config.user_id = user_id;
        }
        if let Some(dir) = self.frames_dir {
            config.frames_dir = Some(dir);
        }
        if let Some(fps) = self.fps {
            config.fps = fps.clamp(1, 60);
        }
        if let Some(width) = self.width {
            config.frame_width = width;
        }
        if let Some(height) = self.height {
            config.frame_height = height;
        }
        if let Some(duration) = self.duration {
            config.duration_secs = Some(duration);
        }
        if let Some(snapshot) = self.snapshot {
            config.snapshot_path = snapshot;
        }
        config.headless = self.headless;
        config
    }
}

/// Arguments for the `camera-test` command.
#[derive(Args, Debug)]
pub struct CameraTestArgs {
    /// Directory to probe for recorded frames
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    /// Width for generated frames
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Height for generated frames
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Save the grabbed test frame here
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Run the monitor pipeline until quit, Ctrl-C, or the duration elapses.
pub async fn execute_monitor(args: MonitorArgs) -> Result<()> {
    let config = args.into_config();

    println!(
        "{} Fallwatch edge monitor v{}",
        "[FALLWATCH]".bright_cyan().bold(),
        crate::VERSION
    );
    println!("  Service:  {}", config.server_url);
    println!("  Identity: {}", config.user_id);
    println!(
        "  Capture:  {}x{} @ {} fps",
        config.frame_width, config.frame_height, config.fps
    );
    if !config.headless {
        println!("  Commands: [t]oggle detection, [r]eset detector, [q]uit");
    }

    let chain = CaptureChain::from_config(&config);
    let channel = HttpDetectionChannel::new(
        &config.server_url,
        Duration::from_secs(config.submit_timeout_secs),
    )
    .context("Failed to build the HTTP detection channel")?;
    let session = TransportSession::new(
        Box::new(channel),
        PersonId::from(config.user_id.as_str()),
        RetryPolicy::default(),
    );

    let report = FramePipeline::new(config)
        .run(chain, session)
        .await
        .context("Pipeline failed")?;

    summary::print(&report);
    Ok(())
}

/// Probe the capture chain, report availability, grab one frame, exit.
pub async fn execute_camera_test(args: CameraTestArgs) -> Result<()> {
    let config = ClientConfig {
        frames_dir: args.frames_dir,
        frame_width: args.width,
        frame_height: args.height,
        ..ClientConfig::from_env()
    };

    println!(
        "{} Probing capture sources",
        "[FALLWATCH]".bright_cyan().bold()
    );
    let mut chain = CaptureChain::from_config(&config);
    for report in chain.diagnose() {
        let tag = if report.available {
            "available".green()
        } else {
            "unavailable".dimmed()
        };
        println!("  {:<18} {}", report.name, tag);
    }

    let frame = chain.next_frame();
    let source = chain.active_source().unwrap_or("unknown");
    println!(
        "{} Selected source: {}",
        "[FALLWATCH]".bright_cyan().bold(),
        source.bold()
    );
    println!(
        "  {}x{} JPEG, {} bytes",
        frame.width,
        frame.height,
        frame.jpeg.len()
    );

    if let Some(path) = args.output {
        std::fs::write(&path, &frame.jpeg)
            .with_context(|| format!("Failed to write test frame to {}", path.display()))?;
        println!("  Saved test frame to {}", path.display());
    }

    Ok(())
}
