//! # Fallwatch Edge Client
//!
//! Camera-side companion to the Fallwatch detection service. The client
//! captures frames from the best available source, streams them to the
//! service for scoring, and shows a live status line with an optional
//! annotated snapshot on disk.
//!
//! Capture sources are probed in order at startup: a registered camera
//! backend, a frame-sequence directory, a synthetic test pattern, and
//! finally a static placeholder, so the pipeline always has frames even
//! with no hardware attached.
//!
//! # Usage
//!
//! ```bash
//! # Stream to a local service and watch for falls
//! fallwatch-client monitor --user-id alice
//!
//! # Replay a recorded frame sequence without a terminal UI
//! fallwatch-client monitor --frames-dir ./frames --headless --duration 60
//!
//! # Report which capture source wins and save one test frame
//! fallwatch-client camera-test --output probe.jpg
//!
//! # Display version information
//! fallwatch-client version
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod capture;
pub mod commands;
pub mod display;
pub mod pipeline;
pub mod queue;
pub mod summary;
pub mod transport;

pub use capture::{CaptureChain, CaptureProbe, Frame, FrameSource};
pub use pipeline::{FramePipeline, PipelineReport};
pub use queue::BoundedQueue;
pub use transport::{
    DetectionChannel, DetectionOutcome, HttpDetectionChannel, RetryPolicy, SessionState,
    TransportSession,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default detection service base URL
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8001";

/// Common result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Unified error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Capture source failure
    #[error("Capture error: {0}")]
    Capture(String),

    /// HTTP transport error
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Engine error from the core crate
    #[error("Engine error: {0}")]
    Engine(#[from] fallwatch_core::CoreError),

    /// Image decode or encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pipeline stage task panicked
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the edge client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the detection service
    pub server_url: String,
    /// Identity frames are scored under
    pub user_id: String,
    /// Width of captured frames (synthetic and placeholder sources)
    pub frame_width: u32,
    /// Height of captured frames (synthetic and placeholder sources)
    pub frame_height: u32,
    /// Target capture and display rate
    pub fps: u32,
    /// Capacity of the frame and result queues
    pub queue_capacity: usize,
    /// Quality for JPEG encoding of captured and annotated frames
    pub jpeg_quality: u8,
    /// Directory holding a recorded frame sequence, replayed in a loop
    pub frames_dir: Option<PathBuf>,
    /// Suppress the snapshot sink and the interactive command reader
    pub headless: bool,
    /// Where the latest annotated frame is written
    pub snapshot_path: PathBuf,
    /// Timeout for one frame submission (seconds)
    pub submit_timeout_secs: u64,
    /// Stop after this many seconds; `None` runs until quit
    pub duration_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            user_id: "default".to_string(),
            frame_width: 640,
            frame_height: 480,
            fps: 30,
            queue_capacity: 5,
            jpeg_quality: fallwatch_core::overlay::DEFAULT_JPEG_QUALITY,
            frames_dir: None,
            headless: false,
            snapshot_path: PathBuf::from("fallwatch-latest.jpg"),
            submit_timeout_secs: 10,
            duration_secs: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `FALLWATCH_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("FALLWATCH_SERVER_URL") {
            if !url.is_empty() {
                config.server_url = url;
            }
        }
        if let Ok(user) = std::env::var("FALLWATCH_USER_ID") {
            if !user.is_empty() {
                config.user_id = user;
            }
        }

        config
    }
}

/// Fallwatch edge client command line interface
#[derive(Parser, Debug)]
#[command(name = "fallwatch-client")]
#[command(author, version, about = "Edge capture client for the Fallwatch detection service")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream frames to the detection service and watch for falls
    Monitor(commands::MonitorArgs),

    /// Probe the capture chain, report the winning source, grab one frame
    CameraTest(commands::CameraTestArgs),

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.frame_width, 640);
        assert_eq!(config.frame_height, 480);
        assert_eq!(config.fps, 30);
        assert_eq!(config.queue_capacity, 5);
        assert!(config.frames_dir.is_none());
        assert!(!config.headless);
        assert!(config.duration_secs.is_none());
    }
}
