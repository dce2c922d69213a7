//! Terminal status line and annotated snapshot sink.
//!
//! The display stage owns a spinner on stderr with a one-line session
//! status, prints alert onsets above it, and (outside headless mode)
//! keeps the latest annotated frame on disk for external viewers.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::warn;

use fallwatch_core::overlay;
use fallwatch_core::{FallResult, Timestamp};

use crate::pipeline::{PipelineStats, ProcessedFrame};
use crate::transport::SessionState;
use crate::ClientConfig;

/// Minimum pause between snapshot writes.
const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(500);

/// Renders the live session status.
pub struct DisplayStage {
    status: ProgressBar,
    user_id: String,
    snapshot: Option<SnapshotSink>,
    last_snapshot: Option<Instant>,
    last_state: Option<SessionState>,
    recent: VecDeque<Instant>,
}

impl DisplayStage {
    pub fn new(config: &ClientConfig) -> Self {
        let status = ProgressBar::new_spinner();
        status.set_draw_target(ProgressDrawTarget::stderr());
        status.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        status.set_style(style);
        status.set_message("waiting for frames".to_string());

        let snapshot = (!config.headless).then(|| SnapshotSink {
            path: config.snapshot_path.clone(),
            quality: config.jpeg_quality,
        });

        Self {
            status,
            user_id: config.user_id.clone(),
            snapshot,
            last_snapshot: None,
            last_state: None,
            recent: VecDeque::new(),
        }
    }

    /// Updates the status line for the freshest frame and writes the
    /// throttled snapshot. Snapshot failures are logged, never fatal.
    pub fn render(&mut self, item: &ProcessedFrame, stats: &PipelineStats) {
        let now = Instant::now();
        self.recent.push_back(now);
        while self
            .recent
            .front()
            .map(|at| now.duration_since(*at) > Duration::from_secs(1))
            .unwrap_or(false)
        {
            self.recent.pop_front();
        }

        if item.state == SessionState::Alerting && self.last_state != Some(SessionState::Alerting)
        {
            let confidence = item
                .outcome
                .as_ref()
                .map(|outcome| outcome.confidence)
                .unwrap_or(0.0);
            let line = format!(
                "{} Fall detected for {} (confidence {:.2})",
                "[ALERT]".red().bold(),
                self.user_id,
                confidence
            );
            self.status.suspend(|| println!("{line}"));
        }
        self.last_state = Some(item.state);

        let state_tag = match item.state {
            SessionState::Idle => item.state.label().dimmed(),
            SessionState::Monitoring => item.state.label().green(),
            SessionState::Alerting => item.state.label().red().bold(),
            SessionState::Degraded => item.state.label().yellow(),
        };
        let detail = match &item.outcome {
            Some(outcome) => format!(
                "conf {:.2} angle {:5.1} vel {:6.1} px/s",
                outcome.confidence, outcome.angle, outcome.velocity
            ),
            None => match item.state {
                SessionState::Idle => "detection off".to_string(),
                SessionState::Degraded => "local only, not scored".to_string(),
                _ => "waiting for score".to_string(),
            },
        };
        self.status.set_message(format!(
            "[{state_tag}] {detail} | {} fps | captured {} dropped {}",
            self.recent.len(),
            stats.frames_captured.load(std::sync::atomic::Ordering::Relaxed),
            stats.frames_dropped.load(std::sync::atomic::Ordering::Relaxed),
        ));

        if let Some(sink) = &self.snapshot {
            let due = self
                .last_snapshot
                .map(|at| at.elapsed() >= SNAPSHOT_INTERVAL)
                .unwrap_or(true);
            if due {
                if let Err(err) = sink.write(item) {
                    warn!(path = %sink.path.display(), error = %err, "Snapshot write failed");
                }
                self.last_snapshot = Some(now);
            }
        }
    }

    /// Clears the status line.
    pub fn finish(&self) {
        self.status.finish_and_clear();
    }
}

/// Writes the latest annotated frame to one well-known path.
pub struct SnapshotSink {
    path: PathBuf,
    quality: u8,
}

impl SnapshotSink {
    /// Annotates the frame for its session state and writes it out.
    /// Unscored frames get the plain status banner with no skeleton.
    pub fn write(&self, item: &ProcessedFrame) -> crate::Result<()> {
        let mut image = overlay::decode_image(&item.frame.jpeg)?;
        let result = match &item.outcome {
            Some(outcome) => outcome.to_fall_result(),
            None => FallResult::missed(Timestamp::now()),
        };
        overlay::annotate(&mut image, &result, item.state.overlay_status());
        let jpeg = overlay::encode_jpeg(&image, self.quality)?;
        std::fs::write(&self.path, jpeg)?;
        Ok(())
    }
}
