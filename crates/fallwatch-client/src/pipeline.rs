//! Concurrent capture / transport / display pipeline.
//!
//! The three stages run as independent tasks joined only by bounded
//! drop-oldest queues, so a slow service or terminal never stalls capture.
//! A stop signal (quit command, run duration, Ctrl-C) fans out to every
//! stage over one broadcast channel and the run returns a
//! [`PipelineReport`] for the session summary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::capture::{CaptureChain, Frame};
use crate::display::DisplayStage;
use crate::queue::BoundedQueue;
use crate::transport::{DetectionOutcome, SessionState, TransportSession};
use crate::ClientConfig;

/// Operator commands accepted while the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Turn detection on or off
    ToggleDetection,
    /// Clear the identity's detector state on the service
    ResetDetector,
    /// Stop the pipeline
    Quit,
}

impl Command {
    /// Parses one line of operator input.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "t" | "toggle" => Some(Self::ToggleDetection),
            "r" | "reset" => Some(Self::ResetDetector),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// One frame after the transport stage. `outcome` is `None` when the frame
/// was not scored (detection off or degraded mode).
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub frame: Frame,
    pub outcome: Option<DetectionOutcome>,
    pub state: SessionState,
}

/// Live counters shared across the stages.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frames_captured: AtomicU64,
    pub frames_scored: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub falls_detected: AtomicU64,
}

/// Final counters for the end-of-session summary.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub frames_captured: u64,
    pub frames_scored: u64,
    pub frames_dropped: u64,
    pub falls_detected: u64,
    pub alert_episodes: u64,
    pub degraded_intervals: u64,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Average capture rate over the whole session.
    pub fn capture_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_captured as f64 / secs
        } else {
            0.0
        }
    }
}

/// Orchestrates the capture, transport, and display stages.
pub struct FramePipeline {
    config: ClientConfig,
}

impl FramePipeline {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Runs the pipeline until a stop signal and returns the session
    /// counters. Detection starts active; the connect preflight decides
    /// between monitoring and degraded mode.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Task`](crate::ClientError::Task) when a
    /// stage task panics.
    pub async fn run(
        self,
        chain: CaptureChain,
        session: TransportSession,
    ) -> crate::Result<PipelineReport> {
        let config = self.config;
        let frame_queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let result_queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let stats = Arc::new(PipelineStats::default());

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(8);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let started = Instant::now();

        let capture_handle = tokio::spawn(run_capture(
            chain,
            Arc::clone(&frame_queue),
            Arc::clone(&stats),
            config.fps,
            shutdown_tx.subscribe(),
        ));
        let transport_handle = tokio::spawn(run_transport(
            session,
            Arc::clone(&frame_queue),
            Arc::clone(&result_queue),
            Arc::clone(&stats),
            cmd_rx,
            stop_tx.clone(),
            shutdown_tx.subscribe(),
        ));
        let display = DisplayStage::new(&config);
        let display_handle = tokio::spawn(run_display(
            display,
            Arc::clone(&result_queue),
            Arc::clone(&stats),
            config.fps,
            shutdown_tx.subscribe(),
        ));

        if !config.headless {
            spawn_command_reader(cmd_tx.clone());
        }
        if let Some(secs) = config.duration_secs {
            let stop = stop_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                info!(secs, "Session duration reached");
                let _ = stop.send(()).await;
            });
        }
        {
            let stop = stop_tx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received");
                    let _ = stop.send(()).await;
                }
            });
        }

        // Keeping cmd_tx alive here keeps the command channel open even
        // with no interactive reader attached.
        let _cmd_guard = cmd_tx;

        let _ = stop_rx.recv().await;
        debug!("Stopping pipeline stages");
        let _ = shutdown_tx.send(());

        capture_handle.await?;
        let session = transport_handle.await?;
        display_handle.await?;

        Ok(PipelineReport {
            frames_captured: stats.frames_captured.load(Ordering::Relaxed),
            frames_scored: stats.frames_scored.load(Ordering::Relaxed),
            frames_dropped: stats.frames_dropped.load(Ordering::Relaxed)
                + frame_queue.dropped()
                + result_queue.dropped(),
            falls_detected: stats.falls_detected.load(Ordering::Relaxed),
            alert_episodes: session.alert_episodes(),
            degraded_intervals: session.degraded_entries(),
            elapsed: started.elapsed(),
        })
    }
}

async fn run_capture(
    mut chain: CaptureChain,
    frames: Arc<BoundedQueue<Frame>>,
    stats: Arc<PipelineStats>,
    fps: u32,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(tick_period(fps));
    debug!("Capture stage started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Capture stage shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                let frame = chain.next_frame();
                stats.frames_captured.fetch_add(1, Ordering::Relaxed);
                frames.push(frame);
            }
        }
    }
}

async fn run_transport(
    mut session: TransportSession,
    frames: Arc<BoundedQueue<Frame>>,
    results: Arc<BoundedQueue<ProcessedFrame>>,
    stats: Arc<PipelineStats>,
    mut commands: mpsc::Receiver<Command>,
    stop_tx: mpsc::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> TransportSession {
    session.activate().await;
    let mut ticker = tokio::time::interval(Duration::from_millis(5));
    debug!("Transport stage started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Transport stage shutdown requested");
                break;
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::ToggleDetection) => {
                        let state = session.toggle().await;
                        info!(state = state.label(), "Detection toggled");
                    }
                    Some(Command::ResetDetector) => {
                        session.reset_remote().await;
                    }
                    Some(Command::Quit) => {
                        let _ = stop_tx.send(()).await;
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let Some(frame) = frames.pop() else { continue };
                let item = if session.is_active() {
                    let outcome = session.submit(&frame.jpeg).await;
                    if let Some(ref scored) = outcome {
                        stats.frames_scored.fetch_add(1, Ordering::Relaxed);
                        if scored.fall_detected {
                            stats.falls_detected.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    ProcessedFrame {
                        state: session.state(),
                        outcome,
                        frame,
                    }
                } else {
                    ProcessedFrame {
                        frame,
                        outcome: None,
                        state: SessionState::Idle,
                    }
                };
                results.push(item);
            }
        }
    }

    session.deactivate().await;
    session
}

async fn run_display(
    mut display: DisplayStage,
    results: Arc<BoundedQueue<ProcessedFrame>>,
    stats: Arc<PipelineStats>,
    fps: u32,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(tick_period(fps));
    debug!("Display stage started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Display stage shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                // Freshness over completeness: drain to the newest item and
                // count everything skipped as dropped.
                let mut latest = None;
                let mut skipped = 0;
                while let Some(item) = results.pop() {
                    if latest.is_some() {
                        skipped += 1;
                    }
                    latest = Some(item);
                }
                if skipped > 0 {
                    stats.frames_dropped.fetch_add(skipped, Ordering::Relaxed);
                }
                if let Some(item) = latest {
                    display.render(&item, &stats);
                }
            }
        }
    }

    display.finish();
}

/// Reads operator commands from stdin on a detached thread. The thread has
/// no cancellation point, so it must not hold anything the runtime waits
/// for at shutdown.
fn spawn_command_reader(commands: mpsc::Sender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match std::io::BufRead::read_line(&mut stdin.lock(), &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if let Some(command) = Command::parse(&line) {
                        if commands.blocking_send(command).is_err() {
                            break;
                        }
                        if command == Command::Quit {
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Command reader failed");
                    break;
                }
            }
        }
    });
}

fn tick_period(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedChannel;
    use crate::transport::RetryPolicy;
    use fallwatch_core::PersonId;

    fn test_config() -> ClientConfig {
        ClientConfig {
            frame_width: 96,
            frame_height: 96,
            fps: 30,
            headless: true,
            duration_secs: Some(1),
            ..ClientConfig::default()
        }
    }

    fn test_session(channel: &ScriptedChannel) -> TransportSession {
        TransportSession::new(
            Box::new(channel.clone()),
            PersonId::from("alice"),
            RetryPolicy {
                max_attempts: 2,
                backoff: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("t"), Some(Command::ToggleDetection));
        assert_eq!(Command::parse(" TOGGLE \n"), Some(Command::ToggleDetection));
        assert_eq!(Command::parse("r"), Some(Command::ResetDetector));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("x"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_report_capture_fps() {
        let report = PipelineReport {
            frames_captured: 60,
            frames_scored: 60,
            frames_dropped: 0,
            falls_detected: 0,
            alert_episodes: 0,
            degraded_intervals: 0,
            elapsed: Duration::from_secs(2),
        };
        assert!((report.capture_fps() - 30.0).abs() < 1e-9);

        let report = PipelineReport {
            elapsed: Duration::ZERO,
            ..report
        };
        assert_eq!(report.capture_fps(), 0.0);
    }

    #[tokio::test]
    async fn test_pipeline_scores_frames_end_to_end() {
        let config = test_config();
        let channel = ScriptedChannel::healthy();
        channel.push_outcome(Ok(ScriptedChannel::fall_outcome(0.9)));

        let chain = CaptureChain::from_config(&config);
        let session = test_session(&channel);

        let report = FramePipeline::new(config)
            .run(chain, session)
            .await
            .expect("pipeline run");

        assert!(report.frames_captured > 0);
        assert!(report.frames_scored > 0);
        assert!(report.frames_scored <= report.frames_captured);
        // The scripted first frame was a fall; one episode, counted once.
        assert_eq!(report.falls_detected, 1);
        assert_eq!(report.alert_episodes, 1);
        assert_eq!(report.degraded_intervals, 0);
        // Disconnect cleared the remote identity.
        assert_eq!(channel.resets(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_survives_unreachable_service() {
        let config = test_config();
        let channel = ScriptedChannel::unreachable();

        let chain = CaptureChain::from_config(&config);
        let session = test_session(&channel);

        let report = FramePipeline::new(config)
            .run(chain, session)
            .await
            .expect("pipeline run");

        assert!(report.frames_captured > 0);
        assert_eq!(report.frames_scored, 0);
        assert_eq!(report.degraded_intervals, 1);
        assert_eq!(channel.resets(), 0);
    }
}
