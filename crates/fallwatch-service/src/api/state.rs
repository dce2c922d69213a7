//! Application state for the detection API.
//!
//! Shared state passed to all handlers: the scoring engine, the pose
//! oracle, the notification dispatcher, and session bookkeeping. Cloned per
//! request; everything lives behind one `Arc`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;

use fallwatch_core::overlay::{self, OverlayStatus};
use fallwatch_core::{FallResult, FallScorer, PersonId, PoseOracle, SimulatedPoseOracle, Timestamp};

use super::error::{ApiError, ApiResult};
use crate::alerting::{AlertDispatcher, BackendAlertHandler, ConsoleAlertHandler, NotificationEvent};
use crate::session::SessionRegistry;
use crate::ServiceConfig;

/// A decoded frame together with its scored result.
#[derive(Debug)]
pub struct ScoredFrame {
    /// The decoded frame, available for annotation
    pub image: RgbImage,
    /// The engine's verdict for this frame
    pub result: FallResult,
}

/// Shared application state for the API.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (not cloned, shared via Arc).
struct AppStateInner {
    scorer: FallScorer,
    oracle: Box<dyn PoseOracle>,
    dispatcher: AlertDispatcher,
    sessions: SessionRegistry,
    config: ServiceConfig,
    started_at: Instant,
}

impl AppState {
    /// Creates state with the default wiring: the simulated pose oracle, a
    /// console alert handler, and a backend alert handler when a backend
    /// URL is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Notification`](crate::ServiceError::Notification)
    /// when the backend HTTP client cannot be constructed.
    pub fn new(config: ServiceConfig) -> crate::Result<Self> {
        let mut dispatcher = AlertDispatcher::new();
        dispatcher.add_handler(Box::new(ConsoleAlertHandler));
        if let Some(base_url) = &config.backend_url {
            let timeout = Duration::from_secs(config.notification_timeout_secs);
            dispatcher.add_handler(Box::new(BackendAlertHandler::new(base_url, timeout)?));
        }

        Ok(Self::with_parts(
            config,
            Box::new(SimulatedPoseOracle::new()),
            dispatcher,
        ))
    }

    /// Creates state from explicit parts. Used by tests and by deployments
    /// that plug in a different pose oracle.
    #[must_use]
    pub fn with_parts(
        config: ServiceConfig,
        oracle: Box<dyn PoseOracle>,
        dispatcher: AlertDispatcher,
    ) -> Self {
        let scorer = FallScorer::new(config.engine.clone());
        Self {
            inner: Arc::new(AppStateInner {
                scorer,
                oracle,
                dispatcher,
                sessions: SessionRegistry::new(),
                config,
                started_at: Instant::now(),
            }),
        }
    }

    /// The scoring engine.
    pub fn scorer(&self) -> &FallScorer {
        &self.inner.scorer
    }

    /// Session bookkeeping.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// The notification dispatcher.
    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.inner.dispatcher
    }

    /// The service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Decodes and scores one uploaded frame for `person`.
    ///
    /// Runs the full path: decode, pose estimation, scoring, session frame
    /// accounting, and (asynchronously) notification dispatch when the
    /// cooldown gate passes.
    pub fn score_frame(&self, person: &PersonId, bytes: &[u8]) -> ApiResult<ScoredFrame> {
        let image = overlay::decode_image(bytes).map_err(ApiError::from)?;
        let observation = self.inner.oracle.estimate(&image).map_err(ApiError::from)?;
        let result = self
            .inner
            .scorer
            .score(&observation, person, Timestamp::now());

        self.inner.sessions.record_result(person, result.fall_detected);

        if result.should_notify {
            self.spawn_notification(person.clone(), &result);
        }

        Ok(ScoredFrame { image, result })
    }

    /// Annotates a frame with its result and re-encodes it as JPEG.
    pub fn render_annotated(
        &self,
        mut image: RgbImage,
        result: &FallResult,
        status: OverlayStatus,
    ) -> ApiResult<Vec<u8>> {
        overlay::annotate(&mut image, result, status);
        overlay::encode_jpeg(&image, self.inner.config.jpeg_quality).map_err(ApiError::from)
    }

    /// Evicts detector state for `person`, returning whether anything was
    /// tracked. Any active session entry for the identity is dropped too so
    /// its counters start fresh on the next stream.
    pub fn reset_person(&self, person: &PersonId) -> bool {
        self.inner.sessions.stop(person);
        self.inner.scorer.reset(person)
    }

    fn spawn_notification(&self, person: PersonId, result: &FallResult) {
        let event = NotificationEvent::from_result(person, result);
        let state = self.clone();
        tokio::spawn(async move {
            state.inner.dispatcher.dispatch(&event).await;
        });
    }
}
