//! Transport session between the edge client and the detection service.
//!
//! A [`TransportSession`] wraps a [`DetectionChannel`] with the session
//! state machine: `Idle` until detection is toggled on, `Monitoring` and
//! `Alerting` while frames score cleanly, and `Degraded` local-only mode
//! after repeated failures. Degraded mode persists until a paced health
//! check succeeds; frames are never silently treated as "no fall".

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use fallwatch_core::overlay::OverlayStatus;
use fallwatch_core::{features, Confidence, FallResult, Landmark, PersonId, Timestamp};

/// Scoring fields returned by the service for one submitted frame.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionOutcome {
    /// Whether the frame crossed the confidence threshold
    pub fall_detected: bool,
    /// Weighted indicator confidence in [0, 1]
    pub confidence: f32,
    /// Body angle in degrees from vertical
    pub angle: f64,
    /// Vertical velocity in pixels per second
    pub velocity: f64,
    /// Estimated landmarks, empty when no pose was found
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    /// When the frame was scored
    pub timestamp: DateTime<Utc>,
}

impl DetectionOutcome {
    /// Rebuilds an engine result for local overlay rendering. The bounding
    /// box is recomputed from the landmarks the service sent back.
    #[must_use]
    pub fn to_fall_result(&self) -> FallResult {
        let bbox = features::bounding_box(
            &self.landmarks,
            fallwatch_core::DEFAULT_VISIBILITY_THRESHOLD,
        );
        FallResult {
            fall_detected: self.fall_detected,
            confidence: Confidence::clamped(self.confidence),
            angle: self.angle,
            velocity: self.velocity,
            bbox,
            landmarks: self.landmarks.clone(),
            timestamp: Timestamp::from_datetime(self.timestamp),
            should_notify: false,
        }
    }
}

/// Duplex channel to a detection service.
#[async_trait]
pub trait DetectionChannel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Cheap reachability check.
    async fn check_health(&self) -> crate::Result<()>;

    /// Submits one JPEG frame for scoring under `person`.
    async fn submit(&self, person: &PersonId, jpeg: &[u8]) -> crate::Result<DetectionOutcome>;

    /// Clears the identity's detector state on the service.
    async fn reset(&self, person: &PersonId) -> crate::Result<()>;
}

/// Error body shape the service uses for rejections.
#[derive(Debug, Deserialize)]
struct WireError {
    code: String,
    message: String,
}

/// HTTP channel against the service's REST endpoints.
pub struct HttpDetectionChannel {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetectionChannel {
    /// Builds a channel for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`](crate::ClientError::Transport)
    /// when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl DetectionChannel for HttpDetectionChannel {
    fn name(&self) -> &str {
        "http"
    }

    async fn check_health(&self) -> crate::Result<()> {
        self.client
            .get(self.endpoint("/health"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn submit(&self, person: &PersonId, jpeg: &[u8]) -> crate::Result<DetectionOutcome> {
        let part = reqwest::multipart::Part::bytes(jpeg.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new()
            .text("user_id", person.as_str().to_string())
            .part("image", part);

        let response = self
            .client
            .post(self.endpoint("/api/v1/detect-fall"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireError>(&body)
                .map(|err| format!("{}: {}", err.code, err.message))
                .unwrap_or_else(|_| {
                    let trimmed = body.trim();
                    if trimmed.is_empty() {
                        status.canonical_reason().unwrap_or("request failed").to_string()
                    } else {
                        trimmed.chars().take(200).collect()
                    }
                });
            return Err(crate::ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<DetectionOutcome>().await?)
    }

    async fn reset(&self, person: &PersonId) -> crate::Result<()> {
        self.client
            .post(self.endpoint(&format!("/api/v1/reset-detector/{}", person.as_str())))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Bounded retry schedule for connects and frame submissions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts before giving up and entering degraded mode
    pub max_attempts: u32,
    /// Fixed pause between attempts, also the reconnect pacing
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Detection toggled off; frames are captured but not sent
    Idle,
    /// Scoring remotely, no fall on the latest frame
    Monitoring,
    /// Scoring remotely, latest frame crossed the threshold
    Alerting,
    /// Service unreachable; frames annotated locally, never scored
    Degraded,
}

impl SessionState {
    /// Lowercase name for logs and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Monitoring => "monitoring",
            Self::Alerting => "alerting",
            Self::Degraded => "degraded",
        }
    }

    /// Banner color family for locally rendered overlays.
    pub fn overlay_status(&self) -> OverlayStatus {
        match self {
            Self::Idle => OverlayStatus::Idle,
            Self::Monitoring => OverlayStatus::Monitoring,
            Self::Alerting => OverlayStatus::Alerting,
            Self::Degraded => OverlayStatus::Degraded,
        }
    }

    /// Whether detection is on in any form.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Stateful scoring session for one identity.
pub struct TransportSession {
    channel: Box<dyn DetectionChannel>,
    person: PersonId,
    retry: RetryPolicy,
    state: SessionState,
    consecutive_failures: u32,
    last_reconnect: Option<Instant>,
    alert_episodes: u64,
    degraded_entries: u64,
}

impl TransportSession {
    pub fn new(channel: Box<dyn DetectionChannel>, person: PersonId, retry: RetryPolicy) -> Self {
        Self {
            channel,
            person,
            retry,
            state: SessionState::Idle,
            consecutive_failures: 0,
            last_reconnect: None,
            alert_episodes: 0,
            degraded_entries: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn person(&self) -> &PersonId {
        &self.person
    }

    /// Whether frames should be submitted at all.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Distinct transitions into `Alerting` this session.
    pub fn alert_episodes(&self) -> u64 {
        self.alert_episodes
    }

    /// Times the session fell back to degraded local-only mode.
    pub fn degraded_entries(&self) -> u64 {
        self.degraded_entries
    }

    /// Turns detection on. Runs the connect preflight: up to
    /// `max_attempts` health checks, `backoff` apart. Preflight failure
    /// starts the session degraded instead of aborting.
    pub async fn activate(&mut self) -> SessionState {
        if self.state != SessionState::Idle {
            return self.state;
        }

        for attempt in 1..=self.retry.max_attempts.max(1) {
            match self.channel.check_health().await {
                Ok(()) => {
                    info!(
                        person = %self.person,
                        channel = self.channel.name(),
                        "Connected to detection service"
                    );
                    self.state = SessionState::Monitoring;
                    self.consecutive_failures = 0;
                    return self.state;
                }
                Err(err) => {
                    warn!(
                        attempt,
                        error = %err,
                        "Detection service health check failed"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
            }
        }

        self.enter_degraded();
        self.state
    }

    /// Turns detection off, clearing remote state best-effort first.
    pub async fn deactivate(&mut self) {
        if matches!(self.state, SessionState::Monitoring | SessionState::Alerting) {
            if let Err(err) = self.channel.reset(&self.person).await {
                warn!(person = %self.person, error = %err, "Remote reset on disconnect failed");
            }
        }
        if self.state != SessionState::Idle {
            info!(person = %self.person, "Detection stopped");
        }
        self.state = SessionState::Idle;
        self.consecutive_failures = 0;
    }

    /// Flips detection on or off.
    pub async fn toggle(&mut self) -> SessionState {
        if self.state == SessionState::Idle {
            self.activate().await
        } else {
            self.deactivate().await;
            SessionState::Idle
        }
    }

    /// Clears the identity's detector state on the service.
    pub async fn reset_remote(&mut self) -> bool {
        if matches!(self.state, SessionState::Idle | SessionState::Degraded) {
            return false;
        }
        match self.channel.reset(&self.person).await {
            Ok(()) => {
                info!(person = %self.person, "Remote detector state reset");
                if self.state == SessionState::Alerting {
                    self.state = SessionState::Monitoring;
                }
                true
            }
            Err(err) => {
                warn!(person = %self.person, error = %err, "Remote reset failed");
                false
            }
        }
    }

    /// Submits one frame. `None` means the frame was not scored: detection
    /// is off, the session is degraded, or the submission failed (which is
    /// logged and counted toward the degraded threshold).
    pub async fn submit(&mut self, jpeg: &[u8]) -> Option<DetectionOutcome> {
        match self.state {
            SessionState::Idle => None,
            SessionState::Degraded => {
                if !self.reconnect_due() {
                    return None;
                }
                self.last_reconnect = Some(Instant::now());
                match self.channel.check_health().await {
                    Ok(()) => {
                        info!(person = %self.person, "Service reachable again, leaving degraded mode");
                        self.state = SessionState::Monitoring;
                        self.score(jpeg).await
                    }
                    Err(err) => {
                        debug!(error = %err, "Service still unreachable");
                        None
                    }
                }
            }
            SessionState::Monitoring | SessionState::Alerting => self.score(jpeg).await,
        }
    }

    async fn score(&mut self, jpeg: &[u8]) -> Option<DetectionOutcome> {
        match self.channel.submit(&self.person, jpeg).await {
            Ok(outcome) => {
                self.consecutive_failures = 0;
                if outcome.fall_detected {
                    if self.state != SessionState::Alerting {
                        self.alert_episodes += 1;
                        info!(
                            person = %self.person,
                            confidence = outcome.confidence,
                            angle = outcome.angle,
                            "Fall alert"
                        );
                    }
                    self.state = SessionState::Alerting;
                } else {
                    self.state = SessionState::Monitoring;
                }
                Some(outcome)
            }
            Err(err) => {
                self.consecutive_failures += 1;
                warn!(
                    person = %self.person,
                    failures = self.consecutive_failures,
                    error = %err,
                    "Frame submission failed"
                );
                if self.consecutive_failures >= self.retry.max_attempts.max(1) {
                    self.enter_degraded();
                }
                None
            }
        }
    }

    fn enter_degraded(&mut self) {
        info!(person = %self.person, "Entering degraded local-only mode");
        self.state = SessionState::Degraded;
        self.degraded_entries += 1;
        self.consecutive_failures = 0;
        self.last_reconnect = Some(Instant::now());
    }

    fn reconnect_due(&self) -> bool {
        self.last_reconnect
            .map(|at| at.elapsed() >= self.retry.backoff)
            .unwrap_or(true)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    /// Channel double with a scriptable outcome queue and call counters.
    /// Clones share state, so tests can keep one handle for assertions.
    #[derive(Clone)]
    pub(crate) struct ScriptedChannel {
        inner: Arc<ScriptInner>,
    }

    struct ScriptInner {
        healthy: AtomicBool,
        script: Mutex<VecDeque<crate::Result<DetectionOutcome>>>,
        health_checks: AtomicU64,
        submits: AtomicU64,
        resets: AtomicU64,
    }

    impl ScriptedChannel {
        pub fn healthy() -> Self {
            Self::with_health(true)
        }

        pub fn unreachable() -> Self {
            Self::with_health(false)
        }

        fn with_health(healthy: bool) -> Self {
            Self {
                inner: Arc::new(ScriptInner {
                    healthy: AtomicBool::new(healthy),
                    script: Mutex::new(VecDeque::new()),
                    health_checks: AtomicU64::new(0),
                    submits: AtomicU64::new(0),
                    resets: AtomicU64::new(0),
                }),
            }
        }

        pub fn set_healthy(&self, healthy: bool) {
            self.inner.healthy.store(healthy, Ordering::SeqCst);
        }

        pub fn push_outcome(&self, outcome: crate::Result<DetectionOutcome>) {
            self.inner.script.lock().push_back(outcome);
        }

        pub fn health_checks(&self) -> u64 {
            self.inner.health_checks.load(Ordering::SeqCst)
        }

        pub fn submits(&self) -> u64 {
            self.inner.submits.load(Ordering::SeqCst)
        }

        pub fn resets(&self) -> u64 {
            self.inner.resets.load(Ordering::SeqCst)
        }

        pub fn calm_outcome() -> DetectionOutcome {
            DetectionOutcome {
                fall_detected: false,
                confidence: 0.0,
                angle: 4.0,
                velocity: 0.0,
                landmarks: Vec::new(),
                timestamp: Utc::now(),
            }
        }

        pub fn fall_outcome(confidence: f32) -> DetectionOutcome {
            DetectionOutcome {
                fall_detected: true,
                confidence,
                angle: 78.0,
                velocity: 320.0,
                landmarks: Vec::new(),
                timestamp: Utc::now(),
            }
        }

        fn outage() -> crate::ClientError {
            crate::ClientError::Rejected {
                status: 503,
                message: "scripted outage".to_string(),
            }
        }
    }

    #[async_trait]
    impl DetectionChannel for ScriptedChannel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn check_health(&self) -> crate::Result<()> {
            self.inner.health_checks.fetch_add(1, Ordering::SeqCst);
            if self.inner.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(Self::outage())
            }
        }

        async fn submit(
            &self,
            _person: &PersonId,
            _jpeg: &[u8],
        ) -> crate::Result<DetectionOutcome> {
            self.inner.submits.fetch_add(1, Ordering::SeqCst);
            if !self.inner.healthy.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            match self.inner.script.lock().pop_front() {
                Some(outcome) => outcome,
                None => Ok(Self::calm_outcome()),
            }
        }

        async fn reset(&self, _person: &PersonId) -> crate::Result<()> {
            self.inner.resets.fetch_add(1, Ordering::SeqCst);
            if self.inner.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(Self::outage())
            }
        }
    }
}
