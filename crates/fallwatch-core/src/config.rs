//! Engine configuration: scoring thresholds, notification cooldown, and the
//! missed-pose policy.
//!
//! Defaults match the reference deployment; every field can be overridden
//! through the `with_*` methods or the `FALLWATCH_*` environment variables.

use std::env;

use crate::error::{CoreError, CoreResult};

/// What the scorer does with a frame in which the oracle saw nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissedPosePolicy {
    /// Keep the previous observation untouched so one dropped detection does
    /// not zero the velocity baseline.
    #[default]
    PreserveBaseline,
    /// Clear the previous observation; the next detection starts cold.
    ClearBaseline,
}

/// Configuration for the fall-scoring engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Body angle above which the angle indicator fires (degrees)
    pub angle_threshold: f64,
    /// Vertical velocity above which the velocity indicator fires (px/sec)
    pub velocity_threshold: f64,
    /// Confidence at or above which a frame counts as a fall
    pub confidence_threshold: f32,
    /// Minimum interval between outbound notifications per identity (seconds)
    pub notification_cooldown_secs: f64,
    /// Behavior when the oracle reports no detection
    pub missed_pose_policy: MissedPosePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            angle_threshold: 60.0,
            velocity_threshold: 2.5,
            confidence_threshold: 0.7,
            notification_cooldown_secs: 30.0,
            missed_pose_policy: MissedPosePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Set the body-angle threshold (clamped to [0, 90] degrees).
    pub fn with_angle_threshold(mut self, degrees: f64) -> Self {
        self.angle_threshold = degrees.clamp(0.0, 90.0);
        self
    }

    /// Set the vertical-velocity threshold (non-negative).
    pub fn with_velocity_threshold(mut self, px_per_sec: f64) -> Self {
        self.velocity_threshold = px_per_sec.max(0.0);
        self
    }

    /// Set the fall-confidence threshold (clamped to [0, 1]).
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the notification cooldown in seconds (non-negative).
    pub fn with_notification_cooldown_secs(mut self, seconds: f64) -> Self {
        self.notification_cooldown_secs = seconds.max(0.0);
        self
    }

    /// Set the missed-pose policy.
    pub fn with_missed_pose_policy(mut self, policy: MissedPosePolicy) -> Self {
        self.missed_pose_policy = policy;
        self
    }

    /// Load configuration from `FALLWATCH_*` environment variables, falling
    /// back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] when a set variable does not
    /// parse as a number.
    pub fn from_env() -> CoreResult<Self> {
        let mut config = Self::default();

        if let Some(v) = read_env_f64("FALLWATCH_ANGLE_THRESHOLD")? {
            config = config.with_angle_threshold(v);
        }
        if let Some(v) = read_env_f64("FALLWATCH_VELOCITY_THRESHOLD")? {
            config = config.with_velocity_threshold(v);
        }
        if let Some(v) = read_env_f64("FALLWATCH_CONFIDENCE_THRESHOLD")? {
            config = config.with_confidence_threshold(v as f32);
        }
        if let Some(v) = read_env_f64("FALLWATCH_NOTIFICATION_COOLDOWN")? {
            config = config.with_notification_cooldown_secs(v);
        }

        Ok(config)
    }
}

fn read_env_f64(name: &str) -> CoreResult<Option<f64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| CoreError::configuration(format!("{name} is not a number: '{raw}'"))),
        Err(_) => Ok(None),
    }
}
