//! Per-frame fall scoring.
//!
//! [`FallScorer`] owns the engine configuration, the per-identity state
//! store, and the notification gate, and runs the full evaluation for one
//! observation:
//!
//! 1. missed-pose handling per the configured policy
//! 2. body angle from the torso landmarks
//! 3. bounding box over the visible landmarks
//! 4. vertical velocity against the identity's retained baseline
//! 5. weighted confidence from the three indicators
//! 6. fall verdict against the confidence threshold
//! 7. baseline overwrite and cooldown gating
//!
//! Steps 4 through 7 run under the identity's state lock, so two frames for
//! the same person can never interleave their baseline reads and writes.

use crate::config::{EngineConfig, MissedPosePolicy};
use crate::features;
use crate::gate::NotificationGate;
use crate::pose::PoseObservation;
use crate::state::{Observation, PersonStateStore};
use crate::types::{BoundingBox, Confidence, Landmark, PersonId, Timestamp};
use crate::DEFAULT_VISIBILITY_THRESHOLD;

/// Confidence contributed by the body-angle indicator.
pub const ANGLE_WEIGHT: f32 = 0.5;
/// Confidence contributed by the vertical-velocity indicator.
pub const VELOCITY_WEIGHT: f32 = 0.3;
/// Confidence contributed by the floor-proximity indicator.
pub const FLOOR_WEIGHT: f32 = 0.2;
/// Fraction of the frame height below which a bounding box counts as
/// floor-proximate (its bottom edge must sit past this line).
pub const FLOOR_BAND_RATIO: f64 = 0.8;

/// Outcome of scoring one frame for one identity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FallResult {
    /// Whether this frame crossed the confidence threshold
    pub fall_detected: bool,
    /// Weighted indicator confidence
    pub confidence: Confidence,
    /// Body angle in degrees from vertical
    pub angle: f64,
    /// Vertical velocity in pixels per second
    pub velocity: f64,
    /// Bounding box over the visible landmarks, when any were visible
    pub bbox: Option<BoundingBox>,
    /// The landmarks that were scored, for downstream rendering
    pub landmarks: Vec<Landmark>,
    /// When the frame was scored
    pub timestamp: Timestamp,
    /// Whether a notification should go out for this frame
    pub should_notify: bool,
}

impl FallResult {
    /// The all-zero result reported for frames in which no pose was found.
    #[must_use]
    pub fn missed(timestamp: Timestamp) -> Self {
        Self {
            fall_detected: false,
            confidence: Confidence::MIN,
            angle: 0.0,
            velocity: 0.0,
            bbox: None,
            landmarks: Vec::new(),
            timestamp,
            should_notify: false,
        }
    }
}

/// The fall-scoring engine.
///
/// One scorer serves every identity; state is partitioned per person inside
/// the [`PersonStateStore`]. The scorer is `Send + Sync` and is meant to be
/// shared behind an `Arc`.
#[derive(Debug)]
pub struct FallScorer {
    config: EngineConfig,
    store: PersonStateStore,
    gate: NotificationGate,
}

impl FallScorer {
    /// Creates a scorer with the given configuration and an empty store.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let gate = NotificationGate::new(config.notification_cooldown_secs);
        Self {
            config,
            store: PersonStateStore::new(),
            gate,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the per-identity state store.
    #[must_use]
    pub fn store(&self) -> &PersonStateStore {
        &self.store
    }

    /// Scores one observation for one identity.
    ///
    /// A detected pose always overwrites the identity's baseline, whether or
    /// not it scored as a fall. A missed pose reports the all-zero result;
    /// what happens to the baseline is governed by
    /// [`MissedPosePolicy`](crate::MissedPosePolicy). The notification
    /// cooldown anchor is only ever moved when `should_notify` comes back
    /// `true`.
    pub fn score(
        &self,
        observation: &PoseObservation,
        person: &PersonId,
        now: Timestamp,
    ) -> FallResult {
        if !observation.detected {
            if self.config.missed_pose_policy == MissedPosePolicy::ClearBaseline
                && self.store.contains(person)
            {
                self.store.with_state(person, |state| state.clear_observation());
            }
            return FallResult::missed(now);
        }

        let angle = features::body_angle(&observation.landmarks);
        let bbox = features::bounding_box(&observation.landmarks, DEFAULT_VISIBILITY_THRESHOLD);
        let frame_height = f64::from(observation.frame_height);

        let (velocity, confidence, fall_detected, should_notify) =
            self.store.with_state(person, |state| {
                let velocity = match (state.last_observation(), bbox) {
                    (Some(prev), Some(current)) => match prev.bbox {
                        Some(prev_bbox) => {
                            let dt = now.duration_since(&prev.timestamp);
                            if dt > 0.0 {
                                (current.center_y() - prev_bbox.center_y()).abs() / dt
                            } else {
                                0.0
                            }
                        }
                        None => 0.0,
                    },
                    _ => 0.0,
                };

                let mut score = 0.0_f32;
                if angle > self.config.angle_threshold {
                    score += ANGLE_WEIGHT;
                }
                if velocity > self.config.velocity_threshold {
                    score += VELOCITY_WEIGHT;
                }
                if let Some(b) = bbox {
                    if f64::from(b.y_max) > FLOOR_BAND_RATIO * frame_height {
                        score += FLOOR_WEIGHT;
                    }
                }
                let confidence = Confidence::clamped(score);
                let fall_detected = confidence.exceeds(self.config.confidence_threshold);

                state.observe(Observation {
                    timestamp: now,
                    bbox,
                    angle,
                });
                let should_notify = self.gate.evaluate(state, now, fall_detected);

                (velocity, confidence, fall_detected, should_notify)
            });

        if fall_detected {
            tracing::debug!(
                person = %person,
                confidence = confidence.value(),
                angle,
                velocity,
                should_notify,
                "Fall threshold crossed"
            );
        }

        FallResult {
            fall_detected,
            confidence,
            angle,
            velocity,
            bbox,
            landmarks: observation.landmarks.clone(),
            timestamp: now,
            should_notify,
        }
    }

    /// Evicts all retained state for `person`, returning whether anything
    /// was tracked. The next frame for that identity starts cold.
    pub fn reset(&self, person: &PersonId) -> bool {
        let was_tracked = self.store.reset(person);
        if was_tracked {
            tracing::debug!(person = %person, "Person state evicted");
        }
        was_tracked
    }
}
