//! The pose-oracle seam.
//!
//! Whatever turns an image into landmarks (an on-device model, a remote
//! inference service) sits behind [`PoseOracle`]. The engine never looks
//! inside it; it only consumes the resulting [`PoseObservation`].
//!
//! [`SimulatedPoseOracle`] is the built-in implementation used by demos and
//! tests: a deterministic articulated figure driven purely by a tick
//! counter, walking upright most of the cycle and dropping into a horizontal
//! pose once per cycle.

use image::RgbImage;
use parking_lot::Mutex;

use crate::error::CoreResult;
use crate::types::{BodyPoint, Confidence, Landmark};

/// One frame's worth of oracle output.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseObservation {
    /// Whether the oracle saw a person at all
    pub detected: bool,
    /// Landmarks in wire-index order; empty when nothing was detected
    pub landmarks: Vec<Landmark>,
    /// Width of the source frame in pixels
    pub frame_width: u32,
    /// Height of the source frame in pixels
    pub frame_height: u32,
}

impl PoseObservation {
    /// Creates an observation for a detected person.
    #[must_use]
    pub fn detected(landmarks: Vec<Landmark>, frame_width: u32, frame_height: u32) -> Self {
        Self {
            detected: true,
            landmarks,
            frame_width,
            frame_height,
        }
    }

    /// Creates an observation for a frame in which nobody was seen.
    #[must_use]
    pub fn missed(frame_width: u32, frame_height: u32) -> Self {
        Self {
            detected: false,
            landmarks: Vec::new(),
            frame_width,
            frame_height,
        }
    }
}

/// Maps an image to a pose observation.
///
/// Implementations are opaque to the engine. They must be cheap to share
/// across request handlers (`Send + Sync`); any internal state needs its own
/// synchronization.
pub trait PoseOracle: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Estimates the pose in `image`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Oracle`](crate::CoreError::Oracle) when the
    /// underlying estimator fails outright. "Saw nobody" is not an error;
    /// that is [`PoseObservation::missed`].
    fn estimate(&self, image: &RgbImage) -> CoreResult<PoseObservation>;
}

/// Deterministic stand-in oracle.
///
/// Each call advances an internal tick. The generated figure walks upright
/// for most of the cycle, then tips over and sinks to the bottom of the
/// frame, which drives all three fall indicators (angle, velocity, floor
/// proximity) high at once. Two oracles constructed alike produce identical
/// landmark sequences.
pub struct SimulatedPoseOracle {
    tick: Mutex<u64>,
    cycle: u64,
}

/// Fraction of the cycle spent upright before the fall begins.
const FALL_START: f64 = 0.75;
/// Fraction of the cycle at which the figure lies fully horizontal.
const FALL_END: f64 = 0.875;

impl SimulatedPoseOracle {
    /// Creates an oracle with the default cycle length of 240 frames.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cycle(240)
    }

    /// Creates an oracle with a custom cycle length (minimum 8 frames).
    #[must_use]
    pub fn with_cycle(cycle: u64) -> Self {
        Self {
            tick: Mutex::new(0),
            cycle: cycle.max(8),
        }
    }

    /// Figure parameters for one tick: tilt from vertical (radians), hip
    /// midpoint, and torso length, all in pixel space.
    fn figure_params(&self, tick: u64, width: u32, height: u32) -> (f64, f64, f64, f64) {
        let w = f64::from(width);
        let h = f64::from(height);
        let phase = (tick % self.cycle) as f64 / self.cycle as f64;

        let torso_len = h / 5.0;
        let walk_x = w / 2.0 + (w / 4.0) * (tick as f64 * 0.05).sin();

        let (tilt, hip_y) = if phase < FALL_START {
            (0.0, h * 0.55)
        } else if phase < FALL_END {
            let f = (phase - FALL_START) / (FALL_END - FALL_START);
            (
                f * std::f64::consts::FRAC_PI_2,
                h * (0.55 + 0.30 * f),
            )
        } else {
            (std::f64::consts::FRAC_PI_2, h * 0.85)
        };

        (tilt, walk_x, hip_y, torso_len)
    }

    fn landmarks_for(&self, tick: u64, width: u32, height: u32) -> Vec<Landmark> {
        let (tilt, hip_x, hip_y, torso_len) = self.figure_params(tick, width, height);
        let w = f64::from(width);
        let h = f64::from(height);

        // Torso axis (hip -> shoulder) and its perpendicular
        let axis = (tilt.sin(), -tilt.cos());
        let perp = (tilt.cos(), tilt.sin());

        let shoulder_mid = (hip_x + axis.0 * torso_len, hip_y + axis.1 * torso_len);
        let head_mid = (
            shoulder_mid.0 + axis.0 * torso_len * 0.45,
            shoulder_mid.1 + axis.1 * torso_len * 0.45,
        );
        let half_shoulder = w / 16.0;
        let half_hip = w / 20.0;

        let along = |origin: (f64, f64), a: f64, p: f64| {
            (
                origin.0 + axis.0 * a + perp.0 * p,
                origin.1 + axis.1 * a + perp.1 * p,
            )
        };

        let place = |point: BodyPoint, pos: (f64, f64)| {
            let x = pos.0.clamp(0.0, w - 1.0).round() as i32;
            let y = pos.1.clamp(0.0, h - 1.0).round() as i32;
            Landmark::new(point, x, y, 0.0, Confidence::clamped(0.9))
        };

        let left_shoulder = along(shoulder_mid, 0.0, -half_shoulder);
        let right_shoulder = along(shoulder_mid, 0.0, half_shoulder);
        let left_hip = along((hip_x, hip_y), 0.0, -half_hip);
        let right_hip = along((hip_x, hip_y), 0.0, half_hip);

        let mut out = Vec::with_capacity(crate::LANDMARK_COUNT);
        for point in BodyPoint::all() {
            let pos = match point {
                BodyPoint::Nose => head_mid,
                BodyPoint::LeftEyeInner
                | BodyPoint::LeftEye
                | BodyPoint::LeftEyeOuter
                | BodyPoint::LeftEar
                | BodyPoint::MouthLeft => along(head_mid, 0.0, -half_hip * 0.5),
                BodyPoint::RightEyeInner
                | BodyPoint::RightEye
                | BodyPoint::RightEyeOuter
                | BodyPoint::RightEar
                | BodyPoint::MouthRight => along(head_mid, 0.0, half_hip * 0.5),
                BodyPoint::LeftShoulder => left_shoulder,
                BodyPoint::RightShoulder => right_shoulder,
                BodyPoint::LeftElbow => along(left_shoulder, -torso_len * 0.45, -half_hip * 0.6),
                BodyPoint::RightElbow => along(right_shoulder, -torso_len * 0.45, half_hip * 0.6),
                BodyPoint::LeftWrist
                | BodyPoint::LeftPinky
                | BodyPoint::LeftIndex
                | BodyPoint::LeftThumb => along(left_shoulder, -torso_len * 0.9, -half_hip * 0.7),
                BodyPoint::RightWrist
                | BodyPoint::RightPinky
                | BodyPoint::RightIndex
                | BodyPoint::RightThumb => along(right_shoulder, -torso_len * 0.9, half_hip * 0.7),
                BodyPoint::LeftHip => left_hip,
                BodyPoint::RightHip => right_hip,
                BodyPoint::LeftKnee => along(left_hip, -torso_len * 0.8, 0.0),
                BodyPoint::RightKnee => along(right_hip, -torso_len * 0.8, 0.0),
                BodyPoint::LeftAnkle | BodyPoint::LeftHeel | BodyPoint::LeftFootIndex => {
                    along(left_hip, -torso_len * 1.6, 0.0)
                }
                BodyPoint::RightAnkle | BodyPoint::RightHeel | BodyPoint::RightFootIndex => {
                    along(right_hip, -torso_len * 1.6, 0.0)
                }
            };
            out.push(place(point, pos));
        }
        out
    }
}

impl Default for SimulatedPoseOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseOracle for SimulatedPoseOracle {
    fn name(&self) -> &str {
        "simulated"
    }

    fn estimate(&self, image: &RgbImage) -> CoreResult<PoseObservation> {
        let (width, height) = image.dimensions();
        let tick = {
            let mut tick = self.tick.lock();
            let current = *tick;
            *tick += 1;
            current
        };

        Ok(PoseObservation::detected(
            self.landmarks_for(tick, width, height),
            width,
            height,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features;

    fn frame(width: u32, height: u32) -> RgbImage {
        RgbImage::new(width, height)
    }

    fn advance(oracle: &SimulatedPoseOracle, image: &RgbImage, calls: u64) -> PoseObservation {
        let mut last = None;
        for _ in 0..calls {
            last = Some(oracle.estimate(image).expect("simulated oracle never fails"));
        }
        last.expect("at least one call")
    }

    #[test]
    fn test_emits_full_landmark_set() {
        let oracle = SimulatedPoseOracle::new();
        let obs = advance(&oracle, &frame(640, 480), 1);
        assert!(obs.detected);
        assert_eq!(obs.landmarks.len(), crate::LANDMARK_COUNT);
        assert_eq!(obs.frame_width, 640);
        assert_eq!(obs.frame_height, 480);
    }

    #[test]
    fn test_landmarks_inside_frame() {
        let oracle = SimulatedPoseOracle::new();
        let image = frame(640, 480);
        for _ in 0..240 {
            let obs = oracle.estimate(&image).expect("simulated oracle never fails");
            for l in &obs.landmarks {
                assert!((0..640).contains(&l.x), "x {} out of frame", l.x);
                assert!((0..480).contains(&l.y), "y {} out of frame", l.y);
            }
        }
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = SimulatedPoseOracle::new();
        let b = SimulatedPoseOracle::new();
        let image = frame(640, 480);
        for _ in 0..20 {
            let obs_a = a.estimate(&image).expect("simulated oracle never fails");
            let obs_b = b.estimate(&image).expect("simulated oracle never fails");
            assert_eq!(obs_a, obs_b);
        }
    }

    #[test]
    fn test_upright_then_fallen() {
        let oracle = SimulatedPoseOracle::with_cycle(80);
        let image = frame(640, 480);

        // Early in the cycle the figure stands upright
        let standing = advance(&oracle, &image, 1);
        assert!(features::body_angle(&standing.landmarks) < 10.0);

        // Past the fall phase it lies horizontal
        let fallen = advance(&oracle, &image, 75);
        assert!(features::body_angle(&fallen.landmarks) > 60.0);
    }
}
