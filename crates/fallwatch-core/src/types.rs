//! Core data types for the Fallwatch system.
//!
//! This module defines the fundamental data structures shared by the scoring
//! engine, the detection service, and the edge client.
//!
//! # Type Categories
//!
//! - **Identity Types**: [`PersonId`], [`FrameId`]
//! - **Pose Types**: [`Landmark`], [`BodyPoint`], [`BoundingBox`]
//! - **Common Types**: [`Confidence`], [`Timestamp`]

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::DEFAULT_VISIBILITY_THRESHOLD;

// =============================================================================
// Identity Types
// =============================================================================

/// Unique identifier for a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameId(Uuid);

impl FrameId {
    /// Creates a new unique frame ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a frame ID from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a tracked identity (one monitored person).
///
/// Person IDs are supplied by callers (user accounts, session names) and key
/// all per-identity engine state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PersonId(String);

impl PersonId {
    /// Creates a new person ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the person ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PersonId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// Common Types
// =============================================================================

/// High-precision timestamp for observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timestamp {
    /// Seconds since Unix epoch
    pub seconds: i64,
    /// Nanoseconds within the second
    pub nanos: u32,
}

impl Timestamp {
    /// Creates a new timestamp from seconds and nanoseconds.
    #[must_use]
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Creates a timestamp from the current time.
    #[must_use]
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos(),
        }
    }

    /// Creates a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }

    /// Converts to `DateTime<Utc>`.
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }

    /// Returns the timestamp as total nanoseconds since epoch.
    #[must_use]
    pub fn as_nanos(&self) -> i128 {
        i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanos)
    }

    /// Returns the duration between two timestamps in seconds.
    ///
    /// Negative when `earlier` is actually later than `self`.
    #[must_use]
    pub fn duration_since(&self, earlier: &Self) -> f64 {
        let diff_nanos = self.as_nanos() - earlier.as_nanos();
        diff_nanos as f64 / 1_000_000_000.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

/// Confidence score in the range [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Confidence(f32);

impl Confidence {
    /// Minimum confidence value.
    pub const MIN: Self = Self(0.0);

    /// Maximum confidence value.
    pub const MAX: Self = Self(1.0);

    /// Creates a new confidence value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when `value` is outside [0.0, 1.0]
    /// or not finite.
    pub fn new(value: f32) -> CoreResult<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(CoreError::validation(format!(
                "confidence {value} outside [0.0, 1.0]"
            )));
        }
        Ok(Self(value))
    }

    /// Creates a confidence value, clamping into [0.0, 1.0].
    ///
    /// Non-finite input clamps to 0.
    #[must_use]
    pub fn clamped(value: f32) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self::MIN
        }
    }

    /// Returns the inner value.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.0
    }

    /// Returns `true` if this confidence meets or exceeds `threshold`.
    #[must_use]
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.0 >= threshold
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// =============================================================================
// Pose Types
// =============================================================================

/// Named body landmark in the 33-point full-body convention.
///
/// Discriminants are the wire indices emitted by pose oracles; the scoring
/// engine only consumes the shoulder and hip points but the full set is kept
/// for overlays and downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum BodyPoint {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyPoint {
    /// Returns the wire index of this body point.
    #[must_use]
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Returns the human-readable name of this body point.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left_eye_inner",
            Self::LeftEye => "left_eye",
            Self::LeftEyeOuter => "left_eye_outer",
            Self::RightEyeInner => "right_eye_inner",
            Self::RightEye => "right_eye",
            Self::RightEyeOuter => "right_eye_outer",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::MouthLeft => "mouth_left",
            Self::MouthRight => "mouth_right",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftPinky => "left_pinky",
            Self::RightPinky => "right_pinky",
            Self::LeftIndex => "left_index",
            Self::RightIndex => "right_index",
            Self::LeftThumb => "left_thumb",
            Self::RightThumb => "right_thumb",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftHeel => "left_heel",
            Self::RightHeel => "right_heel",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }

    /// Returns `true` for face landmarks (nose through mouth).
    #[must_use]
    pub fn is_face(&self) -> bool {
        self.index() <= 10
    }

    /// Returns `true` for the four torso landmarks the scorer consumes.
    #[must_use]
    pub fn is_torso(&self) -> bool {
        matches!(
            self,
            Self::LeftShoulder | Self::RightShoulder | Self::LeftHip | Self::RightHip
        )
    }

    /// Returns `true` for leg and foot landmarks.
    #[must_use]
    pub fn is_lower_body(&self) -> bool {
        self.index() >= 25
    }

    /// Returns all body points in wire-index order.
    #[must_use]
    pub fn all() -> [Self; crate::LANDMARK_COUNT] {
        [
            Self::Nose,
            Self::LeftEyeInner,
            Self::LeftEye,
            Self::LeftEyeOuter,
            Self::RightEyeInner,
            Self::RightEye,
            Self::RightEyeOuter,
            Self::LeftEar,
            Self::RightEar,
            Self::MouthLeft,
            Self::MouthRight,
            Self::LeftShoulder,
            Self::RightShoulder,
            Self::LeftElbow,
            Self::RightElbow,
            Self::LeftWrist,
            Self::RightWrist,
            Self::LeftPinky,
            Self::RightPinky,
            Self::LeftIndex,
            Self::RightIndex,
            Self::LeftThumb,
            Self::RightThumb,
            Self::LeftHip,
            Self::RightHip,
            Self::LeftKnee,
            Self::RightKnee,
            Self::LeftAnkle,
            Self::RightAnkle,
            Self::LeftHeel,
            Self::RightHeel,
            Self::LeftFootIndex,
            Self::RightFootIndex,
        ]
    }
}

impl TryFrom<u8> for BodyPoint {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        BodyPoint::all()
            .into_iter()
            .find(|p| p.index() == value)
            .ok_or_else(|| CoreError::validation(format!("invalid body point index {value}")))
    }
}

/// A labeled body point observed in one frame.
///
/// Coordinates are pixels in the source frame; `z` is the oracle's relative
/// depth estimate and `visibility` its per-point confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Landmark {
    /// Which body point this is
    pub point: BodyPoint,
    /// Horizontal pixel coordinate
    pub x: i32,
    /// Vertical pixel coordinate (grows downward)
    pub y: i32,
    /// Relative depth estimate
    pub z: f32,
    /// Oracle visibility confidence for this point
    pub visibility: Confidence,
}

impl Landmark {
    /// Creates a new landmark.
    #[must_use]
    pub fn new(point: BodyPoint, x: i32, y: i32, z: f32, visibility: Confidence) -> Self {
        Self {
            point,
            x,
            y,
            z,
            visibility,
        }
    }

    /// Returns `true` if this landmark clears the default visibility
    /// threshold.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visibility.value() > DEFAULT_VISIBILITY_THRESHOLD
    }
}

/// Axis-aligned bounding box over visible landmarks, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Left edge
    pub x_min: i32,
    /// Top edge
    pub y_min: i32,
    /// Right edge
    pub x_max: i32,
    /// Bottom edge
    pub y_max: i32,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[must_use]
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Returns the box width in pixels.
    #[must_use]
    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    /// Returns the box height in pixels.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }

    /// Returns the center point of the box.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x_min + self.x_max) / 2.0,
            f64::from(self.y_min + self.y_max) / 2.0,
        )
    }

    /// Returns the vertical center of the box.
    ///
    /// This is the quantity whose frame-to-frame motion defines the fall
    /// velocity.
    #[must_use]
    pub fn center_y(&self) -> f64 {
        f64::from(self.y_min + self.y_max) / 2.0
    }
}
