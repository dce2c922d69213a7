//! # Fallwatch Core
//!
//! Core engine for the Fallwatch fall-detection system.
//!
//! This crate provides the building blocks shared by the detection service
//! and the edge capture client:
//!
//! - **Core Data Types**: [`Landmark`], [`BodyPoint`], [`BoundingBox`],
//!   [`PersonId`], [`Confidence`], and [`Timestamp`] for representing pose
//!   observations and tracked identities.
//!
//! - **Feature Extraction**: pure landmark geometry in the [`features`]
//!   module (body tilt angle, visible-landmark bounding box).
//!
//! - **Scoring Engine**: the stateful [`FallScorer`] combining angle,
//!   vertical velocity, and floor proximity into a clamped confidence, with
//!   per-identity baselines held in a [`PersonStateStore`] and outbound
//!   alerts debounced by the [`NotificationGate`].
//!
//! - **Pose Oracle Seam**: the [`PoseOracle`] trait abstracting whatever
//!   produces landmarks from an image, plus a deterministic
//!   [`SimulatedPoseOracle`] for demos and tests.
//!
//! - **Overlay Rendering**: skeleton/bounding-box/status annotation and
//!   JPEG codec helpers in the [`overlay`] module.
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialization for the core types
//!
//! ## Example
//!
//! ```rust
//! use fallwatch_core::{EngineConfig, FallScorer, PersonId, Timestamp};
//! use fallwatch_core::pose::PoseObservation;
//!
//! let scorer = FallScorer::new(EngineConfig::default());
//! let person = PersonId::new("resident-7");
//!
//! // A frame where the oracle saw nobody scores zero confidence.
//! let result = scorer.score(&PoseObservation::missed(640, 480), &person, Timestamp::now());
//! assert!(!result.fall_detected);
//! assert_eq!(result.confidence.value(), 0.0);
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod features;
pub mod gate;
pub mod overlay;
pub mod pose;
pub mod scorer;
pub mod state;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{EngineConfig, MissedPosePolicy};
pub use error::{CoreError, CoreResult};
pub use gate::NotificationGate;
pub use pose::{PoseObservation, PoseOracle, SimulatedPoseOracle};
pub use scorer::{FallResult, FallScorer};
pub use state::{Observation, PersonState, PersonStateStore};
pub use types::{BodyPoint, BoundingBox, Confidence, FrameId, Landmark, PersonId, Timestamp};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of landmarks in the full-body convention
pub const LANDMARK_COUNT: usize = 33;

/// Default visibility threshold for including a landmark in the bounding box
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.5;

/// Prelude module for convenient imports.
///
/// ```rust
/// use fallwatch_core::prelude::*;
/// ```
pub mod prelude {

    pub use crate::config::{EngineConfig, MissedPosePolicy};
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::gate::NotificationGate;
    pub use crate::pose::{PoseObservation, PoseOracle, SimulatedPoseOracle};
    pub use crate::scorer::{FallResult, FallScorer};
    pub use crate::state::{Observation, PersonState, PersonStateStore};
    pub use crate::types::{
        BodyPoint, BoundingBox, Confidence, FrameId, Landmark, PersonId, Timestamp,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_valid() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_constants() {
        assert_eq!(LANDMARK_COUNT, 33);
        assert!(DEFAULT_VISIBILITY_THRESHOLD > 0.0);
        assert!(DEFAULT_VISIBILITY_THRESHOLD < 1.0);
    }
}
