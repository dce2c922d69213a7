//! Pure landmark geometry: body tilt angle and visible-landmark bounding box.
//!
//! Nothing here holds state or fails; absent signal is expressed with
//! sentinel values (angle 0, box `None`), mirroring how the scorer treats a
//! frame with no usable pose.

use crate::types::{BodyPoint, BoundingBox, Landmark};

/// Finds a landmark by body point.
fn find(landmarks: &[Landmark], point: BodyPoint) -> Option<&Landmark> {
    landmarks.iter().find(|l| l.point == point)
}

/// Midpoint of two landmarks in pixel space.
fn midpoint(a: &Landmark, b: &Landmark) -> (f64, f64) {
    (
        f64::from(a.x + b.x) / 2.0,
        f64::from(a.y + b.y) / 2.0,
    )
}

/// Computes the body tilt angle in degrees.
///
/// Forms the vector from the hip midpoint to the shoulder midpoint and
/// measures its deviation from vertical as `atan2(|Δx|, |Δy|)`. An upright
/// torso yields values near 0, a horizontal (prone) torso values near 90.
///
/// Returns 0.0 when the landmark list is empty or any of the four torso
/// points is missing: no signal reads as perfectly upright, never as an
/// error.
#[must_use]
pub fn body_angle(landmarks: &[Landmark]) -> f64 {
    if landmarks.is_empty() {
        return 0.0;
    }

    let (Some(left_shoulder), Some(right_shoulder), Some(left_hip), Some(right_hip)) = (
        find(landmarks, BodyPoint::LeftShoulder),
        find(landmarks, BodyPoint::RightShoulder),
        find(landmarks, BodyPoint::LeftHip),
        find(landmarks, BodyPoint::RightHip),
    ) else {
        return 0.0;
    };

    let shoulder_mid = midpoint(left_shoulder, right_shoulder);
    let hip_mid = midpoint(left_hip, right_hip);

    let dx = shoulder_mid.0 - hip_mid.0;
    let dy = shoulder_mid.1 - hip_mid.1;

    dx.abs().atan2(dy.abs()).to_degrees()
}

/// Computes the bounding box over landmarks whose visibility strictly
/// exceeds `visibility_threshold`.
///
/// Returns `None` when the list is empty or no landmark clears the
/// threshold.
#[must_use]
pub fn bounding_box(landmarks: &[Landmark], visibility_threshold: f32) -> Option<BoundingBox> {
    let mut visible = landmarks
        .iter()
        .filter(|l| l.visibility.value() > visibility_threshold);

    let first = visible.next()?;
    let mut bbox = BoundingBox::new(first.x, first.y, first.x, first.y);

    for l in visible {
        bbox.x_min = bbox.x_min.min(l.x);
        bbox.y_min = bbox.y_min.min(l.y);
        bbox.x_max = bbox.x_max.max(l.x);
        bbox.y_max = bbox.y_max.max(l.y);
    }

    Some(bbox)
}
