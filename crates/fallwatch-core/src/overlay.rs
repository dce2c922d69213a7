//! Frame annotation and JPEG codec helpers.
//!
//! Renders the scored result back onto the frame it came from: torso and leg
//! skeleton segments, joint markers, the visible-landmark bounding box, and
//! a status banner strip along the top edge. The banner is a solid color
//! keyed to [`OverlayStatus`]; textual status travels in the structured
//! payload alongside the frame, not in pixels.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::error::CoreResult;
use crate::scorer::FallResult;
use crate::types::{BodyPoint, Landmark};

/// JPEG quality used when no explicit quality is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Height of the status banner strip, in pixels.
const BANNER_HEIGHT: u32 = 18;

/// Skeleton segments drawn between landmark pairs: the torso box, then hips
/// to knees and knees to ankles.
pub const SKELETON_SEGMENTS: [(BodyPoint, BodyPoint); 8] = [
    (BodyPoint::LeftShoulder, BodyPoint::RightShoulder),
    (BodyPoint::LeftShoulder, BodyPoint::LeftHip),
    (BodyPoint::RightShoulder, BodyPoint::RightHip),
    (BodyPoint::LeftHip, BodyPoint::RightHip),
    (BodyPoint::LeftHip, BodyPoint::LeftKnee),
    (BodyPoint::RightHip, BodyPoint::RightKnee),
    (BodyPoint::LeftKnee, BodyPoint::LeftAnkle),
    (BodyPoint::RightKnee, BodyPoint::RightAnkle),
];

const SKELETON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const JOINT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const BBOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BBOX_ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Presentation state for the banner strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverlayStatus {
    /// No active monitoring
    Idle,
    /// Frames flowing, nothing detected
    Monitoring,
    /// A fall crossed the threshold
    Alerting,
    /// Monitoring continues on a degraded path
    Degraded,
}

impl OverlayStatus {
    /// Banner status matching a scored result.
    #[must_use]
    pub fn for_result(result: &FallResult) -> Self {
        if result.fall_detected {
            Self::Alerting
        } else {
            Self::Monitoring
        }
    }

    /// Lowercase label for logs and payloads.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Monitoring => "monitoring",
            Self::Alerting => "alerting",
            Self::Degraded => "degraded",
        }
    }

    fn color(self) -> Rgb<u8> {
        match self {
            Self::Idle => Rgb([128, 128, 128]),
            Self::Monitoring => Rgb([0, 160, 0]),
            Self::Alerting => Rgb([200, 0, 0]),
            Self::Degraded => Rgb([230, 200, 0]),
        }
    }
}

impl std::fmt::Display for OverlayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Decodes an encoded image (JPEG, PNG) into an RGB buffer.
///
/// # Errors
///
/// Returns [`CoreError::Image`](crate::CoreError::Image) when the bytes are
/// not a decodable image.
pub fn decode_image(bytes: &[u8]) -> CoreResult<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Encodes an RGB buffer as JPEG at the given quality (clamped to 1..=100).
///
/// # Errors
///
/// Returns [`CoreError::Image`](crate::CoreError::Image) when encoding
/// fails.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(bytes)
}

/// Draws the scored result onto `image` in place.
pub fn annotate(image: &mut RgbImage, result: &FallResult, status: OverlayStatus) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    for (a, b) in SKELETON_SEGMENTS {
        if let (Some(from), Some(to)) = (visible_point(&result.landmarks, a), visible_point(&result.landmarks, b)) {
            draw_line_segment_mut(image, from, to, SKELETON_COLOR);
        }
    }

    for landmark in result.landmarks.iter().filter(|l| l.is_visible()) {
        draw_filled_circle_mut(image, (landmark.x, landmark.y), 2, JOINT_COLOR);
    }

    if let Some(bbox) = result.bbox {
        // Inclusive of the max-edge pixel
        let w = (bbox.x_max - bbox.x_min + 1).max(1) as u32;
        let h = (bbox.y_max - bbox.y_min + 1).max(1) as u32;
        let color = if result.fall_detected {
            BBOX_ALERT_COLOR
        } else {
            BBOX_COLOR
        };
        draw_hollow_rect_mut(image, Rect::at(bbox.x_min, bbox.y_min).of_size(w, h), color);
    }

    let banner = Rect::at(0, 0).of_size(width, BANNER_HEIGHT.min(height));
    draw_filled_rect_mut(image, banner, status.color());
}

/// Decode, annotate, and re-encode in one step.
///
/// # Errors
///
/// Returns [`CoreError::Image`](crate::CoreError::Image) when the input
/// bytes cannot be decoded or the annotated frame cannot be encoded.
pub fn annotate_bytes(
    bytes: &[u8],
    result: &FallResult,
    status: OverlayStatus,
    quality: u8,
) -> CoreResult<Vec<u8>> {
    let mut image = decode_image(bytes)?;
    annotate(&mut image, result, status);
    encode_jpeg(&image, quality)
}

fn visible_point(landmarks: &[Landmark], point: BodyPoint) -> Option<(f32, f32)> {
    landmarks
        .iter()
        .find(|l| l.point == point && l.is_visible())
        .map(|l| (l.x as f32, l.y as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Confidence, Timestamp};

    fn result_with(bbox: Option<BoundingBox>, landmarks: Vec<Landmark>, fall: bool) -> FallResult {
        FallResult {
            fall_detected: fall,
            confidence: Confidence::clamped(if fall { 1.0 } else { 0.0 }),
            angle: 0.0,
            velocity: 0.0,
            bbox,
            landmarks,
            timestamp: Timestamp::new(0, 0),
            should_notify: false,
        }
    }

    #[test]
    fn test_jpeg_round_trip_preserves_dimensions() {
        let image = RgbImage::from_pixel(64, 48, Rgb([30, 60, 90]));
        let bytes = encode_jpeg(&image, DEFAULT_JPEG_QUALITY).expect("encode");
        let decoded = decode_image(&bytes).expect("decode");
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn test_banner_color_matches_status() {
        let mut image = RgbImage::new(64, 64);
        annotate(&mut image, &result_with(None, Vec::new(), true), OverlayStatus::Alerting);
        assert_eq!(image.get_pixel(1, 1), &Rgb([200, 0, 0]));

        let mut image = RgbImage::new(64, 64);
        annotate(&mut image, &result_with(None, Vec::new(), false), OverlayStatus::Monitoring);
        assert_eq!(image.get_pixel(1, 1), &Rgb([0, 160, 0]));
    }

    #[test]
    fn test_bbox_border_drawn_in_alert_color() {
        let mut image = RgbImage::new(64, 64);
        let bbox = BoundingBox::new(10, 30, 50, 60);
        annotate(&mut image, &result_with(Some(bbox), Vec::new(), true), OverlayStatus::Alerting);
        assert_eq!(image.get_pixel(10, 30), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(50, 60), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_skeleton_segment_drawn_between_visible_torso_points() {
        let mut image = RgbImage::new(64, 64);
        let landmarks = vec![
            Landmark::new(BodyPoint::LeftShoulder, 20, 40, 0.0, Confidence::clamped(0.9)),
            Landmark::new(BodyPoint::RightShoulder, 40, 40, 0.0, Confidence::clamped(0.9)),
        ];
        annotate(&mut image, &result_with(None, landmarks, false), OverlayStatus::Monitoring);
        // Midpoint of the shoulder line
        assert_eq!(image.get_pixel(30, 40), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_invisible_landmarks_are_skipped() {
        let mut image = RgbImage::new(64, 64);
        let landmarks = vec![
            Landmark::new(BodyPoint::LeftShoulder, 20, 40, 0.0, Confidence::clamped(0.2)),
            Landmark::new(BodyPoint::RightShoulder, 40, 40, 0.0, Confidence::clamped(0.9)),
        ];
        annotate(&mut image, &result_with(None, landmarks, false), OverlayStatus::Monitoring);
        assert_eq!(image.get_pixel(30, 40), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_annotate_bytes_round_trip() {
        let image = RgbImage::from_pixel(64, 64, Rgb([10, 10, 10]));
        let bytes = encode_jpeg(&image, 90).expect("encode");
        let result = result_with(Some(BoundingBox::new(5, 25, 30, 50)), Vec::new(), false);
        let annotated =
            annotate_bytes(&bytes, &result, OverlayStatus::Monitoring, DEFAULT_JPEG_QUALITY)
                .expect("annotate");
        let decoded = decode_image(&annotated).expect("decode");
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(OverlayStatus::Idle.label(), "idle");
        assert_eq!(OverlayStatus::Monitoring.to_string(), "monitoring");
        assert_eq!(
            OverlayStatus::for_result(&result_with(None, Vec::new(), true)),
            OverlayStatus::Alerting
        );
    }
}
