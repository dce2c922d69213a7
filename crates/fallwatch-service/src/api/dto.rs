//! Data Transfer Objects for the detection API.
//!
//! These types are the wire contracts for REST responses and WebSocket
//! frames; engine types never cross the boundary directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fallwatch_core::{FallResult, Landmark};

/// Response body for a scored frame.
///
/// ## Example Response
///
/// ```json
/// {
///   "fall_detected": true,
///   "confidence": 0.7,
///   "angle": 78.2,
///   "velocity": 310.5,
///   "landmarks": [{"point": "Nose", "x": 320, "y": 96, "z": 0.0, "visibility": 0.9}],
///   "timestamp": "2026-03-02T14:30:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    /// Whether the frame crossed the confidence threshold
    pub fall_detected: bool,
    /// Weighted indicator confidence in [0, 1]
    pub confidence: f32,
    /// Body angle in degrees from vertical
    pub angle: f64,
    /// Vertical velocity in pixels per second
    pub velocity: f64,
    /// Estimated landmarks, empty when no pose was found
    pub landmarks: Vec<Landmark>,
    /// When the frame was scored
    pub timestamp: DateTime<Utc>,
}

impl DetectionResponse {
    /// Builds the response from a scored result.
    #[must_use]
    pub fn from_result(result: &FallResult) -> Self {
        Self {
            fall_detected: result.fall_detected,
            confidence: result.confidence.value(),
            angle: result.angle,
            velocity: result.velocity,
            landmarks: result.landmarks.clone(),
            timestamp: result.timestamp.to_datetime().unwrap_or_else(Utc::now),
        }
    }
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests
    pub status: String,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Seconds since startup
    pub uptime_secs: u64,
    /// Currently open sessions
    pub active_sessions: usize,
    /// Identities with retained detector state
    pub tracked_people: usize,
    /// Notifications dispatched since startup
    pub notifications_dispatched: u64,
}

/// Response body for a detector reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    /// Identity that was reset
    pub user_id: String,
    /// Whether any state existed before the reset
    pub was_tracked: bool,
}

/// Response body for session start/stop endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionActionResponse {
    /// Identity the action applied to
    pub user_id: String,
    /// One of `started`, `already_active`, `stopped`, `not_active`
    pub status: String,
    /// Frames scored during the session, present on `stopped`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<u64>,
    /// Fall-positive results during the session, present on `stopped`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub falls: Option<u64>,
}

/// Messages sent to WebSocket clients.
///
/// Error codes reuse the REST vocabulary (`INVALID_IMAGE`,
/// `ORACLE_FAILURE`, `INTERNAL_ERROR`, `MULTIPART_ERROR`) plus
/// `SESSION_ACTIVE` when a second stream is opened for an identity that
/// already has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// One scored frame
    Detection {
        fall_detected: bool,
        confidence: f32,
        angle: f64,
        velocity: f64,
        /// Estimated landmarks, empty when no pose was found
        landmarks: Vec<Landmark>,
        timestamp: DateTime<Utc>,
        /// `monitoring` or `alerting`
        status: String,
        /// Base64-encoded annotated JPEG, when rendering succeeded
        #[serde(skip_serializing_if = "Option::is_none")]
        processed_frame: Option<String>,
    },
    /// A frame could not be processed; the stream stays open
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use fallwatch_core::{Confidence, Timestamp};

    #[test]
    fn test_detection_response_from_result() {
        let result = FallResult {
            fall_detected: true,
            confidence: Confidence::clamped(0.7),
            angle: 81.5,
            velocity: 4.0,
            bbox: None,
            landmarks: Vec::new(),
            timestamp: Timestamp::new(1_700_000_000, 0),
            should_notify: true,
        };

        let response = DetectionResponse::from_result(&result);
        assert!(response.fall_detected);
        assert!((response.confidence - 0.7).abs() < 1e-6);
        assert!(response.landmarks.is_empty());
        assert_eq!(response.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_stream_message_tagging() {
        let msg = StreamMessage::Error {
            code: "INVALID_IMAGE".to_string(),
            message: "not a jpeg".to_string(),
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "INVALID_IMAGE");

        let msg = StreamMessage::Detection {
            fall_detected: false,
            confidence: 0.0,
            angle: 3.0,
            velocity: 0.0,
            landmarks: Vec::new(),
            timestamp: Utc::now(),
            status: "monitoring".to_string(),
            processed_frame: None,
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "detection");
        // Absent frame is omitted rather than null
        assert!(json.get("processed_frame").is_none());
    }
}
