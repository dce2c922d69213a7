//! WebSocket handlers for live frame streams.
//!
//! ## Protocol
//!
//! Clients connect per identity and send encoded frames as binary
//! messages.
//!
//! - `/ws/fall-detection/{user_id}` answers every frame with a JSON
//!   [`StreamMessage`]: the scored result plus the annotated frame as
//!   base64.
//! - `/ws/camera-stream/{user_id}` answers with the annotated frame as a
//!   binary JPEG; processing errors come back as JSON error frames.
//!
//! Text frames are ignored. One stream per identity: a second connection
//! for the same `user_id` is refused with a `SESSION_ACTIVE` error. When a
//! stream closes, its session ends and the identity's detector state is
//! reset so a reconnect starts cold.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use fallwatch_core::overlay::OverlayStatus;
use fallwatch_core::PersonId;

use super::dto::StreamMessage;
use super::state::AppState;
use crate::session::SessionKind;

/// `/ws/fall-detection/{user_id}`: frames in, JSON results out.
#[tracing::instrument(skip(state, ws))]
pub async fn fall_detection_ws(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_stream(socket, state, PersonId::new(user_id), SessionKind::FallStream)
    })
}

/// `/ws/camera-stream/{user_id}`: frames in, annotated frames out.
#[tracing::instrument(skip(state, ws))]
pub async fn camera_stream_ws(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_stream(socket, state, PersonId::new(user_id), SessionKind::CameraStream)
    })
}

/// Drives one established stream until the peer disconnects.
async fn handle_stream(socket: WebSocket, state: AppState, person: PersonId, kind: SessionKind) {
    let (mut sender, mut receiver) = socket.split();

    if !state.sessions().start(person.clone(), kind) {
        tracing::warn!(person = %person, "Refusing stream: a session is already active");
        let refusal = StreamMessage::Error {
            code: "SESSION_ACTIVE".to_string(),
            message: "another session is already active for this identity".to_string(),
        };
        let _ = send_json(&mut sender, &refusal).await;
        return;
    }

    tracing::info!(person = %person, kind = kind.label(), "Stream opened");

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(bytes)) => {
                let outcome = process_frame(&state, &person, kind, &bytes);
                let closed = match outcome {
                    FrameReply::Json(reply) => send_json(&mut sender, &reply).await.is_err(),
                    FrameReply::Jpeg(jpeg) => {
                        sender.send(Message::Binary(jpeg)).await.is_err()
                    }
                };
                if closed {
                    break;
                }
            }
            Ok(Message::Text(_)) => {
                tracing::debug!("Ignoring text frame on binary stream");
            }
            Ok(Message::Ping(data)) => {
                // Pong handled automatically by axum
                tracing::trace!(len = data.len(), "Received ping");
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(person = %person, "Client closed stream");
                break;
            }
            Err(e) => {
                tracing::warn!(person = %person, error = %e, "Stream receive failed");
                break;
            }
        }
    }

    let was_tracked = state.reset_person(&person);
    tracing::info!(person = %person, was_tracked, "Stream closed; detector state reset");
}

enum FrameReply {
    Json(StreamMessage),
    Jpeg(Vec<u8>),
}

/// Scores one frame and shapes the reply for the stream kind.
fn process_frame(
    state: &AppState,
    person: &PersonId,
    kind: SessionKind,
    bytes: &[u8],
) -> FrameReply {
    let scored = match state.score_frame(person, bytes) {
        Ok(scored) => scored,
        Err(e) => {
            return FrameReply::Json(StreamMessage::Error {
                code: e.error_code().to_string(),
                message: e.to_string(),
            })
        }
    };

    let status = OverlayStatus::for_result(&scored.result);
    let annotated = state.render_annotated(scored.image, &scored.result, status);

    match kind {
        SessionKind::CameraStream => match annotated {
            Ok(jpeg) => FrameReply::Jpeg(jpeg),
            Err(e) => FrameReply::Json(StreamMessage::Error {
                code: e.error_code().to_string(),
                message: e.to_string(),
            }),
        },
        _ => {
            let processed_frame = match annotated {
                Ok(jpeg) => Some(BASE64.encode(jpeg)),
                Err(e) => {
                    tracing::warn!(person = %person, error = %e, "Frame annotation failed");
                    None
                }
            };
            FrameReply::Json(StreamMessage::Detection {
                fall_detected: scored.result.fall_detected,
                confidence: scored.result.confidence.value(),
                angle: scored.result.angle,
                velocity: scored.result.velocity,
                landmarks: scored.result.landmarks.clone(),
                timestamp: scored
                    .result
                    .timestamp
                    .to_datetime()
                    .unwrap_or_else(chrono::Utc::now),
                status: status.label().to_string(),
                processed_frame,
            })
        }
    }
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    reply: &StreamMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(reply) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream message");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::AlertDispatcher;
    use crate::ServiceConfig;
    use fallwatch_core::overlay;
    use fallwatch_core::SimulatedPoseOracle;
    use image::RgbImage;

    fn test_state() -> AppState {
        let config = ServiceConfig {
            backend_url: None,
            ..ServiceConfig::default()
        };
        AppState::with_parts(
            config,
            Box::new(SimulatedPoseOracle::new()),
            AlertDispatcher::new(),
        )
    }

    fn jpeg_frame() -> Vec<u8> {
        overlay::encode_jpeg(&RgbImage::new(320, 240), 90).expect("encode")
    }

    #[tokio::test]
    async fn test_process_frame_detection_reply_carries_frame() {
        let state = test_state();
        let person = PersonId::from("alice");
        state.sessions().start(person.clone(), SessionKind::FallStream);

        match process_frame(&state, &person, SessionKind::FallStream, &jpeg_frame()) {
            FrameReply::Json(StreamMessage::Detection {
                landmarks,
                processed_frame,
                status,
                ..
            }) => {
                let encoded = processed_frame.expect("annotated frame present");
                let jpeg = BASE64.decode(encoded).expect("valid base64");
                let decoded = overlay::decode_image(&jpeg).expect("valid jpeg");
                assert_eq!(decoded.dimensions(), (320, 240));
                assert_eq!(landmarks.len(), fallwatch_core::LANDMARK_COUNT);
                assert!(status == "monitoring" || status == "alerting");
            }
            _ => panic!("expected a detection reply"),
        }
    }

    #[tokio::test]
    async fn test_process_frame_camera_stream_replies_binary() {
        let state = test_state();
        let person = PersonId::from("alice");
        state.sessions().start(person.clone(), SessionKind::CameraStream);

        match process_frame(&state, &person, SessionKind::CameraStream, &jpeg_frame()) {
            FrameReply::Jpeg(jpeg) => {
                assert!(overlay::decode_image(&jpeg).is_ok());
            }
            FrameReply::Json(_) => panic!("expected a binary reply"),
        }
    }

    #[tokio::test]
    async fn test_process_frame_garbage_yields_error_message() {
        let state = test_state();
        let person = PersonId::from("alice");

        match process_frame(&state, &person, SessionKind::FallStream, b"junk") {
            FrameReply::Json(StreamMessage::Error { code, .. }) => {
                assert_eq!(code, "INVALID_IMAGE");
            }
            _ => panic!("expected an error reply"),
        }
    }
}
