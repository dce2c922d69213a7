//! REST handlers for the detection API.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use fallwatch_core::PersonId;

use super::dto::{DetectionResponse, HealthResponse, ResetResponse, SessionActionResponse};
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::session::SessionKind;

/// Score one uploaded frame.
///
/// Expects a multipart form with a `user_id` text field and an `image`
/// file field holding an encoded frame.
#[tracing::instrument(skip(state, multipart))]
pub async fn detect_fall(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectionResponse>> {
    let mut user_id: Option<String> = None;
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("user_id") => user_id = Some(field.text().await?),
            Some("image") => image = Some(field.bytes().await?.to_vec()),
            _ => {}
        }
    }

    let user_id = user_id.ok_or(ApiError::MissingField { field: "user_id" })?;
    let image = image.ok_or(ApiError::MissingField { field: "image" })?;
    let person = validated_person(&user_id)?;
    if image.is_empty() {
        return Err(ApiError::bad_request("image upload is empty"));
    }

    let scored = state.score_frame(&person, &image)?;

    tracing::debug!(
        person = %person,
        fall_detected = scored.result.fall_detected,
        confidence = scored.result.confidence.value(),
        "Frame scored"
    );

    Ok(Json(DetectionResponse::from_result(&scored.result)))
}

/// Liveness probe with session and engine counters.
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "fallwatch-service".to_string(),
        version: crate::VERSION.to_string(),
        uptime_secs: state.uptime_secs(),
        active_sessions: state.sessions().count(),
        tracked_people: state.scorer().store().len(),
        notifications_dispatched: state.dispatcher().dispatched_count(),
    })
}

/// Evict all detector state for an identity.
#[tracing::instrument(skip(state))]
pub async fn reset_detector(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ResetResponse>> {
    let person = validated_person(&user_id)?;
    let was_tracked = state.reset_person(&person);

    tracing::info!(person = %person, was_tracked, "Detector state reset");

    Ok(Json(ResetResponse {
        user_id,
        was_tracked,
    }))
}

/// Register a camera session for an identity.
#[tracing::instrument(skip(state))]
pub async fn start_camera_detection(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SessionActionResponse>> {
    let person = validated_person(&user_id)?;
    let started = state.sessions().start(person.clone(), SessionKind::Camera);

    let status = if started {
        tracing::info!(person = %person, "Camera session started");
        "started"
    } else {
        tracing::debug!(person = %person, "Camera session already active");
        "already_active"
    };

    Ok(Json(SessionActionResponse {
        user_id,
        status: status.to_string(),
        frames: None,
        falls: None,
    }))
}

/// End a camera session for an identity.
#[tracing::instrument(skip(state))]
pub async fn stop_camera_detection(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SessionActionResponse>> {
    let person = validated_person(&user_id)?;

    let response = match state.sessions().stop(&person) {
        Some(info) => {
            tracing::info!(
                person = %person,
                frames = info.frames,
                falls = info.falls,
                "Camera session stopped"
            );
            SessionActionResponse {
                user_id,
                status: "stopped".to_string(),
                frames: Some(info.frames),
                falls: Some(info.falls),
            }
        }
        None => SessionActionResponse {
            user_id,
            status: "not_active".to_string(),
            frames: None,
            falls: None,
        },
    };

    Ok(Json(response))
}

fn validated_person(user_id: &str) -> ApiResult<PersonId> {
    if user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id must not be empty"));
    }
    Ok(PersonId::new(user_id))
}
