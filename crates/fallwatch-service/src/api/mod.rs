//! REST and WebSocket endpoints for the detection service.
//!
//! ## Endpoints
//!
//! ### Detection
//! - `POST /api/v1/detect-fall` - Score one uploaded frame (multipart
//!   `user_id` + `image`)
//!
//! ### Lifecycle
//! - `POST /api/v1/reset-detector/{user_id}` - Evict an identity's state
//! - `POST /api/v1/start-camera-detection/{user_id}` - Register a camera session
//! - `POST /api/v1/stop-camera-detection/{user_id}` - End a camera session
//!
//! ### Health
//! - `GET /health` - Liveness and counters
//!
//! ### WebSocket
//! - `WS /ws/fall-detection/{user_id}` - Frames in, JSON results out
//! - `WS /ws/camera-stream/{user_id}` - Frames in, annotated frames out

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use dto::*;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::{AppState, ScoredFrame};

/// Create the detection API router with all endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use fallwatch_service::api::{create_router, AppState};
/// use fallwatch_service::ServiceConfig;
///
/// #[tokio::main]
/// async fn main() {
///     let state = AppState::new(ServiceConfig::default()).expect("state");
///     let app = create_router(state);
///     // ... serve with axum
/// }
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Detection
        .route("/api/v1/detect-fall", post(handlers::detect_fall))
        // Lifecycle
        .route("/api/v1/reset-detector/:user_id", post(handlers::reset_detector))
        .route(
            "/api/v1/start-camera-detection/:user_id",
            post(handlers::start_camera_detection),
        )
        .route(
            "/api/v1/stop-camera-detection/:user_id",
            post(handlers::stop_camera_detection),
        )
        // WebSocket streams
        .route("/ws/fall-detection/:user_id", get(websocket::fall_detection_ws))
        .route("/ws/camera-stream/:user_id", get(websocket::camera_stream_ws))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
