//! # Fallwatch Service
//!
//! HTTP and WebSocket front end for the Fallwatch detection engine.
//!
//! The service accepts camera frames per identity, runs them through the
//! pose oracle and the [`FallScorer`](fallwatch_core::FallScorer), pushes
//! notifications to a backend when a fall crosses the cooldown gate, and
//! streams annotated frames back to connected clients.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/detect-fall` - Score one uploaded frame (multipart)
//! - `GET /health` - Liveness and session counters
//! - `POST /api/v1/reset-detector/{user_id}` - Evict an identity's state
//! - `POST /api/v1/start-camera-detection/{user_id}` - Register a camera session
//! - `POST /api/v1/stop-camera-detection/{user_id}` - End a camera session
//! - `WS /ws/fall-detection/{user_id}` - Frames in, JSON results out
//! - `WS /ws/camera-stream/{user_id}` - Frames in, annotated frames out

pub mod alerting;
pub mod api;
pub mod session;

pub use alerting::{AlertDispatcher, AlertHandler, BackendAlertHandler, ConsoleAlertHandler};
pub use api::{create_router, AppState};
pub use session::{SessionKind, SessionRegistry};

use fallwatch_core::EngineConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Unified error type for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Engine error from the core crate
    #[error("Engine error: {0}")]
    Engine(#[from] fallwatch_core::CoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound notification error
    #[error("Notification error: {0}")]
    Notification(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the detection service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address for the HTTP server
    pub host: String,
    /// Bind port for the HTTP server
    pub port: u16,
    /// Base URL of the notification backend; `None` disables outbound posts
    pub backend_url: Option<String>,
    /// Timeout for one outbound notification request (seconds)
    pub notification_timeout_secs: u64,
    /// Quality for JPEG re-encoding of annotated frames
    pub jpeg_quality: u8,
    /// Scoring engine configuration
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            backend_url: Some("http://localhost:3000".to_string()),
            notification_timeout_secs: 5,
            jpeg_quality: fallwatch_core::overlay::DEFAULT_JPEG_QUALITY,
            engine: EngineConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `FALLWATCH_*` environment variables, falling
    /// back to defaults for anything unset. An empty
    /// `FALLWATCH_BACKEND_URL` disables outbound notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] when a set variable does not parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("FALLWATCH_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("FALLWATCH_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ServiceError::Config(format!("invalid FALLWATCH_PORT: {port}")))?;
        }
        if let Ok(url) = std::env::var("FALLWATCH_BACKEND_URL") {
            config.backend_url = if url.is_empty() { None } else { Some(url) };
        }
        config.engine = EngineConfig::from_env()?;

        Ok(config)
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] when the host is not a valid IP
    /// address.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr> {
        let ip: std::net::IpAddr = self
            .host
            .parse()
            .map_err(|_| ServiceError::Config(format!("invalid bind host: {}", self.host)))?;
        Ok(std::net::SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 8001);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.backend_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.notification_timeout_secs, 5);
    }

    #[test]
    fn test_socket_addr() {
        let config = ServiceConfig::default();
        let addr = config.socket_addr().expect("default host parses");
        assert_eq!(addr.port(), 8001);

        let bad = ServiceConfig {
            host: "not-an-ip".to_string(),
            ..ServiceConfig::default()
        };
        assert!(bad.socket_addr().is_err());
    }
}
