//! Outbound fall notifications.
//!
//! When a scored frame passes the cooldown gate the service hands a
//! [`NotificationEvent`] to the [`AlertDispatcher`], which fans it out to
//! every registered [`AlertHandler`]. Handler failures are logged and never
//! propagate back into the scoring path; a missed notification must not
//! stall frame processing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fallwatch_core::{FallResult, PersonId};

use crate::Result;

/// Wire value for the notification `type` field.
pub const NOTIFICATION_EVENT_TYPE: &str = "FALL_DETECTED";

/// A fall that passed the cooldown gate and should be announced.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// Who fell
    pub person: PersonId,
    /// Confidence of the detection
    pub confidence: f32,
    /// Body angle at detection (degrees)
    pub angle: f64,
    /// Vertical velocity at detection (px/sec)
    pub velocity: f64,
    /// When the frame was scored
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// Builds an event from a scored result.
    #[must_use]
    pub fn from_result(person: PersonId, result: &FallResult) -> Self {
        Self {
            person,
            confidence: result.confidence.value(),
            angle: result.angle,
            velocity: result.velocity,
            timestamp: result.timestamp.to_datetime().unwrap_or_else(Utc::now),
        }
    }
}

/// JSON body posted to the notification backend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Identity the notification concerns
    pub user_id: String,
    /// Always [`NOTIFICATION_EVENT_TYPE`]
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// Detection details
    pub data: NotificationData,
}

/// Detection details inside the notification body.
#[derive(Debug, Serialize)]
pub struct NotificationData {
    pub confidence: f32,
    pub angle: f64,
    pub velocity: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<&NotificationEvent> for NotificationPayload {
    fn from(event: &NotificationEvent) -> Self {
        Self {
            user_id: event.person.to_string(),
            event_type: NOTIFICATION_EVENT_TYPE,
            data: NotificationData {
                confidence: event.confidence,
                angle: event.angle,
                velocity: event.velocity,
                timestamp: event.timestamp,
            },
        }
    }
}

/// Handler for delivering notifications
#[async_trait::async_trait]
pub trait AlertHandler: Send + Sync {
    /// Handler name
    fn name(&self) -> &str;

    /// Deliver one notification
    async fn handle(&self, event: &NotificationEvent) -> Result<()>;
}

/// Console/logging alert handler
pub struct ConsoleAlertHandler;

#[async_trait::async_trait]
impl AlertHandler for ConsoleAlertHandler {
    fn name(&self) -> &str {
        "console"
    }

    async fn handle(&self, event: &NotificationEvent) -> Result<()> {
        println!("\nFALL ALERT {}", "=".repeat(50));
        println!("Person: {}", event.person);
        println!("Confidence: {:.2}", event.confidence);
        println!(
            "Angle: {:.1} deg   Velocity: {:.1} px/s",
            event.angle, event.velocity
        );
        println!("Time: {}", event.timestamp.to_rfc3339());
        println!("{}\n", "=".repeat(61));
        Ok(())
    }
}

/// Posts notifications to the care backend over HTTP.
pub struct BackendAlertHandler {
    client: reqwest::Client,
    endpoint: String,
}

impl BackendAlertHandler {
    /// Creates a handler posting to
    /// `{base_url}/api/v1/notifications/fall-detected` with the given
    /// per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Notification`](crate::ServiceError::Notification)
    /// when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/api/v1/notifications/fall-detected",
                base_url.trim_end_matches('/')
            ),
        })
    }

    /// The full endpoint URL notifications are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl AlertHandler for BackendAlertHandler {
    fn name(&self) -> &str {
        "backend"
    }

    async fn handle(&self, event: &NotificationEvent) -> Result<()> {
        let payload = NotificationPayload::from(event);
        self.client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Fans notifications out to the registered handlers.
pub struct AlertDispatcher {
    handlers: Vec<Box<dyn AlertHandler>>,
    dispatched: AtomicU64,
}

impl AlertDispatcher {
    /// Creates a dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Registers a handler.
    pub fn add_handler(&mut self, handler: Box<dyn AlertHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Notifications dispatched since startup.
    #[must_use]
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Delivers `event` to every handler. Failures are logged per handler
    /// and do not stop delivery to the rest.
    pub async fn dispatch(&self, event: &NotificationEvent) {
        tracing::info!(
            person = %event.person,
            confidence = event.confidence,
            angle = event.angle,
            velocity = event.velocity,
            "Dispatching fall notification"
        );

        for handler in &self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::warn!(
                    person = %event.person,
                    handler = %handler.name(),
                    error = %e,
                    "Handler failed to deliver notification"
                );
            }
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn test_event() -> NotificationEvent {
        NotificationEvent {
            person: PersonId::from("alice"),
            confidence: 0.85,
            angle: 74.0,
            velocity: 120.5,
            timestamp: Utc::now(),
        }
    }

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl AlertHandler for RecordingHandler {
        fn name(&self) -> &str {
            "recording"
        }

        async fn handle(&self, event: &NotificationEvent) -> Result<()> {
            self.seen.lock().push(event.person.to_string());
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait::async_trait]
    impl AlertHandler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _event: &NotificationEvent) -> Result<()> {
            Err(ServiceError::Config("deliberate failure".to_string()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_all_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = AlertDispatcher::new();
        dispatcher.add_handler(Box::new(RecordingHandler { seen: seen.clone() }));
        dispatcher.add_handler(Box::new(RecordingHandler { seen: seen.clone() }));

        dispatcher.dispatch(&test_event()).await;

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(dispatcher.dispatched_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_continues_past_failing_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = AlertDispatcher::new();
        dispatcher.add_handler(Box::new(FailingHandler));
        dispatcher.add_handler(Box::new(RecordingHandler { seen: seen.clone() }));

        dispatcher.dispatch(&test_event()).await;

        assert_eq!(seen.lock().as_slice(), ["alice"]);
        assert_eq!(dispatcher.dispatched_count(), 1);
    }

    #[tokio::test]
    async fn test_console_handler_succeeds() {
        let handler = ConsoleAlertHandler;
        assert_eq!(handler.name(), "console");
        assert!(handler.handle(&test_event()).await.is_ok());
    }

    #[test]
    fn test_payload_wire_format() {
        let event = test_event();
        let payload = NotificationPayload::from(&event);
        let json = serde_json::to_value(&payload).expect("serialize");

        assert_eq!(json["userId"], "alice");
        assert_eq!(json["type"], "FALL_DETECTED");
        assert!((json["data"]["confidence"].as_f64().expect("confidence") - 0.85).abs() < 1e-6);
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn test_backend_endpoint_normalizes_trailing_slash() {
        let handler = BackendAlertHandler::new("http://localhost:3000/", Duration::from_secs(5))
            .expect("client builds");
        assert_eq!(
            handler.endpoint(),
            "http://localhost:3000/api/v1/notifications/fall-detected"
        );
    }
}
