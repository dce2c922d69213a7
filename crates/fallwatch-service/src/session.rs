//! Session bookkeeping.
//!
//! Tracks which identities currently have an active capture path into the
//! service and counts the frames they have sent. The registry is pure
//! bookkeeping for the health endpoint and logs; detector state lives in the
//! engine's own store and has its own lifecycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use fallwatch_core::PersonId;

/// How frames for a session reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Registered via the start-camera-detection endpoint
    Camera,
    /// WebSocket fall-detection stream
    FallStream,
    /// WebSocket camera stream
    CameraStream,
}

impl SessionKind {
    /// Lowercase label for logs and payloads.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::FallStream => "fall_stream",
            Self::CameraStream => "camera_stream",
        }
    }
}

/// A live session for one identity.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// How the session was opened
    pub kind: SessionKind,
    /// When the session was opened
    pub started_at: DateTime<Utc>,
    /// Frames scored during the session
    pub frames: u64,
    /// Fall-positive results during the session
    pub falls: u64,
    /// Whether the most recent scored frame was a fall
    pub falling: bool,
    /// When the most recent frame was scored
    pub last_result_at: Option<DateTime<Utc>>,
}

/// In-memory registry of active sessions, one per identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PersonId, SessionInfo>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session for `person`. Returns `false` when a session was
    /// already active, in which case the existing session is left untouched.
    pub fn start(&self, person: PersonId, kind: SessionKind) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&person) {
            return false;
        }
        sessions.insert(
            person,
            SessionInfo {
                kind,
                started_at: Utc::now(),
                frames: 0,
                falls: 0,
                falling: false,
                last_result_at: None,
            },
        );
        true
    }

    /// Closes the session for `person`, returning it when one was active.
    pub fn stop(&self, person: &PersonId) -> Option<SessionInfo> {
        self.sessions.write().remove(person)
    }

    /// Records a scored result for an active session. Frames scored outside
    /// a session (one-shot detect calls) are not counted.
    pub fn record_result(&self, person: &PersonId, fall_detected: bool) {
        if let Some(session) = self.sessions.write().get_mut(person) {
            session.frames += 1;
            session.falling = fall_detected;
            if fall_detected {
                session.falls += 1;
            }
            session.last_result_at = Some(Utc::now());
        }
    }

    /// Whether `person` has an active session.
    #[must_use]
    pub fn is_active(&self, person: &PersonId) -> bool {
        self.sessions.read().contains_key(person)
    }

    /// Snapshot of the session for `person`.
    #[must_use]
    pub fn get(&self, person: &PersonId) -> Option<SessionInfo> {
        self.sessions.read().get(person).cloned()
    }

    /// Number of active sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_exclusive_per_identity() {
        let registry = SessionRegistry::new();
        let person = PersonId::from("alice");

        assert!(registry.start(person.clone(), SessionKind::Camera));
        assert!(!registry.start(person.clone(), SessionKind::FallStream));

        // The original session survives the rejected second start
        let info = registry.get(&person).expect("session active");
        assert_eq!(info.kind, SessionKind::Camera);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_stop_returns_session_once() {
        let registry = SessionRegistry::new();
        let person = PersonId::from("alice");

        registry.start(person.clone(), SessionKind::FallStream);
        assert!(registry.stop(&person).is_some());
        assert!(registry.stop(&person).is_none());
        assert!(!registry.is_active(&person));
    }

    #[test]
    fn test_frames_counted_only_inside_session() {
        let registry = SessionRegistry::new();
        let person = PersonId::from("alice");

        // No session yet: not counted
        registry.record_result(&person, false);
        assert!(registry.get(&person).is_none());

        registry.start(person.clone(), SessionKind::CameraStream);
        registry.record_result(&person, false);
        registry.record_result(&person, false);
        assert_eq!(registry.get(&person).expect("active").frames, 2);
    }

    #[test]
    fn test_fall_bookkeeping_follows_results() {
        let registry = SessionRegistry::new();
        let person = PersonId::from("alice");
        registry.start(person.clone(), SessionKind::Camera);

        registry.record_result(&person, true);
        let info = registry.get(&person).expect("active");
        assert_eq!(info.falls, 1);
        assert!(info.falling);
        assert!(info.last_result_at.is_some());

        // A clean frame clears the falling flag but keeps the fall count
        registry.record_result(&person, false);
        let info = registry.get(&person).expect("active");
        assert_eq!(info.falls, 1);
        assert!(!info.falling);
        assert_eq!(info.frames, 2);
    }

    #[test]
    fn test_sessions_are_independent() {
        let registry = SessionRegistry::new();
        registry.start(PersonId::from("alice"), SessionKind::Camera);
        registry.start(PersonId::from("bob"), SessionKind::FallStream);

        registry.record_result(&PersonId::from("alice"), false);

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get(&PersonId::from("alice")).expect("alice").frames, 1);
        assert_eq!(registry.get(&PersonId::from("bob")).expect("bob").frames, 0);
    }
}
