//! Per-identity notification debouncing.
//!
//! A detected fall does not imply an outbound alert: the gate allows at most
//! one notification per cooldown window per identity, however many frames
//! score as falls inside the window. The anchor time lives in
//! [`PersonState`](crate::state::PersonState), so evicting an identity also
//! clears its gate.

use crate::state::PersonState;
use crate::types::Timestamp;

/// Cooldown gate for outbound fall notifications.
#[derive(Debug, Clone)]
pub struct NotificationGate {
    cooldown_secs: f64,
}

impl NotificationGate {
    /// Creates a gate with the given cooldown (negative values read as 0).
    #[must_use]
    pub fn new(cooldown_secs: f64) -> Self {
        Self {
            cooldown_secs: cooldown_secs.max(0.0),
        }
    }

    /// Returns the configured cooldown in seconds.
    #[must_use]
    pub fn cooldown_secs(&self) -> f64 {
        self.cooldown_secs
    }

    /// Decides whether a scored frame may notify, updating the anchor when
    /// it does.
    ///
    /// Returns `false` immediately when `fall_detected` is false, leaving
    /// the anchor untouched. Otherwise passes iff the identity has no anchor
    /// yet or the cooldown has elapsed since it; on pass, `now` becomes the
    /// new anchor. A `now` earlier than the anchor (clock skew) never
    /// passes.
    pub fn evaluate(&self, state: &mut PersonState, now: Timestamp, fall_detected: bool) -> bool {
        if !fall_detected {
            return false;
        }

        let pass = match state.last_notification() {
            None => true,
            Some(last) => now.duration_since(last) >= self.cooldown_secs,
        };

        if pass {
            state.record_notification(now);
        }
        pass
    }
}
