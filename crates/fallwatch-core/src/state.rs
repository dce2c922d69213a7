//! Per-identity engine state and its lifecycle store.
//!
//! Every tracked person owns exactly one [`PersonState`] holding the
//! velocity baseline (last observation) and the notification cooldown
//! anchor. The [`PersonStateStore`] provides the lifecycle API
//! (get-or-create, update, reset, evict-on-disconnect) with per-identity
//! serialization: the outer map lock is held only for lookup and insert,
//! while each entry carries its own mutex so concurrent scoring calls for
//! the same identity cannot interleave and corrupt the baseline.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::types::{BoundingBox, PersonId, Timestamp};

/// One scored observation retained as the next frame's velocity baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// When the observation was scored
    pub timestamp: Timestamp,
    /// Bounding box of the person, when one was visible
    pub bbox: Option<BoundingBox>,
    /// Body angle at the observation (degrees)
    pub angle: f64,
}

/// Mutable per-identity state: velocity baseline plus notification anchor.
#[derive(Debug, Default)]
pub struct PersonState {
    last_observation: Option<Observation>,
    last_notification: Option<Timestamp>,
}

impl PersonState {
    /// Returns the retained baseline observation, if any.
    #[must_use]
    pub fn last_observation(&self) -> Option<&Observation> {
        self.last_observation.as_ref()
    }

    /// Replaces the baseline observation.
    pub fn observe(&mut self, observation: Observation) {
        self.last_observation = Some(observation);
    }

    /// Drops the baseline observation; the next frame scores cold.
    pub fn clear_observation(&mut self) {
        self.last_observation = None;
    }

    /// Returns the time of the last outbound notification, if any.
    #[must_use]
    pub fn last_notification(&self) -> Option<&Timestamp> {
        self.last_notification.as_ref()
    }

    /// Records an outbound notification at `now`.
    pub fn record_notification(&mut self, now: Timestamp) {
        self.last_notification = Some(now);
    }

    /// Clears the notification anchor; the next fall may notify immediately.
    pub fn clear_notification(&mut self) {
        self.last_notification = None;
    }
}

/// Store of per-identity state with a documented lifecycle.
///
/// Resetting an identity detaches its entry: a scoring call already holding
/// the detached entry's lock completes against it, and the discarded
/// baseline is simply never read again. The next call for that identity
/// starts cold.
#[derive(Debug, Default)]
pub struct PersonStateStore {
    entries: RwLock<HashMap<PersonId, Arc<Mutex<PersonState>>>>,
}

impl PersonStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `person`, creating it on first sight.
    #[must_use]
    pub fn get_or_create(&self, person: &PersonId) -> Arc<Mutex<PersonState>> {
        if let Some(entry) = self.entries.read().get(person) {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(person.clone())
                .or_insert_with(|| Arc::new(Mutex::new(PersonState::default()))),
        )
    }

    /// Runs `f` against the identity's state under its per-entry lock.
    pub fn with_state<F, R>(&self, person: &PersonId, f: F) -> R
    where
        F: FnOnce(&mut PersonState) -> R,
    {
        let entry = self.get_or_create(person);
        let mut state = entry.lock();
        f(&mut state)
    }

    /// Evicts the identity's state entirely.
    ///
    /// Idempotent: returns `false` when there was nothing to evict.
    pub fn reset(&self, person: &PersonId) -> bool {
        self.entries.write().remove(person).is_some()
    }

    /// Returns `true` if the identity currently has state.
    #[must_use]
    pub fn contains(&self, person: &PersonId) -> bool {
        self.entries.read().contains_key(person)
    }

    /// Number of identities currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` when no identity is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str) -> PersonId {
        PersonId::new(name)
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let store = PersonStateStore::new();
        assert!(store.is_empty());

        let a = store.get_or_create(&person("a"));
        let a_again = store.get_or_create(&person("a"));
        assert!(Arc::ptr_eq(&a, &a_again));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_with_state_mutates() {
        let store = PersonStateStore::new();
        store.with_state(&person("a"), |state| {
            state.record_notification(Timestamp::new(5, 0));
        });
        let anchored = store.with_state(&person("a"), |state| state.last_notification().copied());
        assert_eq!(anchored, Some(Timestamp::new(5, 0)));
    }

    #[test]
    fn test_reset_evicts_and_is_idempotent() {
        let store = PersonStateStore::new();
        store.with_state(&person("a"), |state| {
            state.observe(Observation {
                timestamp: Timestamp::new(1, 0),
                bbox: None,
                angle: 12.0,
            });
        });
        assert!(store.contains(&person("a")));

        assert!(store.reset(&person("a")));
        assert!(!store.contains(&person("a")));
        assert!(!store.reset(&person("a")));

        // Fresh entry starts cold
        let baseline = store.with_state(&person("a"), |state| state.last_observation().copied());
        assert!(baseline.is_none());
    }

    #[test]
    fn test_identities_are_independent() {
        let store = PersonStateStore::new();
        store.with_state(&person("a"), |state| {
            state.record_notification(Timestamp::new(10, 0));
        });
        store.with_state(&person("b"), |state| {
            state.record_notification(Timestamp::new(20, 0));
        });

        store.reset(&person("a"));
        let b = store.with_state(&person("b"), |state| state.last_notification().copied());
        assert_eq!(b, Some(Timestamp::new(20, 0)));
    }

    #[test]
    fn test_parallel_updates_do_not_interleave() {
        let store = Arc::new(PersonStateStore::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    store.with_state(&person("shared"), |state| {
                        state.observe(Observation {
                            timestamp: Timestamp::new(i, 0),
                            bbox: Some(BoundingBox::new(0, 0, 10, 10)),
                            angle: 0.0,
                        });
                    });
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        // One live entry, with some fully-written observation
        assert_eq!(store.len(), 1);
        let last = store.with_state(&person("shared"), |state| state.last_observation().copied());
        assert!(last.is_some());
    }
}
