//! Shared instance handles
//!
//! A handle wraps the typed instance behind a lock. Readers see the state the
//! store last accepted; only the manager publishes new state or status.

use chrono::Utc;
use journey_types::{InstanceStatus, JourneyInstance, JourneyInstanceId, JourneyState};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// Shared handle to a decoded journey instance.
///
/// Every consumer within one request holds a clone of the same handle, so a
/// state change made through the manager is visible to all of them. Mutation
/// only goes through [`crate::JourneyManager`].
pub struct JourneyInstanceHandle<S> {
    inner: Arc<RwLock<JourneyInstance<S>>>,
}

impl<S> Clone for JourneyInstanceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: JourneyState> JourneyInstanceHandle<S> {
    pub(crate) fn new(instance: JourneyInstance<S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(instance)),
        }
    }

    pub fn id(&self) -> JourneyInstanceId {
        self.inner.read().id.clone()
    }

    /// Clone of the current state
    pub fn state(&self) -> S {
        self.inner.read().state.clone()
    }

    /// Clone of the whole instance
    pub fn snapshot(&self) -> JourneyInstance<S> {
        self.inner.read().clone()
    }

    /// Borrow the instance. Do not hold the guard across an `.await`.
    pub fn read(&self) -> RwLockReadGuard<'_, JourneyInstance<S>> {
        self.inner.read()
    }

    pub fn status(&self) -> InstanceStatus {
        self.inner.read().status()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.read().completed
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.read().deleted
    }

    pub fn property(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.read().properties.get(key).cloned()
    }

    /// Whether both handles point at the same memoized instance
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn publish_state(&self, state: S) {
        let mut guard = self.inner.write();
        guard.state = state;
        guard.updated_at = Utc::now();
    }

    pub(crate) fn mark(&self, status: InstanceStatus) {
        let mut guard = self.inner.write();
        match status {
            InstanceStatus::Completed => guard.completed = true,
            InstanceStatus::Deleted => guard.deleted = true,
            InstanceStatus::Active => return,
        }
        guard.updated_at = Utc::now();
    }
}

impl<S: JourneyState + std::fmt::Debug> std::fmt::Debug for JourneyInstanceHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("JourneyInstanceHandle")
            .field(&*self.inner.read())
            .finish()
    }
}
