//! Per-request context
//!
//! A [`RequestScope`] lives exactly as long as one request. It carries the
//! journey the route is bound to, the request's composite value source and the
//! memo of instance handles resolved so far, keyed by journey name.
//!
//! Resolution for one journey is serialized through a per-journey gate, so
//! concurrent consumers within a request never race each other to the store.

use crate::binding::CompositeValueSource;
use crate::handle::JourneyInstanceHandle;
use journey_types::{JourneyError, JourneyName, JourneyResult, JourneyState, StateShape};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

struct MemoEntry {
    shape: StateShape,
    handle: Box<dyn Any + Send + Sync>,
}

impl MemoEntry {
    fn downcast<S: JourneyState>(&self) -> JourneyResult<JourneyInstanceHandle<S>> {
        self.handle
            .downcast_ref::<JourneyInstanceHandle<S>>()
            .cloned()
            .ok_or_else(|| JourneyError::ShapeMismatch {
                expected: StateShape::of::<S>(),
                actual: self.shape.clone(),
            })
    }
}

/// Request-scoped binding and instance memo
#[derive(Default)]
pub struct RequestScope {
    journey: Option<JourneyName>,
    values: CompositeValueSource,
    instances: Mutex<HashMap<JourneyName, MemoEntry>>,
    gates: Mutex<HashMap<JourneyName, Arc<tokio::sync::Mutex<()>>>>,
}

impl RequestScope {
    pub fn new(values: CompositeValueSource) -> Self {
        Self {
            journey: None,
            values,
            instances: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_journey(journey: impl Into<JourneyName>, values: CompositeValueSource) -> Self {
        Self::new(values).with_journey(journey)
    }

    pub fn with_journey(mut self, journey: impl Into<JourneyName>) -> Self {
        self.journey = Some(journey.into());
        self
    }

    /// The journey this request is bound to, if any
    pub fn journey(&self) -> Option<&JourneyName> {
        self.journey.as_ref()
    }

    pub fn values(&self) -> &CompositeValueSource {
        &self.values
    }

    /// Fetch a memoized handle. A handle memoized under a different state type
    /// yields `ShapeMismatch`.
    pub fn memoized<S: JourneyState>(
        &self,
        journey: &JourneyName,
    ) -> JourneyResult<Option<JourneyInstanceHandle<S>>> {
        match self.instances.lock().get(journey) {
            Some(entry) => entry.downcast::<S>().map(Some),
            None => Ok(None),
        }
    }

    /// Memoize `handle` unless an entry already exists; returns the entry that
    /// ends up in the memo.
    pub(crate) fn memoize<S: JourneyState>(
        &self,
        journey: &JourneyName,
        handle: JourneyInstanceHandle<S>,
    ) -> JourneyResult<JourneyInstanceHandle<S>> {
        let mut instances = self.instances.lock();
        if let Some(entry) = instances.get(journey) {
            return entry.downcast::<S>();
        }
        instances.insert(
            journey.clone(),
            MemoEntry {
                shape: StateShape::of::<S>(),
                handle: Box::new(handle.clone()),
            },
        );
        Ok(handle)
    }

    /// Gate held across resolve-or-create for `journey`
    pub(crate) fn gate(&self, journey: &JourneyName) -> Arc<tokio::sync::Mutex<()>> {
        self.gates
            .lock()
            .entry(journey.clone())
            .or_default()
            .clone()
    }

    /// Drop the memo entry for `journey`
    pub fn forget(&self, journey: &JourneyName) -> bool {
        self.instances.lock().remove(journey).is_some()
    }

    pub fn memo_len(&self) -> usize {
        self.instances.lock().len()
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("journey", &self.journey)
            .field("values", &self.values)
            .field("memoized", &self.memo_len())
            .finish()
    }
}
