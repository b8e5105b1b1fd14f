//! Instance lifecycle manager
//!
//! [`JourneyManager`] resolves, creates, updates and closes journey instances
//! against a [`JourneyInstanceStore`]. Resolution is memoized in the caller's
//! [`RequestScope`], so every consumer within one request shares one handle.
//! Resolve-or-create runs under the journey's scope gate.

use crate::codec::{IdentityCodec, UniqueKeyGenerator};
use crate::handle::JourneyInstanceHandle;
use crate::registry::JourneyRegistry;
use crate::scope::RequestScope;
use futures::future::BoxFuture;
use journey_store::JourneyInstanceStore;
use journey_types::{
    InstanceProperties, InstanceStatus, JourneyDescriptor, JourneyError, JourneyInstance,
    JourneyInstanceId, JourneyName, JourneyResult, JourneyState, StateShape,
};
use std::future::Future;
use std::sync::Arc;

// ── State Seeds ──────────────────────────────────────────────────────

/// Initial state for a new instance, evaluated only when a create happens
pub enum StateSeed<S> {
    Value(S),
    Factory(Box<dyn FnOnce() -> S + Send>),
    Deferred(BoxFuture<'static, JourneyResult<S>>),
}

impl<S: JourneyState> StateSeed<S> {
    pub fn value(state: S) -> Self {
        StateSeed::Value(state)
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: FnOnce() -> S + Send + 'static,
    {
        StateSeed::Factory(Box::new(f))
    }

    /// Seed from an async, fallible computation such as a lookup of the
    /// entity being edited
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = JourneyResult<S>> + Send + 'static,
    {
        StateSeed::Deferred(Box::pin(fut))
    }

    pub async fn resolve(self) -> JourneyResult<S> {
        match self {
            StateSeed::Value(state) => Ok(state),
            StateSeed::Factory(f) => Ok(f()),
            StateSeed::Deferred(fut) => fut.await,
        }
    }
}

impl<S: JourneyState> From<S> for StateSeed<S> {
    fn from(state: S) -> Self {
        StateSeed::Value(state)
    }
}

impl<S> std::fmt::Debug for StateSeed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            StateSeed::Value(_) => "Value",
            StateSeed::Factory(_) => "Factory",
            StateSeed::Deferred(_) => "Deferred",
        };
        f.debug_tuple("StateSeed").field(&kind).finish()
    }
}

// ── Manager ──────────────────────────────────────────────────────────

/// Orchestrates the journey instance lifecycle
#[derive(Clone)]
pub struct JourneyManager {
    registry: JourneyRegistry,
    store: Arc<dyn JourneyInstanceStore>,
    codec: IdentityCodec,
}

impl JourneyManager {
    pub fn new(registry: JourneyRegistry, store: Arc<dyn JourneyInstanceStore>) -> Self {
        Self {
            registry,
            store,
            codec: IdentityCodec::new(),
        }
    }

    pub fn with_key_generator(mut self, generator: Arc<dyn UniqueKeyGenerator>) -> Self {
        self.codec = IdentityCodec::with_generator(generator);
        self
    }

    pub fn registry(&self) -> &JourneyRegistry {
        &self.registry
    }

    pub fn codec(&self) -> &IdentityCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn JourneyInstanceStore> {
        &self.store
    }

    /// Resolve the instance the request refers to.
    ///
    /// Returns `None` when the request does not carry a complete identity or
    /// no record exists for it. Records are returned whatever their status.
    pub async fn get_instance<S: JourneyState>(
        &self,
        scope: &RequestScope,
    ) -> JourneyResult<Option<JourneyInstanceHandle<S>>> {
        let descriptor = self.bound_descriptor::<S>(scope)?;
        let gate = scope.gate(&descriptor.name);
        let _resolving = gate.lock().await;
        self.resolve_gated(scope, descriptor).await
    }

    /// Memo, then codec, then store. Callers hold the journey's gate.
    async fn resolve_gated<S: JourneyState>(
        &self,
        scope: &RequestScope,
        descriptor: &JourneyDescriptor,
    ) -> JourneyResult<Option<JourneyInstanceHandle<S>>> {
        if let Some(handle) = scope.memoized::<S>(&descriptor.name)? {
            tracing::debug!(journey = %descriptor.name, "Journey instance memo hit");
            return Ok(Some(handle));
        }

        let id = match self.codec.try_resolve(descriptor, scope.values()) {
            Ok(id) => id,
            Err(err) if err.is_unresolved() => {
                tracing::debug!(
                    journey = %descriptor.name,
                    reason = %err,
                    "Journey instance unresolved"
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let Some(record) = self.store.get(&id, &descriptor.state_shape).await? else {
            tracing::debug!(
                journey = %descriptor.name,
                instance = %id,
                "Journey instance not found"
            );
            return Ok(None);
        };

        let handle = JourneyInstanceHandle::new(record.decode::<S>()?);
        tracing::debug!(
            journey = %descriptor.name,
            instance = %id,
            status = %handle.status(),
            "Journey instance resolved"
        );
        scope.memoize(&descriptor.name, handle).map(Some)
    }

    /// Resolve the instance, creating it from `seed` if none exists.
    ///
    /// Within one scope, repeated calls return the same handle and the store
    /// sees at most one create.
    pub async fn get_or_create_instance<S: JourneyState>(
        &self,
        scope: &RequestScope,
        seed: impl Into<StateSeed<S>>,
    ) -> JourneyResult<JourneyInstanceHandle<S>> {
        let descriptor = self.bound_descriptor::<S>(scope)?;
        let gate = scope.gate(&descriptor.name);
        let _resolving = gate.lock().await;

        if let Some(handle) = self.resolve_gated::<S>(scope, descriptor).await? {
            return Ok(handle);
        }
        let handle = self
            .create_handle(scope, descriptor, seed.into(), InstanceProperties::new())
            .await?;
        scope.memoize(&descriptor.name, handle)
    }

    /// Create a new instance for a freshly computed identity.
    ///
    /// Fails with `InstanceAlreadyExists` if a record for that identity exists.
    pub async fn create_instance<S: JourneyState>(
        &self,
        scope: &RequestScope,
        seed: impl Into<StateSeed<S>>,
    ) -> JourneyResult<JourneyInstanceHandle<S>> {
        self.create_instance_with_properties(scope, seed, InstanceProperties::new())
            .await
    }

    pub async fn create_instance_with_properties<S: JourneyState>(
        &self,
        scope: &RequestScope,
        seed: impl Into<StateSeed<S>>,
        properties: InstanceProperties,
    ) -> JourneyResult<JourneyInstanceHandle<S>> {
        let descriptor = self.bound_descriptor::<S>(scope)?;
        let gate = scope.gate(&descriptor.name);
        let _resolving = gate.lock().await;

        let handle = self
            .create_handle(scope, descriptor, seed.into(), properties)
            .await?;
        scope.forget(&descriptor.name);
        scope.memoize(&descriptor.name, handle)
    }

    /// Apply `updater` to a copy of the state and persist the whole snapshot.
    ///
    /// The handle only observes the new state once the store accepted it.
    pub async fn update_state<S, F>(
        &self,
        handle: &JourneyInstanceHandle<S>,
        updater: F,
    ) -> JourneyResult<()>
    where
        S: JourneyState,
        F: FnOnce(&mut S) + Send,
    {
        let (id, mut state) = {
            let instance = handle.read();
            instance.ensure_active()?;
            (instance.id.clone(), instance.state.clone())
        };

        updater(&mut state);
        let snapshot = serde_json::to_value(&state)?;
        self.store
            .replace_state(&id, &StateShape::of::<S>(), snapshot)
            .await?;
        handle.publish_state(state);

        tracing::debug!(journey = %id.journey(), instance = %id, "Journey state replaced");
        Ok(())
    }

    /// Mark the instance completed. No-op if it already is.
    pub async fn complete<S: JourneyState>(
        &self,
        handle: &JourneyInstanceHandle<S>,
    ) -> JourneyResult<()> {
        self.close(handle, InstanceStatus::Completed).await
    }

    /// Mark the instance deleted. No-op if it already is.
    pub async fn delete<S: JourneyState>(
        &self,
        handle: &JourneyInstanceHandle<S>,
    ) -> JourneyResult<()> {
        self.close(handle, InstanceStatus::Deleted).await
    }

    async fn close<S: JourneyState>(
        &self,
        handle: &JourneyInstanceHandle<S>,
        target: InstanceStatus,
    ) -> JourneyResult<()> {
        let id = handle.id();
        match handle.status() {
            status if status == target => return Ok(()),
            InstanceStatus::Active => {}
            status => return Err(JourneyError::InstanceClosed { id, status }),
        }

        let shape = StateShape::of::<S>();
        match target {
            InstanceStatus::Completed => self.store.complete(&id, &shape).await?,
            InstanceStatus::Deleted => self.store.delete(&id, &shape).await?,
            InstanceStatus::Active => return Ok(()),
        }
        handle.mark(target);

        tracing::info!(
            journey = %id.journey(),
            instance = %id,
            status = %target,
            "Journey instance closed"
        );
        Ok(())
    }

    /// Serialize the identity of `handle` as the token carried across requests
    pub fn token<S: JourneyState>(&self, handle: &JourneyInstanceHandle<S>) -> String {
        self.codec.serialize(&handle.id())
    }

    /// The descriptor bound to `scope`, checked against `S`
    fn bound_descriptor<S: JourneyState>(
        &self,
        scope: &RequestScope,
    ) -> JourneyResult<&JourneyDescriptor> {
        let name = scope.journey().ok_or(JourneyError::NoJourneyBound)?;
        self.descriptor_for::<S>(name)
    }

    /// The registered descriptor for `journey`, provided its state shape is
    /// the one `S` declares.
    ///
    /// Fails with `UnknownJourney` or `ShapeMismatch`; web filters call this
    /// when they are built so a misconfigured route fails at startup.
    pub fn descriptor_for<S: JourneyState>(
        &self,
        journey: &JourneyName,
    ) -> JourneyResult<&JourneyDescriptor> {
        let descriptor = self.registry.get(journey)?;

        let requested = StateShape::of::<S>();
        if descriptor.state_shape != requested {
            tracing::warn!(
                journey = %descriptor.name,
                expected = %descriptor.state_shape,
                actual = %requested,
                "State type does not match journey descriptor"
            );
            return Err(JourneyError::ShapeMismatch {
                expected: descriptor.state_shape.clone(),
                actual: requested,
            });
        }
        Ok(descriptor)
    }

    async fn create_handle<S: JourneyState>(
        &self,
        scope: &RequestScope,
        descriptor: &JourneyDescriptor,
        seed: StateSeed<S>,
        properties: InstanceProperties,
    ) -> JourneyResult<JourneyInstanceHandle<S>> {
        let id = self.codec.create(descriptor, scope.values())?;
        let state = seed.resolve().await?;
        let snapshot = serde_json::to_value(&state)?;

        let record = match self
            .store
            .create(&id, &descriptor.state_shape, snapshot, properties)
            .await
        {
            Ok(record) => record,
            Err(err @ JourneyError::InstanceAlreadyExists(_)) => {
                tracing::error!(
                    journey = %descriptor.name,
                    instance = %id,
                    "Journey instance already exists"
                );
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        tracing::info!(journey = %descriptor.name, instance = %id, "Journey instance created");
        let instance = typed_instance(record.id, state, record.properties, record.created_at);
        Ok(JourneyInstanceHandle::new(instance))
    }
}

fn typed_instance<S>(
    id: JourneyInstanceId,
    state: S,
    properties: InstanceProperties,
    created_at: chrono::DateTime<chrono::Utc>,
) -> JourneyInstance<S> {
    JourneyInstance {
        id,
        state,
        properties,
        completed: false,
        deleted: false,
        created_at,
        updated_at: created_at,
    }
}

impl std::fmt::Debug for JourneyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyManager")
            .field("journeys", &self.registry.len())
            .finish_non_exhaustive()
    }
}
