use async_trait::async_trait;
use journey_types::{
    InstanceProperties, JourneyInstanceId, JourneyResult, StateShape, StoredInstance,
};
use std::sync::Arc;

/// Storage interface for journey instances.
#[async_trait]
pub trait JourneyInstanceStore: Send + Sync {
    /// Fetch one instance, whatever its lifecycle status.
    async fn get(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
    ) -> JourneyResult<Option<StoredInstance>>;

    /// Insert a new instance. Fails with `InstanceAlreadyExists` if a record
    /// for `id` exists; existing records are never overwritten.
    async fn create(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
        properties: InstanceProperties,
    ) -> JourneyResult<StoredInstance>;

    /// Replace the whole state snapshot of an active instance.
    async fn replace_state(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
    ) -> JourneyResult<()>;

    /// Mark an instance completed. No-op if already completed.
    async fn complete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()>;

    /// Mark an instance deleted. No-op if already deleted.
    async fn delete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()>;
}

#[async_trait]
impl<T: JourneyInstanceStore + ?Sized> JourneyInstanceStore for Arc<T> {
    async fn get(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
    ) -> JourneyResult<Option<StoredInstance>> {
        (**self).get(id, shape).await
    }

    async fn create(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
        properties: InstanceProperties,
    ) -> JourneyResult<StoredInstance> {
        (**self).create(id, shape, state, properties).await
    }

    async fn replace_state(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
    ) -> JourneyResult<()> {
        (**self).replace_state(id, shape, state).await
    }

    async fn complete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()> {
        (**self).complete(id, shape).await
    }

    async fn delete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()> {
        (**self).delete(id, shape).await
    }
}
