//! In-memory reference implementation of the journey store.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! should use a transactional backend (e.g. PostgreSQL).

use crate::traits::JourneyInstanceStore;
use async_trait::async_trait;
use chrono::Utc;
use journey_types::{
    InstanceProperties, InstanceStatus, JourneyError, JourneyInstanceId, JourneyResult,
    StateShape, StoredInstance,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory journey store, keyed by the identity's canonical storage key.
#[derive(Default)]
pub struct InMemoryJourneyStore {
    instances: RwLock<HashMap<String, StoredInstance>>,
}

impl InMemoryJourneyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored instances, terminal ones included
    pub fn len(&self) -> usize {
        self.instances.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `mutate` to an existing record after checking its shape.
    fn with_record<F>(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        mutate: F,
    ) -> JourneyResult<()>
    where
        F: FnOnce(&mut StoredInstance) -> JourneyResult<()>,
    {
        let mut guard = self
            .instances
            .write()
            .map_err(|_| JourneyError::Backend("journey store lock poisoned".to_string()))?;
        let record = guard
            .get_mut(&id.storage_key())
            .ok_or_else(|| JourneyError::InstanceNotFound(id.clone()))?;
        record.ensure_shape(shape)?;
        mutate(record)
    }
}

#[async_trait]
impl JourneyInstanceStore for InMemoryJourneyStore {
    async fn get(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
    ) -> JourneyResult<Option<StoredInstance>> {
        let guard = self
            .instances
            .read()
            .map_err(|_| JourneyError::Backend("journey store lock poisoned".to_string()))?;
        match guard.get(&id.storage_key()) {
            Some(record) => {
                record.ensure_shape(shape)?;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
        properties: InstanceProperties,
    ) -> JourneyResult<StoredInstance> {
        let mut guard = self
            .instances
            .write()
            .map_err(|_| JourneyError::Backend("journey store lock poisoned".to_string()))?;

        let key = id.storage_key();
        if guard.contains_key(&key) {
            return Err(JourneyError::InstanceAlreadyExists(id.clone()));
        }

        let record = StoredInstance::new(id.clone(), shape.clone(), state, properties);
        guard.insert(key, record.clone());
        Ok(record)
    }

    async fn replace_state(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
    ) -> JourneyResult<()> {
        self.with_record(id, shape, |record| {
            record.ensure_active()?;
            record.state = state;
            record.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn complete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()> {
        self.with_record(id, shape, |record| match record.status() {
            InstanceStatus::Completed => Ok(()),
            InstanceStatus::Deleted => record.ensure_active(),
            InstanceStatus::Active => {
                let now = Utc::now();
                record.completed = true;
                record.completed_at = Some(now);
                record.updated_at = now;
                Ok(())
            }
        })
    }

    async fn delete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()> {
        self.with_record(id, shape, |record| match record.status() {
            InstanceStatus::Deleted => Ok(()),
            InstanceStatus::Completed => record.ensure_active(),
            InstanceStatus::Active => {
                let now = Utc::now();
                record.deleted = true;
                record.deleted_at = Some(now);
                record.updated_at = now;
                Ok(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn alert_shape() -> StateShape {
        StateShape::new("AlertState")
    }

    fn alert_id() -> JourneyInstanceId {
        JourneyInstanceId::new("add-alert")
            .with_key("personId", "42")
            .with_key("_key", "T1")
    }

    async fn seeded() -> InMemoryJourneyStore {
        let store = InMemoryJourneyStore::new();
        store
            .create(&alert_id(), &alert_shape(), json!({ "step": 1 }), InstanceProperties::new())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = seeded().await;
        let record = store.get(&alert_id(), &alert_shape()).await.unwrap().unwrap();
        assert_eq!(record.state, json!({ "step": 1 }));
        assert_eq!(record.status(), InstanceStatus::Active);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_ignores_key_order() {
        let store = seeded().await;
        let reordered = JourneyInstanceId::new("add-alert")
            .with_key("_key", "T1")
            .with_key("personId", "42");
        assert!(store.get(&reordered, &alert_shape()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_never_overwrites() {
        let store = seeded().await;
        let result = store
            .create(&alert_id(), &alert_shape(), json!({ "step": 9 }), InstanceProperties::new())
            .await;
        assert!(matches!(result, Err(JourneyError::InstanceAlreadyExists(_))));

        let record = store.get(&alert_id(), &alert_shape()).await.unwrap().unwrap();
        assert_eq!(record.state, json!({ "step": 1 }));
    }

    #[tokio::test]
    async fn concurrent_creates_have_one_winner() {
        let store = Arc::new(InMemoryJourneyStore::new());
        let id = alert_id();

        let tasks = (0..8).map(|i| {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move {
                store
                    .create(&id, &alert_shape(), json!({ "writer": i }), InstanceProperties::new())
                    .await
            })
        });

        let mut created = 0;
        let mut collisions = 0;
        for task in tasks.collect::<Vec<_>>() {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(JourneyError::InstanceAlreadyExists(_)) => collisions += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(collisions, 7);
    }

    #[tokio::test]
    async fn shape_mismatch_leaves_record_untouched() {
        let store = seeded().await;
        let other = StateShape::new("OtherState");

        assert!(matches!(
            store.get(&alert_id(), &other).await,
            Err(JourneyError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            store.replace_state(&alert_id(), &other, json!({ "x": 1 })).await,
            Err(JourneyError::ShapeMismatch { .. })
        ));
        assert!(store.complete(&alert_id(), &other).await.is_err());
        assert!(store.delete(&alert_id(), &other).await.is_err());

        let record = store.get(&alert_id(), &alert_shape()).await.unwrap().unwrap();
        assert_eq!(record.state, json!({ "step": 1 }));
        assert_eq!(record.status(), InstanceStatus::Active);
    }

    #[tokio::test]
    async fn replace_state_requires_active_record() {
        let store = seeded().await;
        store
            .replace_state(&alert_id(), &alert_shape(), json!({ "step": 2 }))
            .await
            .unwrap();
        store.complete(&alert_id(), &alert_shape()).await.unwrap();

        let result = store
            .replace_state(&alert_id(), &alert_shape(), json!({ "step": 3 }))
            .await;
        assert!(matches!(
            result,
            Err(JourneyError::InstanceClosed {
                status: InstanceStatus::Completed,
                ..
            })
        ));

        let record = store.get(&alert_id(), &alert_shape()).await.unwrap().unwrap();
        assert_eq!(record.state, json!({ "step": 2 }));
    }

    #[tokio::test]
    async fn replace_state_on_missing_record() {
        let store = InMemoryJourneyStore::new();
        let result = store
            .replace_state(&alert_id(), &alert_shape(), json!({}))
            .await;
        assert!(matches!(result, Err(JourneyError::InstanceNotFound(_))));
    }

    #[tokio::test]
    async fn terminal_transitions_are_idempotent() {
        let store = seeded().await;
        store.complete(&alert_id(), &alert_shape()).await.unwrap();
        store.complete(&alert_id(), &alert_shape()).await.unwrap();
        let record = store.get(&alert_id(), &alert_shape()).await.unwrap().unwrap();
        assert!(record.completed);
        assert!(record.completed_at.is_some());

        let other = JourneyInstanceId::new("add-alert").with_key("personId", "7");
        store
            .create(&other, &alert_shape(), json!({}), InstanceProperties::new())
            .await
            .unwrap();
        store.delete(&other, &alert_shape()).await.unwrap();
        store.delete(&other, &alert_shape()).await.unwrap();
        let record = store.get(&other, &alert_shape()).await.unwrap().unwrap();
        assert!(record.deleted);
        assert!(!record.completed);
    }

    #[tokio::test]
    async fn no_transition_between_terminal_states() {
        let store = seeded().await;
        store.complete(&alert_id(), &alert_shape()).await.unwrap();
        assert!(matches!(
            store.delete(&alert_id(), &alert_shape()).await,
            Err(JourneyError::InstanceClosed { .. })
        ));
    }
}
