//! Journey registry: the catalog of journey descriptors
//!
//! Descriptors are collected by a [`JourneyRegistryBuilder`] during startup and
//! frozen into a [`JourneyRegistry`] before traffic is accepted. The frozen
//! registry is an immutable shared map, so lookups take no lock.

use journey_types::{JourneyDescriptor, JourneyError, JourneyName, JourneyResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Collects descriptors during startup
#[derive(Clone, Debug, Default)]
pub struct JourneyRegistryBuilder {
    descriptors: HashMap<JourneyName, JourneyDescriptor>,
}

impl JourneyRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a journey descriptor
    ///
    /// Validates the descriptor and rejects a name that is already taken.
    pub fn register(&mut self, descriptor: JourneyDescriptor) -> JourneyResult<&mut Self> {
        descriptor.validate()?;

        if self.descriptors.contains_key(&descriptor.name) {
            return Err(JourneyError::DuplicateJourney(descriptor.name));
        }

        tracing::info!(
            journey = %descriptor.name,
            shape = %descriptor.state_shape,
            keys = descriptor.keys.len(),
            unique_key = descriptor.append_unique_key,
            "Journey registered"
        );
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(self)
    }

    /// Freeze the catalog
    pub fn build(self) -> JourneyRegistry {
        tracing::debug!(journeys = self.descriptors.len(), "Journey registry frozen");
        JourneyRegistry {
            descriptors: Arc::new(self.descriptors),
        }
    }
}

/// Frozen, cheaply cloneable catalog of journey descriptors
#[derive(Clone, Debug, Default)]
pub struct JourneyRegistry {
    descriptors: Arc<HashMap<JourneyName, JourneyDescriptor>>,
}

impl JourneyRegistry {
    pub fn builder() -> JourneyRegistryBuilder {
        JourneyRegistryBuilder::new()
    }

    /// Look up a descriptor by name
    pub fn lookup(&self, name: &JourneyName) -> Option<&JourneyDescriptor> {
        self.descriptors.get(name)
    }

    /// Look up a descriptor, failing with `UnknownJourney` if absent
    pub fn get(&self, name: &JourneyName) -> JourneyResult<&JourneyDescriptor> {
        self.lookup(name)
            .ok_or_else(|| JourneyError::UnknownJourney(name.clone()))
    }

    pub fn contains(&self, name: &JourneyName) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registered journey names, sorted
    pub fn names(&self) -> Vec<&JourneyName> {
        let mut names: Vec<_> = self.descriptors.keys().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_types::StateShape;

    fn descriptor(name: &str) -> JourneyDescriptor {
        JourneyDescriptor::new(name, StateShape::new("TestState")).with_key("personId")
    }

    #[test]
    fn test_register_and_lookup() {
        let mut builder = JourneyRegistry::builder();
        builder
            .register(descriptor("add-alert"))
            .unwrap()
            .register(descriptor("close-alert"))
            .unwrap();
        let registry = builder.build();

        assert_eq!(registry.len(), 2);
        let found = registry.lookup(&"add-alert".into()).unwrap();
        assert_eq!(found.state_shape.as_str(), "TestState");
        assert_eq!(
            registry.names(),
            vec![&JourneyName::new("add-alert"), &JourneyName::new("close-alert")]
        );
    }

    #[test]
    fn test_register_duplicate() {
        let mut builder = JourneyRegistry::builder();
        builder.register(descriptor("add-alert")).unwrap();
        let result = builder.register(descriptor("add-alert"));
        assert!(matches!(result, Err(JourneyError::DuplicateJourney(_))));
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn test_register_invalid() {
        let mut builder = JourneyRegistry::builder();
        let result = builder.register(descriptor("bad").with_key("personId"));
        assert!(matches!(result, Err(JourneyError::InvalidDescriptor(_))));
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_get_unknown() {
        let registry = JourneyRegistry::builder().build();
        let result = registry.get(&"missing".into());
        assert!(matches!(result, Err(JourneyError::UnknownJourney(_))));
        assert!(registry.lookup(&"missing".into()).is_none());
    }

    #[test]
    fn test_clones_share_catalog() {
        let mut builder = JourneyRegistry::builder();
        builder.register(descriptor("add-alert")).unwrap();
        let registry = builder.build();
        let clone = registry.clone();
        assert!(clone.contains(&"add-alert".into()));
    }
}
