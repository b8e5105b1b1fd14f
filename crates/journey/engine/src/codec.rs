//! Identity codec: derives instance identities from request values
//!
//! [`IdentityCodec::create`] computes a fresh identity, generating the
//! uniqueness token when the descriptor asks for one.
//! [`IdentityCodec::try_resolve`] computes the identity an inbound request
//! refers to, reading the token from the request instead. A request that lacks
//! any required key or the token does not reference an instance; that case is
//! reported as `MissingIdentityComponent`.

use journey_types::{
    JourneyDescriptor, JourneyError, JourneyInstanceId, JourneyResult, ValueSource, UNIQUE_KEY,
};
use std::sync::Arc;

/// Produces uniqueness tokens for new instances
pub trait UniqueKeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUIDv4 tokens in simple (hex) form
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomUniqueKey;

impl UniqueKeyGenerator for RandomUniqueKey {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Derives, serializes and parses instance identities
#[derive(Clone)]
pub struct IdentityCodec {
    generator: Arc<dyn UniqueKeyGenerator>,
}

impl IdentityCodec {
    pub fn new() -> Self {
        Self::with_generator(Arc::new(RandomUniqueKey))
    }

    pub fn with_generator(generator: Arc<dyn UniqueKeyGenerator>) -> Self {
        Self { generator }
    }

    /// Compute a fresh identity, generating a new uniqueness token if declared
    pub fn create(
        &self,
        descriptor: &JourneyDescriptor,
        values: &dyn ValueSource,
    ) -> JourneyResult<JourneyInstanceId> {
        let mut id = declared_keys(descriptor, values)?;
        if descriptor.append_unique_key {
            id.insert(UNIQUE_KEY, self.generator.generate());
        }
        Ok(id)
    }

    /// Compute the identity the request refers to, without generating anything
    pub fn try_resolve(
        &self,
        descriptor: &JourneyDescriptor,
        values: &dyn ValueSource,
    ) -> JourneyResult<JourneyInstanceId> {
        let mut id = declared_keys(descriptor, values)?;
        if descriptor.append_unique_key {
            let token = read(values, UNIQUE_KEY).ok_or_else(|| {
                JourneyError::MissingIdentityComponent {
                    journey: descriptor.name.clone(),
                    key: UNIQUE_KEY.to_string(),
                }
            })?;
            id.insert(UNIQUE_KEY, token);
        }
        Ok(id)
    }

    pub fn serialize(&self, id: &JourneyInstanceId) -> String {
        id.to_token()
    }

    pub fn deserialize(&self, token: &str) -> JourneyResult<JourneyInstanceId> {
        JourneyInstanceId::parse(token)
    }
}

impl Default for IdentityCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCodec").finish_non_exhaustive()
    }
}

fn declared_keys(
    descriptor: &JourneyDescriptor,
    values: &dyn ValueSource,
) -> JourneyResult<JourneyInstanceId> {
    let mut id = JourneyInstanceId::new(descriptor.name.clone());
    for key in &descriptor.keys {
        match read(values, &key.name) {
            Some(value) => id.insert(key.name.clone(), value),
            None if key.nullable => {}
            None => {
                return Err(JourneyError::MissingIdentityComponent {
                    journey: descriptor.name.clone(),
                    key: key.name.clone(),
                })
            }
        }
    }
    Ok(id)
}

/// Empty values count as absent.
fn read(values: &dyn ValueSource, key: &str) -> Option<String> {
    values.value(key).filter(|v| !v.is_empty())
}
