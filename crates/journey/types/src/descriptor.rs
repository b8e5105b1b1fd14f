//! Journey descriptors: the registered definition of a journey
//!
//! A descriptor names the journey, declares the shape of its state and lists
//! the request keys that together identify one instance. Descriptors are
//! validated on registration and never change afterwards.

use crate::{JourneyError, JourneyResult, JourneyState};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reserved identity key carrying the random uniqueness token.
pub const UNIQUE_KEY: &str = "_key";

// ── Identifiers ──────────────────────────────────────────────────────

/// Name of a journey, unique within a registry
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyName(String);

impl JourneyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JourneyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JourneyName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for JourneyName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Declared type tag of a journey's persisted state
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateShape(String);

impl StateShape {
    pub fn new(shape: impl Into<String>) -> Self {
        Self(shape.into())
    }

    /// The shape tag declared by a state type
    pub fn of<S: JourneyState>() -> Self {
        Self(S::SHAPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateShape {
    fn from(shape: &str) -> Self {
        Self::new(shape)
    }
}

// ── Descriptor ───────────────────────────────────────────────────────

/// One request key contributing to an instance identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityKey {
    pub name: String,
    /// A nullable key may be absent from the request
    #[serde(default)]
    pub nullable: bool,
}

impl IdentityKey {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
        }
    }
}

/// The registered definition of a journey
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyDescriptor {
    /// Unique journey name
    pub name: JourneyName,
    /// Shape tag of the journey's state
    pub state_shape: StateShape,
    /// Identity keys, in declaration order
    #[serde(default)]
    pub keys: Vec<IdentityKey>,
    /// Whether a random uniqueness token is appended to every identity
    #[serde(default)]
    pub append_unique_key: bool,
}

impl JourneyDescriptor {
    pub fn new(name: impl Into<JourneyName>, state_shape: StateShape) -> Self {
        Self {
            name: name.into(),
            state_shape,
            keys: Vec::new(),
            append_unique_key: false,
        }
    }

    /// Descriptor whose shape tag is taken from the state type
    pub fn for_state<S: JourneyState>(name: impl Into<JourneyName>) -> Self {
        Self::new(name, StateShape::of::<S>())
    }

    pub fn with_key(mut self, name: impl Into<String>) -> Self {
        self.keys.push(IdentityKey::required(name));
        self
    }

    pub fn with_optional_key(mut self, name: impl Into<String>) -> Self {
        self.keys.push(IdentityKey::optional(name));
        self
    }

    pub fn with_unique_key(mut self) -> Self {
        self.append_unique_key = true;
        self
    }

    /// Names of the declared keys, in declaration order
    pub fn key_names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.name.as_str())
    }

    /// Check structural rules before registration
    pub fn validate(&self) -> JourneyResult<()> {
        if self.name.as_str().trim().is_empty() {
            return Err(JourneyError::InvalidDescriptor(
                "journey name must not be empty".to_string(),
            ));
        }
        if self.state_shape.as_str().trim().is_empty() {
            return Err(JourneyError::InvalidDescriptor(format!(
                "journey {} declares an empty state shape",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for key in &self.keys {
            if key.name.is_empty() {
                return Err(JourneyError::InvalidDescriptor(format!(
                    "journey {} declares an empty key name",
                    self.name
                )));
            }
            if key.name == UNIQUE_KEY {
                return Err(JourneyError::InvalidDescriptor(format!(
                    "journey {} uses reserved key '{}'",
                    self.name, UNIQUE_KEY
                )));
            }
            if !seen.insert(key.name.as_str()) {
                return Err(JourneyError::InvalidDescriptor(format!(
                    "journey {} declares key '{}' twice",
                    self.name, key.name
                )));
            }
        }

        Ok(())
    }
}
