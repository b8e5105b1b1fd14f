//! Journey instances: persisted runs of a journey
//!
//! A [`StoredInstance`] is what a persistence store keeps: the identity, the
//! shape tag and the state as JSON. A [`JourneyInstance`] is the typed view the
//! engine hands to callers. Decoding one into the other is the only place the
//! shape tag is checked at runtime.

use crate::{JourneyError, JourneyInstanceId, JourneyResult, StateShape};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque per-instance properties
pub type InstanceProperties = BTreeMap<String, serde_json::Value>;

/// State carried by a journey.
///
/// Each state type declares the shape tag it is persisted under.
pub trait JourneyState: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const SHAPE: &'static str;
}

// ── Lifecycle ────────────────────────────────────────────────────────

/// Lifecycle status of a journey instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Completed,
    Deleted,
}

impl InstanceStatus {
    pub fn from_flags(completed: bool, deleted: bool) -> Self {
        if deleted {
            InstanceStatus::Deleted
        } else if completed {
            InstanceStatus::Completed
        } else {
            InstanceStatus::Active
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Active)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Active => write!(f, "active"),
            InstanceStatus::Completed => write!(f, "completed"),
            InstanceStatus::Deleted => write!(f, "deleted"),
        }
    }
}

// ── Stored Instance ──────────────────────────────────────────────────

/// A journey instance as held by a persistence store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredInstance {
    pub id: JourneyInstanceId,
    pub shape: StateShape,
    pub state: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: InstanceProperties,
    pub completed: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredInstance {
    /// A fresh, active record
    pub fn new(
        id: JourneyInstanceId,
        shape: StateShape,
        state: serde_json::Value,
        properties: InstanceProperties,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            shape,
            state,
            properties,
            completed: false,
            deleted: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
            deleted_at: None,
        }
    }

    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from_flags(self.completed, self.deleted)
    }

    /// Fail with `ShapeMismatch` unless the record was stored under `expected`
    pub fn ensure_shape(&self, expected: &StateShape) -> JourneyResult<()> {
        if &self.shape != expected {
            return Err(JourneyError::ShapeMismatch {
                expected: expected.clone(),
                actual: self.shape.clone(),
            });
        }
        Ok(())
    }

    /// Fail with `InstanceClosed` if the record is completed or deleted
    pub fn ensure_active(&self) -> JourneyResult<()> {
        match self.status() {
            InstanceStatus::Active => Ok(()),
            status => Err(JourneyError::InstanceClosed {
                id: self.id.clone(),
                status,
            }),
        }
    }

    /// Decode into a typed instance, checking the shape tag first
    pub fn decode<S: JourneyState>(&self) -> JourneyResult<JourneyInstance<S>> {
        self.ensure_shape(&StateShape::of::<S>())?;
        let state = serde_json::from_value(self.state.clone())?;
        Ok(JourneyInstance {
            id: self.id.clone(),
            state,
            properties: self.properties.clone(),
            completed: self.completed,
            deleted: self.deleted,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ── Typed Instance ───────────────────────────────────────────────────

/// A decoded journey instance with typed state
#[derive(Clone, Debug)]
pub struct JourneyInstance<S> {
    pub id: JourneyInstanceId,
    pub state: S,
    pub properties: InstanceProperties,
    pub completed: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<S: JourneyState> JourneyInstance<S> {
    pub fn shape(&self) -> StateShape {
        StateShape::of::<S>()
    }

    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from_flags(self.completed, self.deleted)
    }

    pub fn is_active(&self) -> bool {
        self.status() == InstanceStatus::Active
    }

    pub fn ensure_active(&self) -> JourneyResult<()> {
        match self.status() {
            InstanceStatus::Active => Ok(()),
            status => Err(JourneyError::InstanceClosed {
                id: self.id.clone(),
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct AlertState {
        reason: String,
    }

    impl JourneyState for AlertState {
        const SHAPE: &'static str = "AlertState";
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct OtherState;

    impl JourneyState for OtherState {
        const SHAPE: &'static str = "OtherState";
    }

    fn make_record() -> StoredInstance {
        StoredInstance::new(
            JourneyInstanceId::new("add-alert").with_key("personId", "42"),
            StateShape::new("AlertState"),
            serde_json::json!({ "reason": "late" }),
            InstanceProperties::new(),
        )
    }

    #[test]
    fn test_decode() {
        let record = make_record();
        let inst = record.decode::<AlertState>().unwrap();
        assert_eq!(inst.state.reason, "late");
        assert!(inst.is_active());
        assert_eq!(inst.shape(), StateShape::new("AlertState"));
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let record = make_record();
        let result = record.decode::<OtherState>();
        assert!(matches!(
            result,
            Err(JourneyError::ShapeMismatch { ref expected, ref actual })
                if expected.as_str() == "OtherState" && actual.as_str() == "AlertState"
        ));
    }

    #[test]
    fn test_status_flags() {
        assert_eq!(InstanceStatus::from_flags(false, false), InstanceStatus::Active);
        assert_eq!(InstanceStatus::from_flags(true, false), InstanceStatus::Completed);
        assert_eq!(InstanceStatus::from_flags(false, true), InstanceStatus::Deleted);
        assert!(!InstanceStatus::Active.is_terminal());
        assert!(InstanceStatus::Completed.is_terminal());
        assert!(InstanceStatus::Deleted.is_terminal());
    }

    #[test]
    fn test_ensure_active() {
        let mut record = make_record();
        assert!(record.ensure_active().is_ok());

        record.completed = true;
        assert!(matches!(
            record.ensure_active(),
            Err(JourneyError::InstanceClosed {
                status: InstanceStatus::Completed,
                ..
            })
        ));
    }
}
