//! Error types for the Journey layer

use crate::{InstanceStatus, JourneyInstanceId, JourneyName, StateShape};

/// Errors that can occur in Journey operations
#[derive(Debug, thiserror::Error)]
pub enum JourneyError {
    #[error("Journey not registered: {0}")]
    UnknownJourney(JourneyName),

    #[error("Journey already registered: {0}")]
    DuplicateJourney(JourneyName),

    #[error("Invalid journey descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("No journey bound to the current operation")]
    NoJourneyBound,

    #[error("Missing identity component '{key}' for journey {journey}")]
    MissingIdentityComponent { journey: JourneyName, key: String },

    #[error("Invalid journey instance id: {0}")]
    InvalidInstanceId(String),

    #[error("Journey instance already exists: {0}")]
    InstanceAlreadyExists(JourneyInstanceId),

    #[error("Journey instance not found: {0}")]
    InstanceNotFound(JourneyInstanceId),

    #[error("Journey instance {id} is {status}")]
    InstanceClosed {
        id: JourneyInstanceId,
        status: InstanceStatus,
    },

    #[error("State shape mismatch: expected {expected}, found {actual}")]
    ShapeMismatch {
        expected: StateShape,
        actual: StateShape,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl JourneyError {
    /// True when the error only means the request does not reference an instance.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, JourneyError::MissingIdentityComponent { .. })
    }
}

impl From<serde_json::Error> for JourneyError {
    fn from(err: serde_json::Error) -> Self {
        JourneyError::Serialization(err.to_string())
    }
}

/// Result type alias for journey operations
pub type JourneyResult<T> = Result<T, JourneyError>;
