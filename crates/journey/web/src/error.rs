//! HTTP mapping for journey errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use journey_types::JourneyError;
use serde::Serialize;

/// A journey error on its way out as an HTTP response
#[derive(Debug)]
pub struct JourneyRejection(pub JourneyError);

impl JourneyRejection {
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            JourneyError::MissingIdentityComponent { .. } => {
                (StatusCode::BAD_REQUEST, "MISSING_IDENTITY_COMPONENT")
            }
            JourneyError::InvalidInstanceId(_) => (StatusCode::BAD_REQUEST, "INVALID_INSTANCE_ID"),
            JourneyError::InstanceClosed { .. } => (StatusCode::CONFLICT, "INSTANCE_CLOSED"),
            JourneyError::InstanceNotFound(_) => (StatusCode::NOT_FOUND, "INSTANCE_NOT_FOUND"),
            JourneyError::InstanceAlreadyExists(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INSTANCE_ALREADY_EXISTS")
            }
            JourneyError::ShapeMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SHAPE_MISMATCH")
            }
            JourneyError::UnknownJourney(_)
            | JourneyError::DuplicateJourney(_)
            | JourneyError::InvalidDescriptor(_)
            | JourneyError::NoJourneyBound => {
                (StatusCode::INTERNAL_SERVER_ERROR, "JOURNEY_CONFIGURATION")
            }
            JourneyError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
            }
            JourneyError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match &self.0 {
            JourneyError::MissingIdentityComponent { journey, key } => Some(serde_json::json!({
                "journey": journey,
                "key": key,
            })),
            JourneyError::InstanceClosed { id, status } => Some(serde_json::json!({
                "instance": id,
                "status": status,
            })),
            _ => None,
        }
    }
}

impl From<JourneyError> for JourneyRejection {
    fn from(err: JourneyError) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for JourneyRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for JourneyRejection {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        if status.is_server_error() {
            tracing::error!(code, error = %self.0, "Journey request failed");
        } else {
            tracing::debug!(code, error = %self.0, "Journey request rejected");
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            code: code.to_string(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_types::{InstanceStatus, JourneyInstanceId, StateShape};

    #[test]
    fn test_status_mapping() {
        let id = JourneyInstanceId::new("j").with_key("personId", "1");
        let cases = [
            (
                JourneyError::MissingIdentityComponent {
                    journey: "j".into(),
                    key: "personId".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                JourneyError::InvalidInstanceId("?".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                JourneyError::InstanceClosed {
                    id: id.clone(),
                    status: InstanceStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (JourneyError::InstanceNotFound(id.clone()), StatusCode::NOT_FOUND),
            (
                JourneyError::InstanceAlreadyExists(id),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                JourneyError::ShapeMismatch {
                    expected: StateShape::new("A"),
                    actual: StateShape::new("B"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (JourneyError::NoJourneyBound, StatusCode::INTERNAL_SERVER_ERROR),
            (
                JourneyError::Backend("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let rejection = JourneyRejection::from(err);
            assert_eq!(rejection.status(), expected, "{rejection}");
            assert_eq!(rejection.into_response().status(), expected);
        }
    }

    #[test]
    fn test_closed_details() {
        let rejection = JourneyRejection(JourneyError::InstanceClosed {
            id: JourneyInstanceId::new("j").with_key("personId", "1"),
            status: InstanceStatus::Deleted,
        });
        let details = rejection.details().unwrap();
        assert_eq!(details["instance"], "j?personId=1");
        assert_eq!(details["status"], "deleted");
    }
}
