//! Handler extractors for journey routes

use crate::error::JourneyRejection;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use journey_engine::{JourneyInstanceHandle, RequestScope};
use journey_types::{JourneyError, JourneyState};
use std::sync::Arc;

/// The instance handle stashed by [`crate::activate_instance`] or
/// [`crate::require_instance`].
///
/// Rejects with a server error when neither filter ran for the route.
pub struct Journey<S>(pub JourneyInstanceHandle<S>);

#[async_trait]
impl<S, St> FromRequestParts<St> for Journey<S>
where
    S: JourneyState,
    St: Send + Sync,
{
    type Rejection = JourneyRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JourneyInstanceHandle<S>>()
            .cloned()
            .map(Journey)
            .ok_or(JourneyRejection(JourneyError::NoJourneyBound))
    }
}

/// The request's [`RequestScope`], attached by [`crate::bind_scope`] or one of
/// the instance filters
#[derive(Clone, Debug)]
pub struct Scope(pub Arc<RequestScope>);

#[async_trait]
impl<St> FromRequestParts<St> for Scope
where
    St: Send + Sync,
{
    type Rejection = JourneyRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<RequestScope>>()
            .cloned()
            .map(Scope)
            .ok_or(JourneyRejection(JourneyError::NoJourneyBound))
    }
}
