//! Binding requests to a journey
//!
//! Each request bound to a journey carries one `Arc<RequestScope>` in its
//! extensions. The scope's values come from the route parameters first, then
//! the query string.

use axum::{
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use journey_engine::{CompositeValueSource, JourneyRegistry, RequestScope, RequestValues};
use journey_types::{JourneyName, JourneyResult};
use std::sync::Arc;

/// Middleware state naming the journey a group of routes belongs to
#[derive(Clone, Debug)]
pub struct JourneyBinding {
    journey: JourneyName,
}

impl JourneyBinding {
    /// Fails with `UnknownJourney` if `journey` is not in `registry`
    pub fn new(
        registry: &JourneyRegistry,
        journey: impl Into<JourneyName>,
    ) -> JourneyResult<Self> {
        let journey = journey.into();
        registry.get(&journey)?;
        Ok(Self { journey })
    }

    pub fn journey(&self) -> &JourneyName {
        &self.journey
    }
}

/// Attach a [`RequestScope`] for the bound journey to the request
pub async fn bind_scope(
    State(binding): State<JourneyBinding>,
    params: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Response {
    ensure_scope(&mut request, &binding.journey, params.as_ref());
    next.run(request).await
}

/// The request's scope for `journey`, building and attaching one if the
/// request does not carry it yet
pub(crate) fn ensure_scope(
    request: &mut Request,
    journey: &JourneyName,
    params: Option<&RawPathParams>,
) -> Arc<RequestScope> {
    if let Some(scope) = request.extensions().get::<Arc<RequestScope>>() {
        if scope.journey() == Some(journey) {
            return Arc::clone(scope);
        }
    }

    let mut values = CompositeValueSource::new();
    if let Some(params) = params {
        values.push(RequestValues::path(params.iter()));
    }
    values.push(RequestValues::query(request.uri().query().unwrap_or_default()));

    tracing::debug!(journey = %journey, path = %request.uri().path(), "Request bound to journey");
    let scope = Arc::new(RequestScope::for_journey(journey.clone(), values));
    request.extensions_mut().insert(Arc::clone(&scope));
    scope
}
