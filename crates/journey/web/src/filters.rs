//! Pre-handler filters enforcing instance policy on journey routes
//!
//! - [`activate_instance`] resolves or creates the instance on entry-point
//!   routes.
//! - [`require_instance`] resolves the instance on every other route and
//!   short-circuits with a [`MissingInstance`] response when there is none.
//!
//! Both stash the handle in request extensions for the [`crate::Journey`]
//! extractor. Mount them with `axum::middleware::from_fn_with_state`.

use crate::error::JourneyRejection;
use crate::scope::ensure_scope;
use axum::{
    extract::{RawPathParams, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use journey_engine::{JourneyManager, StateSeed};
use journey_types::{JourneyName, JourneyResult, JourneyState, ValueSource};
use std::marker::PhantomData;
use std::sync::Arc;

// ── Missing Instance Policy ──────────────────────────────────────────

/// Response for a request whose instance cannot be found
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissingInstance {
    /// Redirect to the entry point. `{key}` placeholders are filled from the
    /// request values.
    Redirect(String),
    Status(StatusCode),
}

impl MissingInstance {
    pub fn redirect(target: impl Into<String>) -> Self {
        MissingInstance::Redirect(target.into())
    }

    pub fn status(status: StatusCode) -> Self {
        MissingInstance::Status(status)
    }

    pub fn respond(&self, values: &dyn ValueSource) -> Response {
        match self {
            MissingInstance::Redirect(template) => {
                Redirect::to(&fill_template(template, values)).into_response()
            }
            MissingInstance::Status(status) => (*status).into_response(),
        }
    }
}

impl Default for MissingInstance {
    fn default() -> Self {
        MissingInstance::Status(StatusCode::BAD_REQUEST)
    }
}

/// Substitute `{key}` placeholders with percent-encoded request values.
/// Unknown keys become empty; an unterminated brace is kept verbatim.
pub fn fill_template(template: &str, values: &dyn ValueSource) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                if let Some(value) = values.value(key) {
                    out.push_str(&urlencoding::encode(&value));
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// ── Activates-Instance ───────────────────────────────────────────────

type SeedFn<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Filter state for entry-point routes
pub struct ActivatesInstance<S> {
    manager: JourneyManager,
    journey: JourneyName,
    seed: SeedFn<S>,
}

impl<S: JourneyState> ActivatesInstance<S> {
    /// Fails unless `journey` is registered with the shape `S` declares
    pub fn new<F>(
        manager: JourneyManager,
        journey: impl Into<JourneyName>,
        seed: F,
    ) -> JourneyResult<Self>
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        let journey = journey.into();
        manager.descriptor_for::<S>(&journey)?;
        Ok(Self {
            manager,
            journey,
            seed: Arc::new(seed),
        })
    }
}

impl<S> Clone for ActivatesInstance<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            journey: self.journey.clone(),
            seed: Arc::clone(&self.seed),
        }
    }
}

/// Resolve or create the instance before the handler runs
pub async fn activate_instance<S: JourneyState>(
    State(filter): State<ActivatesInstance<S>>,
    params: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Response {
    let scope = ensure_scope(&mut request, &filter.journey, params.as_ref());
    let seed = Arc::clone(&filter.seed);

    match filter
        .manager
        .get_or_create_instance::<S>(&scope, StateSeed::factory(move || seed()))
        .await
    {
        Ok(handle) => {
            request.extensions_mut().insert(handle);
            next.run(request).await
        }
        Err(err) => JourneyRejection::from(err).into_response(),
    }
}

// ── Requires-Instance ────────────────────────────────────────────────

/// Filter state for routes past the entry point
pub struct RequiresInstance<S> {
    manager: JourneyManager,
    journey: JourneyName,
    on_missing: MissingInstance,
    _state: PhantomData<fn() -> S>,
}

impl<S: JourneyState> RequiresInstance<S> {
    /// Fails unless `journey` is registered with the shape `S` declares
    pub fn new(manager: JourneyManager, journey: impl Into<JourneyName>) -> JourneyResult<Self> {
        let journey = journey.into();
        manager.descriptor_for::<S>(&journey)?;
        Ok(Self {
            manager,
            journey,
            on_missing: MissingInstance::default(),
            _state: PhantomData,
        })
    }

    pub fn on_missing(mut self, on_missing: MissingInstance) -> Self {
        self.on_missing = on_missing;
        self
    }
}

impl<S> Clone for RequiresInstance<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            journey: self.journey.clone(),
            on_missing: self.on_missing.clone(),
            _state: PhantomData,
        }
    }
}

/// Resolve the instance; deleted or unresolvable instances count as missing
pub async fn require_instance<S: JourneyState>(
    State(filter): State<RequiresInstance<S>>,
    params: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Response {
    let scope = ensure_scope(&mut request, &filter.journey, params.as_ref());

    match filter.manager.get_instance::<S>(&scope).await {
        Ok(Some(handle)) if !handle.is_deleted() => {
            request.extensions_mut().insert(handle);
            next.run(request).await
        }
        Ok(_) => {
            tracing::debug!(journey = %filter.journey, "Journey instance required but missing");
            filter.on_missing.respond(scope.values())
        }
        Err(err) => JourneyRejection::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fill_template() {
        let v = values(&[("personId", "42"), ("name", "a b/c")]);
        assert_eq!(
            fill_template("/people/{personId}/start?n={name}", &v),
            "/people/42/start?n=a%20b%2Fc"
        );
        assert_eq!(fill_template("/people/{missing}/x", &v), "/people//x");
        assert_eq!(fill_template("/open/{personId", &v), "/open/{personId");
        assert_eq!(fill_template("/plain", &v), "/plain");
    }

    #[test]
    fn test_missing_instance_responses() {
        let v = values(&[("personId", "42")]);

        let redirect = MissingInstance::redirect("/people/{personId}/start").respond(&v);
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            redirect.headers()[axum::http::header::LOCATION].to_str().unwrap(),
            "/people/42/start"
        );

        let status = MissingInstance::status(StatusCode::GONE).respond(&v);
        assert_eq!(status.status(), StatusCode::GONE);

        assert_eq!(
            MissingInstance::default().respond(&v).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
