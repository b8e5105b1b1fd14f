//! Sample "change a person's name" journey served by `journey-demo`
//!
//! ```text
//! GET    /people/:personId/change-name/start     create an instance, redirect to it
//! GET    /people/:personId/change-name?_key=..   show the answers so far
//! POST   /people/:personId/change-name/name      record the new name
//! POST   /people/:personId/change-name/complete  finish the journey
//! DELETE /people/:personId/change-name           cancel the journey
//! ```

use crate::error::JourneyRejection;
use crate::extract::Journey;
use crate::filters::{
    activate_instance, require_instance, ActivatesInstance, MissingInstance, RequiresInstance,
};
use crate::scope::{bind_scope, JourneyBinding};
use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use journey_engine::{JourneyInstanceHandle, JourneyManager, JourneyRegistry};
use journey_types::{
    InstanceStatus, JourneyDescriptor, JourneyResult, JourneyState, UNIQUE_KEY,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

pub const CHANGE_NAME: &str = "change-name";

/// Answers collected by the change-name journey
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeNameState {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl JourneyState for ChangeNameState {
    const SHAPE: &'static str = "ChangeNameState";
}

/// Body of `POST .../name`
#[derive(Debug, Deserialize)]
pub struct NameAnswer {
    pub first_name: String,
    pub last_name: String,
}

/// What each step returns
#[derive(Debug, Serialize, Deserialize)]
pub struct StepView {
    pub token: String,
    pub status: InstanceStatus,
    pub state: ChangeNameState,
}

pub fn registry() -> JourneyResult<JourneyRegistry> {
    let mut builder = JourneyRegistry::builder();
    builder.register(
        JourneyDescriptor::for_state::<ChangeNameState>(CHANGE_NAME)
            .with_key("personId")
            .with_unique_key(),
    )?;
    Ok(builder.build())
}

/// Routes for the change-name journey. Fails if `manager` does not know the
/// journey.
pub fn router(manager: JourneyManager, on_missing: MissingInstance) -> JourneyResult<Router> {
    let binding = JourneyBinding::new(manager.registry(), CHANGE_NAME)?;
    let activates =
        ActivatesInstance::new(manager.clone(), CHANGE_NAME, ChangeNameState::default)?;
    let requires = RequiresInstance::<ChangeNameState>::new(manager.clone(), CHANGE_NAME)?
        .on_missing(on_missing);

    let entry = Router::new()
        .route("/people/:personId/change-name/start", get(start))
        .route_layer(from_fn_with_state(
            activates,
            activate_instance::<ChangeNameState>,
        ));

    let steps = Router::new()
        .route("/people/:personId/change-name", get(show).delete(cancel))
        .route("/people/:personId/change-name/name", post(answer_name))
        .route("/people/:personId/change-name/complete", post(finish))
        .route_layer(from_fn_with_state(
            requires,
            require_instance::<ChangeNameState>,
        ));

    Ok(entry
        .merge(steps)
        .route_layer(from_fn_with_state(binding, bind_scope))
        .layer(TraceLayer::new_for_http())
        .with_state(manager))
}

fn view(manager: &JourneyManager, handle: &JourneyInstanceHandle<ChangeNameState>) -> StepView {
    let instance = handle.snapshot();
    StepView {
        token: manager.token(handle),
        status: instance.status(),
        state: instance.state,
    }
}

async fn start(Journey(handle): Journey<ChangeNameState>) -> Redirect {
    let id = handle.id();
    let person = id.get("personId").unwrap_or_default();
    let key = id.get(UNIQUE_KEY).unwrap_or_default();
    Redirect::to(&format!(
        "/people/{}/change-name?{}={}",
        urlencoding::encode(person),
        UNIQUE_KEY,
        urlencoding::encode(key)
    ))
}

async fn show(
    State(manager): State<JourneyManager>,
    Journey(handle): Journey<ChangeNameState>,
) -> Json<StepView> {
    Json(view(&manager, &handle))
}

async fn answer_name(
    State(manager): State<JourneyManager>,
    Journey(handle): Journey<ChangeNameState>,
    Json(answer): Json<NameAnswer>,
) -> Result<Json<StepView>, JourneyRejection> {
    manager
        .update_state(&handle, move |state| {
            state.first_name = Some(answer.first_name);
            state.last_name = Some(answer.last_name);
        })
        .await?;
    Ok(Json(view(&manager, &handle)))
}

async fn finish(
    State(manager): State<JourneyManager>,
    Journey(handle): Journey<ChangeNameState>,
) -> Result<Json<StepView>, JourneyRejection> {
    manager.complete(&handle).await?;
    Ok(Json(view(&manager, &handle)))
}

async fn cancel(
    State(manager): State<JourneyManager>,
    Journey(handle): Journey<ChangeNameState>,
) -> Result<StatusCode, JourneyRejection> {
    manager.delete(&handle).await?;
    Ok(StatusCode::NO_CONTENT)
}
