//! axum integration for the journey engine
//!
//! A journey's routes are wrapped in three layers of middleware, outermost
//! first:
//!
//! 1. [`bind_scope`] attaches the request's [`journey_engine::RequestScope`].
//! 2. [`activate_instance`] (entry point) or [`require_instance`] (every other
//!    step) resolves the instance and stashes its handle.
//! 3. Handlers take the handle through the [`Journey`] extractor and mutate it
//!    through the shared [`journey_engine::JourneyManager`].
//!
//! Engine errors leave as JSON error responses via [`JourneyRejection`].

#![deny(unsafe_code)]

pub mod config;
pub mod demo;
pub mod error;
pub mod extract;
pub mod filters;
pub mod scope;
pub mod telemetry;

pub use config::{JourneyConfig, LoggingConfig, StoreConfig, WebConfig};
pub use error::{ErrorResponse, JourneyRejection};
pub use extract::{Journey, Scope};
pub use filters::{
    activate_instance, fill_template, require_instance, ActivatesInstance, MissingInstance,
    RequiresInstance,
};
pub use scope::{bind_scope, JourneyBinding};
