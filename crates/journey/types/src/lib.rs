//! Journey Domain Types
//!
//! A journey is a named, multi-step web workflow whose partial answers are
//! persisted between requests. This crate holds the vocabulary shared by the
//! store, the engine and the web integration.
//!
//! # Key Concepts
//!
//! - **JourneyDescriptor**: The registered definition of a journey: its name,
//!   the shape tag of its state and the request keys that identify an instance.
//! - **JourneyInstanceId**: The identity of one run of a journey, derived from
//!   request values plus an optional random uniqueness token. Carried across
//!   requests as a URL-safe token.
//! - **StoredInstance**: The shape-tagged record kept by a persistence store.
//! - **JourneyInstance**: A decoded, strongly typed view of a stored record.
//! - **InstanceStatus**: `Active`, `Completed` or `Deleted`. Both terminal
//!   states reject further mutation.
//!
//! # Design Principles
//!
//! 1. Identity equality is order-independent over key/value pairs.
//! 2. State is typed at the call site; the shape tag is only checked where
//!    persisted JSON is decoded.
//! 3. Terminal instances are never silently mutated.

#![deny(unsafe_code)]

mod descriptor;
mod errors;
mod identity;
mod instance;
mod value_source;

pub use descriptor::*;
pub use errors::*;
pub use identity::*;
pub use instance::*;
pub use value_source::*;
