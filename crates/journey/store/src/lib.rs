//! Journey instance persistence.
//!
//! This crate defines the storage contract the journey engine depends on:
//! - fetch an instance by identity
//! - insert-if-absent (the only concurrency guard in the system)
//! - whole-state snapshot replacement
//! - terminal transitions (complete / delete)
//!
//! Every operation is keyed by identity and shape tag. Adapters must reject a
//! shape tag that differs from the stored record's without modifying it.
//!
//! Two adapters ship with the crate: a deterministic in-memory store for tests
//! and development, and a PostgreSQL store behind the `postgres` feature.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use memory::InMemoryJourneyStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresJourneyStore;
pub use traits::JourneyInstanceStore;
