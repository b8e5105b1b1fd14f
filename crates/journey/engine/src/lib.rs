//! Journey Engine
//!
//! Runtime for durable, multi-step web journeys:
//!
//! - [`JourneyRegistry`]: frozen catalog of journey descriptors
//! - [`IdentityCodec`]: derives instance identities from request values and
//!   carries them across requests as URL-safe tokens
//! - [`CompositeValueSource`] / [`RequestScope`]: per-request value lookup and
//!   instance memo
//! - [`JourneyManager`]: resolve, create, update, complete and delete
//!   instances against a [`journey_store::JourneyInstanceStore`]
//!
//! ```ignore
//! let mut builder = JourneyRegistry::builder();
//! builder.register(
//!     JourneyDescriptor::for_state::<NameChange>("change-name").with_key("personId"),
//! )?;
//! let manager = JourneyManager::new(builder.build(), Arc::new(InMemoryJourneyStore::new()));
//!
//! let scope = RequestScope::for_journey("change-name", values);
//! let handle = manager.get_or_create_instance::<NameChange>(&scope, NameChange::default()).await?;
//! manager.update_state(&handle, |s| s.first_name = Some("Ada".into())).await?;
//! ```

#![deny(unsafe_code)]

pub mod binding;
pub mod codec;
pub mod handle;
pub mod manager;
pub mod registry;
pub mod scope;

pub use binding::{CompositeValueSource, RequestValues, ValueOrigin};
pub use codec::{IdentityCodec, RandomUniqueKey, UniqueKeyGenerator};
pub use handle::JourneyInstanceHandle;
pub use manager::{JourneyManager, StateSeed};
pub use registry::{JourneyRegistry, JourneyRegistryBuilder};
pub use scope::RequestScope;
