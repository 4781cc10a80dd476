//! # tutti-store
//!
//! Realtime synchronization layer for the Tutti band organizer.
//!
//! The crate talks to a remote realtime key-value store through the narrow
//! collaborator traits in [`backend`], turns push notifications into
//! cancellable snapshot streams ([`ChangeStream`]), decodes raw snapshot
//! nodes into typed records ([`decode`]) and exposes typed read/write helpers
//! for every collection on [`Store`].

pub mod backend;
pub mod decode;
pub mod events;
pub mod memory;
pub mod notifications;
pub mod profiles;
pub mod repertoire;
pub mod store;
pub mod stream;

mod error;

pub use backend::{AuthProvider, ObjectStorage, RealtimeBackend, SubscriptionHandle};
pub use decode::{Decode, DecodeSkip};
pub use error::{BackendError, Result, StoreError};
pub use memory::{MemoryBackend, MemoryStorage, StaticAuth};
pub use repertoire::RepertoireDraft;
pub use store::Store;
pub use stream::{ChangeStream, Snapshot, TypedStream};
