//! Collaborators the sync layer depends on.
//!
//! The realtime store, object storage and auth session are injected as trait
//! objects so that the hosted SDK is chosen once at the outermost wiring
//! point and every component below it stays testable against the in-memory
//! implementations in [`crate::memory`].

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::BackendError;

/// Receiving half of a subscription: one full snapshot of the subscribed path
/// per change, or the error that ended the subscription.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Result<Value, BackendError>>;

/// Opaque id of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Remote realtime key-value store.
#[async_trait]
pub trait RealtimeBackend: Send + Sync {
    /// Register a listener on `path`. The current snapshot (`Value::Null` if
    /// nothing is stored) is delivered first, then one per change.
    fn subscribe(&self, path: &str) -> Result<(SubscriptionHandle, SnapshotReceiver), BackendError>;

    /// Deregister a listener. Returns once no further snapshot can be sent to
    /// it; unknown handles are ignored.
    fn unsubscribe(&self, path: &str, handle: SubscriptionHandle);

    /// One-shot read. `None` when nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError>;

    /// Merge `fields` into the object at `path`. A `null` field removes it.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), BackendError>;

    async fn remove(&self, path: &str) -> Result<(), BackendError>;

    /// Generate a unique child key under `path`. Keys sort in creation order.
    async fn push(&self, path: &str) -> Result<String, BackendError>;
}

/// Remote file storage for sheet music and avatars.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_file(&self, path: &str, local: &Path) -> Result<(), BackendError>;

    async fn download_locator(&self, path: &str) -> Result<String, BackendError>;
}

/// Signed-in account, if any.
pub trait AuthProvider: Send + Sync {
    fn current_account_id(&self) -> Option<String>;
}
