//! The [`Store`] handle shared by every collection helper.
//!
//! `Store` bundles the injected collaborators with the group namespace. The
//! typed helpers for each collection live in their own modules
//! (`events.rs`, `repertoire.rs`, ...) as further `impl Store` blocks.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use tutti_shared::paths;

use crate::backend::{AuthProvider, ObjectStorage, RealtimeBackend};
use crate::decode::{decode_entity, Decode};
use crate::error::{Result, StoreError};
use crate::stream::{ChangeStream, TypedStream};

/// Cheaply cloneable handle to the remote collaborators.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn RealtimeBackend>,
    storage: Arc<dyn ObjectStorage>,
    auth: Arc<dyn AuthProvider>,
    group_id: String,
}

impl Store {
    pub fn new(
        backend: Arc<dyn RealtimeBackend>,
        storage: Arc<dyn ObjectStorage>,
        auth: Arc<dyn AuthProvider>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            storage,
            auth,
            group_id: group_id.into(),
        }
    }

    /// Organizational group every shared collection is namespaced under.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn current_account_id(&self) -> Option<String> {
        self.auth.current_account_id()
    }

    pub(crate) fn require_account(&self) -> Result<String> {
        let account = self
            .auth
            .current_account_id()
            .ok_or(StoreError::Unauthenticated)?;
        if !paths::is_valid_key(&account) {
            warn!(account = %account, "Account id cannot be used as a path key");
            return Err(StoreError::Unauthenticated);
        }
        Ok(account)
    }

    /// Open a raw change stream on any path.
    pub fn watch(&self, path: impl Into<String>) -> ChangeStream {
        ChangeStream::open(self.backend.clone(), self.auth.as_ref(), path)
    }

    /// Change stream on the entity `key` at `path`. A key that cannot name
    /// a single node yields `NotFound` once, without subscribing.
    pub(crate) fn watch_key(&self, key: &str, path: String) -> ChangeStream {
        if paths::is_valid_key(key) || self.auth.current_account_id().is_none() {
            return self.watch(path);
        }
        let err = StoreError::not_found(path.clone());
        ChangeStream::refused(self.backend.clone(), path, err)
    }

    pub(crate) fn watch_collection<T>(&self, path: String) -> TypedStream<Vec<T>>
    where
        T: Decode + 'static,
    {
        self.watch(path).decoded()
    }

    /// One-shot read of a single entity. Absent data is `NotFound`.
    pub(crate) async fn fetch<T: Decode>(&self, path: &str) -> Result<T> {
        self.require_account()?;
        match self.backend.get(path).await? {
            Some(node) => decode_entity(path, &node),
            None => Err(StoreError::not_found(path)),
        }
    }

    /// One-shot read of the entity `key` at `path`. A key that cannot name
    /// a single node is `NotFound` without reaching the backend.
    pub(crate) async fn fetch_key<T: Decode>(&self, key: &str, path: String) -> Result<T> {
        self.require_account()?;
        if !paths::is_valid_key(key) {
            return Err(StoreError::not_found(path));
        }
        self.fetch(&path).await
    }

    pub(crate) async fn write<S: Serialize>(&self, path: &str, entity: &S) -> Result<()> {
        let value = serde_json::to_value(entity).map_err(|e| StoreError::Malformed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        self.backend.set(path, value).await?;
        Ok(())
    }

    pub(crate) fn backend(&self) -> &dyn RealtimeBackend {
        self.backend.as_ref()
    }

    /// Upload a local file and return its download locator.
    pub(crate) async fn upload(&self, remote: &str, local: &Path) -> Result<String> {
        self.storage.put_file(remote, local).await?;
        let locator = self.storage.download_locator(remote).await?;
        debug!(remote, "File uploaded");
        Ok(locator)
    }
}

/// Accept `id` as a path segment for a write, or reject it as invalid input.
pub(crate) fn checked_id<'a>(what: &str, id: &'a str) -> Result<&'a str> {
    if paths::is_valid_key(id) {
        Ok(id)
    } else {
        Err(StoreError::Validation(format!("invalid {what} id '{id}'")))
    }
}
