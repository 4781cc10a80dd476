//! In-memory collaborators.
//!
//! [`MemoryBackend`] keeps the whole realtime tree as one JSON value with
//! insertion-ordered maps and notifies listeners synchronously on every
//! write. [`MemoryStorage`] and [`StaticAuth`] complete the set so the layer
//! runs without a hosted backend (tests, local preview).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::backend::{
    AuthProvider, ObjectStorage, RealtimeBackend, SnapshotReceiver, SubscriptionHandle,
};
use crate::error::BackendError;

// ---------------------------------------------------------------------------
// Realtime tree
// ---------------------------------------------------------------------------

struct Listener {
    path: String,
    tx: mpsc::UnboundedSender<Result<Value, BackendError>>,
}

struct Inner {
    root: Value,
    listeners: BTreeMap<u64, Listener>,
    next_handle: u64,
}

/// Realtime store held entirely in memory.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_data(Value::Object(Map::new()))
    }

    /// Start from an existing tree (e.g. a JSON export).
    pub fn with_data(root: Value) -> Self {
        let root = if root.is_object() {
            root
        } else {
            Value::Object(Map::new())
        };
        Self {
            inner: Mutex::new(Inner {
                root,
                listeners: BTreeMap::new(),
                next_handle: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value at `path`.
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        read_at(&self.lock().root, &segments(path)).cloned()
    }

    /// Number of live listeners registered exactly on `path`.
    pub fn listener_count(&self, path: &str) -> usize {
        let target = segments(path);
        self.lock()
            .listeners
            .values()
            .filter(|l| segments(&l.path) == target)
            .count()
    }

    /// Deliver `error` to every listener related to `path`, as the hosted
    /// store does when access is revoked mid-session.
    pub fn fail_listeners(&self, path: &str, error: BackendError) {
        let target = segments(path);
        let inner = self.lock();
        for listener in inner.listeners.values() {
            if related(&segments(&listener.path), &target) {
                let _ = listener.tx.send(Err(error.clone()));
            }
        }
    }

    fn apply<F>(&self, path: &str, mutate: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut inner = self.lock();
        mutate(&mut inner.root);
        notify(&inner, &segments(path));
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeBackend for MemoryBackend {
    fn subscribe(&self, path: &str) -> Result<(SubscriptionHandle, SnapshotReceiver), BackendError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        let current = read_at(&inner.root, &segments(path))
            .cloned()
            .unwrap_or(Value::Null);
        let _ = tx.send(Ok(current));

        let handle = SubscriptionHandle(inner.next_handle);
        inner.next_handle += 1;
        inner.listeners.insert(
            handle.0,
            Listener {
                path: path.to_string(),
                tx,
            },
        );

        debug!(path, %handle, "Listener registered");
        Ok((handle, rx))
    }

    fn unsubscribe(&self, path: &str, handle: SubscriptionHandle) {
        if self.lock().listeners.remove(&handle.0).is_some() {
            debug!(path, %handle, "Listener removed");
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError> {
        Ok(self.snapshot(path))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError> {
        let segs = segments(path);
        self.apply(path, |root| write_at(root, &segs, value));
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), BackendError> {
        let base = segments(path);
        self.apply(path, |root| {
            for (key, value) in fields {
                let mut segs = base.clone();
                segs.extend(segments(&key));
                write_at(root, &segs, value);
            }
        });
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        let segs = segments(path);
        self.apply(path, |root| remove_at(root, &segs));
        Ok(())
    }

    async fn push(&self, _path: &str) -> Result<String, BackendError> {
        Ok(Uuid::now_v7().simple().to_string())
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// One path is an ancestor of (or equal to) the other.
fn related(a: &[&str], b: &[&str]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}

fn notify(inner: &Inner, changed: &[&str]) {
    for (handle, listener) in &inner.listeners {
        let segs = segments(&listener.path);
        if !related(&segs, changed) {
            continue;
        }
        let value = read_at(&inner.root, &segs).cloned().unwrap_or(Value::Null);
        if listener.tx.send(Ok(value)).is_err() {
            trace!(handle, path = %listener.path, "Listener receiver already dropped");
        }
    }
}

fn read_at<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for seg in segs {
        node = node.as_object()?.get(*seg)?;
    }
    Some(node)
}

fn write_at(root: &mut Value, segs: &[&str], value: Value) {
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        remove_at(root, segs);
        return;
    }

    let mut node = root;
    for seg in segs {
        node = ensure_object(node)
            .entry(seg.to_string())
            .or_insert(Value::Null);
    }
    *node = value;
}

/// Remove the node at `segs`, pruning parents left empty.
fn remove_at(node: &mut Value, segs: &[&str]) {
    let Some((first, rest)) = segs.split_first() else {
        *node = Value::Object(Map::new());
        return;
    };
    let Some(map) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        map.shift_remove(*first);
        return;
    }
    if let Some(child) = map.get_mut(*first) {
        remove_at(child, rest);
        if child.as_object().is_some_and(Map::is_empty) {
            map.shift_remove(*first);
        }
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

/// Object storage keeping uploaded bytes in memory.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored at `path`, if any.
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_file(&self, path: &str, local: &Path) -> Result<(), BackendError> {
        let data = tokio::fs::read(local).await.map_err(|e| {
            BackendError::Storage(format!("failed to read '{}': {e}", local.display()))
        })?;

        debug!(path, size = data.len(), "Object stored");
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), data);
        Ok(())
    }

    async fn download_locator(&self, path: &str) -> Result<String, BackendError> {
        let exists = self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path);
        if exists {
            Ok(format!("memory://{path}"))
        } else {
            Err(BackendError::Storage(format!("no object at {path}")))
        }
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Auth session that is whatever the caller says it is.
#[derive(Default)]
pub struct StaticAuth {
    account: RwLock<Option<String>>,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(account_id: impl Into<String>) -> Self {
        Self {
            account: RwLock::new(Some(account_id.into())),
        }
    }

    pub fn sign_in(&self, account_id: impl Into<String>) {
        *self.account.write().unwrap_or_else(PoisonError::into_inner) = Some(account_id.into());
    }

    pub fn sign_out(&self) {
        *self.account.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl AuthProvider for StaticAuth {
    fn current_account_id(&self) -> Option<String> {
        self.account
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
