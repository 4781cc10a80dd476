//! Change streams over realtime collection paths.
//!
//! A [`ChangeStream`] owns exactly one backend listener. Every item is the
//! complete current state of the path, never a delta. The listener is
//! registered when the stream is opened and deregistered synchronously when
//! the stream ends, is closed, or is dropped, whichever happens first.
//!
//! Failures end the stream: an unauthenticated caller gets a single
//! `Unauthenticated` item without any listener being registered, and a
//! backend error after subscribing is yielded once as `Backend` before the
//! stream terminates. Nothing is retried here; re-open the stream to retry.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{AuthProvider, RealtimeBackend, SnapshotReceiver, SubscriptionHandle};
use crate::decode::{decode_children, decode_entity, Decode};
use crate::error::StoreError;

/// Full point-in-time read of a subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: String,
    pub value: Value,
}

impl Snapshot {
    /// Whether anything is stored at the path.
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }
}

enum State {
    /// Opening was refused; the error is yielded once.
    Refused(StoreError),
    Active {
        handle: SubscriptionHandle,
        rx: SnapshotReceiver,
    },
    Closed,
}

/// Cancellable sequence of full snapshots of one path.
pub struct ChangeStream {
    path: String,
    backend: Arc<dyn RealtimeBackend>,
    state: State,
}

impl ChangeStream {
    /// Register a listener on `path` for the signed-in account.
    pub fn open(
        backend: Arc<dyn RealtimeBackend>,
        auth: &dyn AuthProvider,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();

        let state = if auth.current_account_id().is_none() {
            debug!(path = %path, "Refusing subscription without an account");
            State::Refused(StoreError::Unauthenticated)
        } else {
            match backend.subscribe(&path) {
                Ok((handle, rx)) => {
                    debug!(path = %path, %handle, "Change stream opened");
                    State::Active { handle, rx }
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Subscription refused by backend");
                    State::Refused(StoreError::Backend(e))
                }
            }
        };

        Self {
            path,
            backend,
            state,
        }
    }

    /// A stream that yields `err` once and never subscribes.
    pub(crate) fn refused(
        backend: Arc<dyn RealtimeBackend>,
        path: impl Into<String>,
        err: StoreError,
    ) -> Self {
        Self {
            path: path.into(),
            backend,
            state: State::Refused(err),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a listener is currently registered.
    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Deregister the listener now. No item is yielded afterwards.
    pub fn close(&mut self) {
        if let State::Active { handle, .. } = std::mem::replace(&mut self.state, State::Closed) {
            self.backend.unsubscribe(&self.path, handle);
            debug!(path = %self.path, %handle, "Change stream closed");
        }
    }

    /// Decode each snapshot into a collection of `T`.
    pub fn decoded<T: Decode + 'static>(self) -> TypedStream<Vec<T>> {
        TypedStream::new(self, |snapshot| {
            decode_children(&snapshot.path, &snapshot.value)
        })
    }

    /// Decode each snapshot of a single-entity path. `None` while nothing
    /// (or nothing decodable) is stored there.
    pub fn decoded_entity<T: Decode + 'static>(self) -> TypedStream<Option<T>> {
        TypedStream::new(self, |snapshot| {
            if !snapshot.exists() {
                return None;
            }
            match decode_entity(&snapshot.path, &snapshot.value) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!(path = %snapshot.path, error = %e, "Skipping malformed entity");
                    None
                }
            }
        })
    }
}

impl Stream for ChangeStream {
    type Item = Result<Snapshot, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.state, State::Closed) {
            State::Refused(err) => Poll::Ready(Some(Err(err))),
            State::Closed => Poll::Ready(None),
            State::Active { handle, mut rx } => match rx.poll_recv(cx) {
                Poll::Pending => {
                    this.state = State::Active { handle, rx };
                    Poll::Pending
                }
                Poll::Ready(Some(Ok(value))) => {
                    this.state = State::Active { handle, rx };
                    Poll::Ready(Some(Ok(Snapshot {
                        path: this.path.clone(),
                        value,
                    })))
                }
                Poll::Ready(Some(Err(e))) => {
                    this.backend.unsubscribe(&this.path, handle);
                    warn!(path = %this.path, error = %e, "Change stream terminated by backend");
                    Poll::Ready(Some(Err(StoreError::Backend(e))))
                }
                Poll::Ready(None) => {
                    this.backend.unsubscribe(&this.path, handle);
                    debug!(path = %this.path, "Backend ended change stream");
                    Poll::Ready(None)
                }
            },
        }
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// A [`ChangeStream`] whose snapshots are turned into typed values.
pub struct TypedStream<T> {
    inner: ChangeStream,
    transform: Box<dyn Fn(Snapshot) -> T + Send>,
}

impl<T: 'static> TypedStream<T> {
    pub fn new<F>(inner: ChangeStream, transform: F) -> Self
    where
        F: Fn(Snapshot) -> T + Send + 'static,
    {
        Self {
            inner,
            transform: Box::new(transform),
        }
    }

    /// Apply `post` to every decoded value (sorting, filtering).
    pub fn map_each<F>(self, post: F) -> Self
    where
        F: Fn(T) -> T + Send + 'static,
    {
        let TypedStream { inner, transform } = self;
        TypedStream::new(inner, move |snapshot| post(transform(snapshot)))
    }
}

impl<T> TypedStream<T> {
    pub fn path(&self) -> &str {
        self.inner.path()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl<T> Stream for TypedStream<T> {
    type Item = Result<T, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(snapshot))) => Poll::Ready(Some(Ok((this.transform)(snapshot)))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::memory::{MemoryBackend, StaticAuth};
    use futures::StreamExt;
    use serde_json::json;
    use tutti_shared::Notification;

    fn setup() -> (Arc<MemoryBackend>, StaticAuth) {
        (Arc::new(MemoryBackend::new()), StaticAuth::signed_in("u1"))
    }

    #[tokio::test]
    async fn first_item_is_current_state() {
        let (backend, auth) = setup();
        backend.set("notifications/main/n1", json!({ "text": "hi" })).await.unwrap();

        let mut stream = ChangeStream::open(backend.clone(), &auth, "notifications/main");
        let snapshot = stream.next().await.unwrap().unwrap();
        assert!(snapshot.exists());
        assert_eq!(snapshot.value, json!({ "n1": { "text": "hi" } }));
    }

    #[tokio::test]
    async fn unauthenticated_never_subscribes() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = StaticAuth::signed_out();

        let mut stream = ChangeStream::open(backend.clone(), &auth, "events/main");
        assert!(!stream.is_active());
        assert_eq!(backend.listener_count("events/main"), 0);

        assert!(matches!(stream.next().await, Some(Err(StoreError::Unauthenticated))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn every_change_is_a_full_snapshot() {
        let (backend, auth) = setup();
        let mut stream = ChangeStream::open(backend.clone(), &auth, "notifications/main");
        assert!(!stream.next().await.unwrap().unwrap().exists());

        backend.set("notifications/main/n1", json!({ "text": "a" })).await.unwrap();
        backend.set("notifications/main/n2", json!({ "text": "b" })).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.value.as_object().unwrap().len(), 1);
        assert_eq!(second.value.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn close_stops_emissions_and_deregisters() {
        let (backend, auth) = setup();
        let mut stream = ChangeStream::open(backend.clone(), &auth, "events/main");
        stream.next().await.unwrap().unwrap();
        assert_eq!(backend.listener_count("events/main"), 1);

        stream.close();
        assert_eq!(backend.listener_count("events/main"), 0);

        backend.set("events/main/e1", json!({ "title": "Gig" })).await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn drop_deregisters() {
        let (backend, auth) = setup();
        let stream = ChangeStream::open(backend.clone(), &auth, "events/main");
        assert_eq!(backend.listener_count("events/main"), 1);
        drop(stream);
        assert_eq!(backend.listener_count("events/main"), 0);
    }

    #[tokio::test]
    async fn backend_error_terminates_stream() {
        let (backend, auth) = setup();
        let mut stream = ChangeStream::open(backend.clone(), &auth, "events/main");
        stream.next().await.unwrap().unwrap();

        backend.fail_listeners("events/main", BackendError::PermissionDenied("events/main".into()));

        match stream.next().await {
            Some(Err(StoreError::Backend(BackendError::PermissionDenied(path)))) => {
                assert_eq!(path, "events/main")
            }
            other => panic!("expected backend failure, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
        assert_eq!(backend.listener_count("events/main"), 0);
    }

    #[tokio::test]
    async fn independent_streams_on_same_path() {
        let (backend, auth) = setup();
        let mut a = ChangeStream::open(backend.clone(), &auth, "events/main");
        let b = ChangeStream::open(backend.clone(), &auth, "events/main");
        assert_eq!(backend.listener_count("events/main"), 2);

        drop(b);
        assert_eq!(backend.listener_count("events/main"), 1);
        assert!(a.next().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn typed_stream_decodes_and_post_processes() {
        let (backend, auth) = setup();
        backend
            .set(
                "notifications/main",
                json!({
                    "n1": { "text": "old", "createdAt": 1 },
                    "bad": 7,
                    "n2": { "text": "new", "createdAt": 2 }
                }),
            )
            .await
            .unwrap();

        let mut stream = ChangeStream::open(backend.clone(), &auth, "notifications/main")
            .decoded::<Notification>()
            .map_each(|mut v| {
                v.reverse();
                v
            });

        let notifications = stream.next().await.unwrap().unwrap();
        let ids: Vec<&str> = notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n1"]);

        stream.close();
        assert_eq!(backend.listener_count("notifications/main"), 0);
    }

    #[tokio::test]
    async fn entity_stream_tracks_presence() {
        let (backend, auth) = setup();
        let mut stream = ChangeStream::open(backend.clone(), &auth, "notifications/main/n1")
            .decoded_entity::<Notification>();
        assert_eq!(stream.next().await.unwrap().unwrap(), None);

        backend.set("notifications/main/n1", json!({ "text": "hi" })).await.unwrap();
        let present = stream.next().await.unwrap().unwrap().unwrap();
        assert_eq!(present.id, "n1");

        backend.remove("notifications/main/n1").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), None);
    }
}
