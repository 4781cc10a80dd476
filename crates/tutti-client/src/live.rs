//! Live views over store streams.
//!
//! A [`Live`] drains a [`TypedStream`] on a background task and keeps the
//! latest value in a `watch` channel, which is what screens render from.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::poll_fn;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use tutti_store::{StoreError, TypedStream};

/// Latest known value of a live view.
#[derive(Debug)]
pub enum LiveState<T> {
    /// Nothing received yet.
    Loading,
    Ready(Arc<T>),
    /// The subscription ended with an error and will not recover.
    Failed(Arc<StoreError>),
}

impl<T> Clone for LiveState<T> {
    fn clone(&self) -> Self {
        match self {
            LiveState::Loading => LiveState::Loading,
            LiveState::Ready(value) => LiveState::Ready(value.clone()),
            LiveState::Failed(err) => LiveState::Failed(err.clone()),
        }
    }
}

impl<T> LiveState<T> {
    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            LiveState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Live view of one stream. Dropping it unsubscribes.
pub struct Live<T> {
    rx: watch::Receiver<LiveState<T>>,
    stream: Arc<Mutex<TypedStream<T>>>,
    task: JoinHandle<()>,
}

/// Live view of a whole collection.
pub type LiveCollection<T> = Live<Vec<T>>;

impl<T> Live<T>
where
    T: Send + Sync + 'static,
{
    /// Start draining `stream`. Must be called inside a tokio runtime.
    pub fn spawn(stream: TypedStream<T>) -> Self {
        let (tx, rx) = watch::channel(LiveState::Loading);
        let path = stream.path().to_string();
        let stream = Arc::new(Mutex::new(stream));
        let source = stream.clone();

        let task = tokio::spawn(async move {
            loop {
                let next = poll_fn(|cx| {
                    source
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .poll_next_unpin(cx)
                })
                .await;

                match next {
                    Some(Ok(value)) => {
                        if tx.send(LiveState::Ready(Arc::new(value))).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(LiveState::Failed(Arc::new(e)));
                        break;
                    }
                    None => break,
                }
            }
            debug!(path = %path, "Live view stopped");
        });

        Self { rx, stream, task }
    }

    pub fn state(&self) -> LiveState<T> {
        self.rx.borrow().clone()
    }

    /// Latest value, if one has arrived.
    pub fn current(&self) -> Option<Arc<T>> {
        self.rx.borrow().value().cloned()
    }

    /// Wait for the next state change. `None` once the view has stopped.
    pub async fn changed(&mut self) -> Option<LiveState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait for the first value or failure.
    pub async fn ready(&mut self) -> LiveState<T> {
        loop {
            {
                let state = self.rx.borrow_and_update();
                if !matches!(*state, LiveState::Loading) {
                    return state.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }

    /// Another receiver of the same state, e.g. for a second widget.
    pub fn subscribe(&self) -> watch::Receiver<LiveState<T>> {
        self.rx.clone()
    }
}

impl<T> Drop for Live<T> {
    fn drop(&mut self) {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
        self.task.abort();
    }
}
