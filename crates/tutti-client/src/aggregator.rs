//! Client-side join of an event with its repertoire and confirmed attendees.
//!
//! The event is fetched first; its repertoire references and `Going`
//! attendees are then looked up concurrently and joined back in the order of
//! the event's own maps, whatever order the lookups complete in.
//!
//! Branch failures are isolated:
//! - a repertoire reference whose item is gone (or undecodable) is dropped;
//!   any other repertoire failure fails the whole view and cancels the
//!   remaining lookups;
//! - an attendee whose profile cannot be fetched is left out of the member
//!   list, whatever the reason.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tutti_shared::{Event, RepertoireItem, User};
use tutti_store::{Store, StoreError};

use crate::error::AggregateError;

/// Everything the event detail screen shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDetail {
    pub event: Event,
    /// Referenced pieces, in the event's reference order.
    pub repertoire: Vec<RepertoireItem>,
    /// Members who answered `Going`, in attendance order.
    pub members: Vec<User>,
}

/// Progress of one aggregation.
#[derive(Debug, Clone)]
pub enum AggregationState {
    Loading,
    Success(Arc<EventDetail>),
    Error(Arc<AggregateError>),
}

impl AggregationState {
    pub fn is_loading(&self) -> bool {
        matches!(self, AggregationState::Loading)
    }
}

#[derive(Clone)]
pub struct EventAggregator {
    store: Store,
    timeout: Option<Duration>,
}

impl EventAggregator {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bound the whole aggregation; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Assemble the detail view of `event_id`.
    ///
    /// Dropping the returned future cancels every outstanding lookup.
    pub async fn aggregate(&self, event_id: &str) -> Result<EventDetail, AggregateError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.assemble(event_id))
                .await
                .map_err(|_| {
                    warn!(event_id, ?limit, "Event aggregation timed out");
                    AggregateError::TimedOut(limit)
                })?,
            None => self.assemble(event_id).await,
        }
    }

    /// Run the aggregation in the background and observe its state.
    pub fn spawn(&self, event_id: impl Into<String>) -> EventDetailHandle {
        let (tx, rx) = watch::channel(AggregationState::Loading);
        let aggregator = self.clone();
        let event_id = event_id.into();

        let task = tokio::spawn(async move {
            let state = match aggregator.aggregate(&event_id).await {
                Ok(detail) => AggregationState::Success(Arc::new(detail)),
                Err(e) => AggregationState::Error(Arc::new(e)),
            };
            let _ = tx.send(state);
        });

        EventDetailHandle { rx, task }
    }

    async fn assemble(&self, event_id: &str) -> Result<EventDetail, AggregateError> {
        let event = self.store.get_event(event_id).await.map_err(|e| match e {
            StoreError::NotFound { .. } => AggregateError::NotFound {
                event_id: event_id.to_string(),
            },
            other => AggregateError::Failure(other),
        })?;

        let pieces = event.repertoire.keys().map(|id| self.lookup_piece(id));
        let attendees = event.going().map(|id| self.lookup_member(id));

        let (pieces, attendees) = futures::try_join!(try_join_all(pieces), async {
            Ok::<_, AggregateError>(join_all(attendees).await)
        })?;

        let repertoire: Vec<RepertoireItem> = pieces.into_iter().flatten().collect();
        let members: Vec<User> = attendees.into_iter().flatten().collect();

        debug!(
            event_id,
            referenced = event.repertoire.len(),
            repertoire = repertoire.len(),
            members = members.len(),
            "Event detail assembled"
        );

        Ok(EventDetail {
            event,
            repertoire,
            members,
        })
    }

    async fn lookup_piece(&self, item_id: &str) -> Result<Option<RepertoireItem>, AggregateError> {
        match self.store.get_repertoire_item(item_id).await {
            Ok(item) => Ok(Some(item)),
            Err(e @ (StoreError::NotFound { .. } | StoreError::Malformed { .. })) => {
                debug!(item_id, reason = %e, "Dropping unavailable repertoire reference");
                Ok(None)
            }
            Err(e) => Err(AggregateError::Failure(e)),
        }
    }

    async fn lookup_member(&self, user_id: &str) -> Option<User> {
        match self.store.get_user(user_id).await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(user_id, error = %e, "Leaving attendee out of member list");
                None
            }
        }
    }
}

/// Background aggregation. Dropping the handle cancels it.
pub struct EventDetailHandle {
    rx: watch::Receiver<AggregationState>,
    task: JoinHandle<()>,
}

impl EventDetailHandle {
    pub fn state(&self) -> AggregationState {
        self.rx.borrow().clone()
    }

    /// Wait for the final state. `None` if the aggregation was cancelled first.
    pub async fn settled(&mut self) -> Option<AggregationState> {
        loop {
            {
                let state = self.rx.borrow_and_update();
                if !state.is_loading() {
                    return Some(state.clone());
                }
            }
            if self.rx.changed().await.is_err() {
                let state = self.rx.borrow();
                return (!state.is_loading()).then(|| state.clone());
            }
        }
    }

    /// Abort the aggregation and every outstanding lookup.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for EventDetailHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use tokio::time::Instant;
    use tutti_store::backend::SnapshotReceiver;
    use tutti_store::{
        BackendError, MemoryBackend, MemoryStorage, RealtimeBackend, StaticAuth, SubscriptionHandle,
    };

    /// Memory backend with per-path read latency and failures.
    #[derive(Default)]
    struct SlowBackend {
        inner: MemoryBackend,
        delays: HashMap<String, Duration>,
        failing: HashSet<String>,
        in_flight: Arc<AtomicUsize>,
    }

    struct InFlight(Arc<AtomicUsize>);

    impl InFlight {
        fn enter(counter: &Arc<AtomicUsize>) -> Self {
            counter.fetch_add(1, Ordering::SeqCst);
            Self(counter.clone())
        }
    }

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RealtimeBackend for SlowBackend {
        fn subscribe(
            &self,
            path: &str,
        ) -> Result<(SubscriptionHandle, SnapshotReceiver), BackendError> {
            self.inner.subscribe(path)
        }

        fn unsubscribe(&self, path: &str, handle: SubscriptionHandle) {
            self.inner.unsubscribe(path, handle)
        }

        async fn get(&self, path: &str) -> Result<Option<Value>, BackendError> {
            let _guard = InFlight::enter(&self.in_flight);
            if let Some(delay) = self.delays.get(path) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(path) {
                return Err(BackendError::Unavailable(path.to_string()));
            }
            self.inner.get(path).await
        }

        async fn set(&self, path: &str, value: Value) -> Result<(), BackendError> {
            self.inner.set(path, value).await
        }

        async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), BackendError> {
            self.inner.update(path, fields).await
        }

        async fn remove(&self, path: &str) -> Result<(), BackendError> {
            self.inner.remove(path).await
        }

        async fn push(&self, path: &str) -> Result<String, BackendError> {
            self.inner.push(path).await
        }
    }

    fn seed() -> Value {
        json!({
            "events": { "main": {
                "e1": {
                    "title": "Spring concert",
                    "type": "CONCERT",
                    "repertoire": { "r3": "Bolero", "gone": "Deleted piece", "r1": "Libertango", "r2": "Danzon" },
                    "attendance": {
                        "u2": "GOING",
                        "u1": "NOT_GOING",
                        "u3": "GOING",
                        "ghost": "GOING",
                        "u4": "UNANSWERED",
                        "u1b": "GOING"
                    }
                },
                "quiet": { "title": "Sectional", "attendance": { "u1": "NOT_GOING" } }
            }},
            "repertoire": { "main": {
                "r1": { "title": "Libertango", "savedAt": 1 },
                "r2": { "title": "Danzon", "savedAt": 2 },
                "r3": { "title": "Bolero", "savedAt": 3 }
            }},
            "users": {
                "u1": { "name": "Ana" },
                "u1b": { "name": "Bea" },
                "u2": { "name": "Cai", "director": true, "instruments": ["Conductor"] },
                "u3": { "name": "Dan", "instruments": ["Tuba"] }
            }
        })
    }

    fn backend() -> SlowBackend {
        SlowBackend {
            inner: MemoryBackend::with_data(seed()),
            ..Default::default()
        }
    }

    fn aggregator(backend: SlowBackend) -> EventAggregator {
        let store = Store::new(
            Arc::new(backend),
            Arc::new(MemoryStorage::new()),
            Arc::new(StaticAuth::signed_in("u1")),
            "main",
        );
        EventAggregator::new(store)
    }

    fn ids<'a>(iter: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        iter.collect()
    }

    #[tokio::test]
    async fn assembles_in_reference_and_attendance_order() {
        let detail = aggregator(backend()).aggregate("e1").await.unwrap();

        assert_eq!(detail.event.id, "e1");
        assert_eq!(
            ids(detail.repertoire.iter().map(|r| r.id.as_str())),
            vec!["r3", "r1", "r2"]
        );
        assert_eq!(
            ids(detail.members.iter().map(|u| u.id.as_str())),
            vec!["u2", "u3", "u1b"]
        );
        assert!(detail.members[0].profile.director);
    }

    #[tokio::test]
    async fn deleted_reference_is_dropped_without_error() {
        let slow = backend();
        slow.inner
            .set(
                "events/main/pair",
                json!({ "title": "Pair", "repertoire": { "gone": "Old", "r1": "Libertango" } }),
            )
            .await
            .unwrap();

        let detail = aggregator(slow).aggregate("pair").await.unwrap();
        assert_eq!(detail.repertoire.len(), 1);
        assert_eq!(detail.repertoire[0].id, "r1");
    }

    #[tokio::test]
    async fn no_attendees_is_success_with_empty_members() {
        let detail = aggregator(backend()).aggregate("quiet").await.unwrap();
        assert!(detail.members.is_empty());
        assert!(detail.repertoire.is_empty());
    }

    #[tokio::test]
    async fn missing_event_is_not_found() {
        let err = aggregator(backend()).aggregate("nope").await.unwrap_err();
        assert!(matches!(err, AggregateError::NotFound { ref event_id } if event_id == "nope"));
    }

    #[tokio::test]
    async fn signed_out_is_failure() {
        let store = Store::new(
            Arc::new(backend()),
            Arc::new(MemoryStorage::new()),
            Arc::new(StaticAuth::signed_out()),
            "main",
        );
        let err = EventAggregator::new(store).aggregate("e1").await.unwrap_err();
        assert!(matches!(err, AggregateError::Failure(StoreError::Unauthenticated)));
    }

    #[tokio::test]
    async fn repertoire_backend_failure_fails_the_view() {
        let mut slow = backend();
        slow.failing.insert("repertoire/main/r1".into());
        let err = aggregator(slow).aggregate("e1").await.unwrap_err();
        assert!(matches!(
            err,
            AggregateError::Failure(StoreError::Backend(BackendError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn member_failure_only_drops_that_member() {
        let mut slow = backend();
        slow.failing.insert("users/u3".into());
        let detail = aggregator(slow).aggregate("e1").await.unwrap();
        assert_eq!(
            ids(detail.members.iter().map(|u| u.id.as_str())),
            vec!["u2", "u1b"]
        );
        assert_eq!(detail.repertoire.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn lookups_run_concurrently_and_keep_order() {
        let mut slow = backend();
        for (path, ms) in [
            ("repertoire/main/r3", 300),
            ("repertoire/main/r1", 100),
            ("repertoire/main/r2", 200),
            ("users/u2", 250),
            ("users/u3", 50),
            ("users/u1b", 150),
        ] {
            slow.delays.insert(path.into(), Duration::from_millis(ms));
        }

        let started = Instant::now();
        let detail = aggregator(slow).aggregate("e1").await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
        assert_eq!(
            ids(detail.repertoire.iter().map(|r| r.id.as_str())),
            vec!["r3", "r1", "r2"]
        );
        assert_eq!(
            ids(detail.members.iter().map(|u| u.id.as_str())),
            vec!["u2", "u3", "u1b"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_outstanding_lookups() {
        let mut slow = backend();
        slow.delays.insert("users/u3".into(), Duration::from_secs(60));
        slow.delays.insert("repertoire/main/r2".into(), Duration::from_secs(60));
        let in_flight = slow.in_flight.clone();

        let aggregator = aggregator(slow).with_timeout(Some(Duration::from_secs(1)));
        let err = aggregator.aggregate("e1").await.unwrap_err();

        assert!(matches!(err, AggregateError::TimedOut(limit) if limit == Duration::from_secs(1)));
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_future_cancels_lookups() {
        let mut slow = backend();
        slow.delays.insert("users/u2".into(), Duration::from_secs(60));
        let in_flight = slow.in_flight.clone();
        let aggregator = aggregator(slow);

        let outcome =
            tokio::time::timeout(Duration::from_millis(10), aggregator.aggregate("e1")).await;
        assert!(outcome.is_err());
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn spawned_aggregation_settles() {
        let mut handle = aggregator(backend()).spawn("e1");
        match handle.settled().await {
            Some(AggregationState::Success(detail)) => assert_eq!(detail.repertoire.len(), 3),
            other => panic!("expected success, got {other:?}"),
        }
        assert!(matches!(handle.state(), AggregationState::Success(_)));
    }

    #[tokio::test]
    async fn spawned_aggregation_reports_errors() {
        let mut handle = aggregator(backend()).spawn("nope");
        match handle.settled().await {
            Some(AggregationState::Error(err)) => {
                assert!(matches!(*err, AggregateError::NotFound { .. }))
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_aggregation_never_settles() {
        let mut slow = backend();
        slow.delays.insert("repertoire/main/r1".into(), Duration::from_secs(60));
        let mut handle = aggregator(slow).spawn("e1");

        tokio::task::yield_now().await;
        assert!(handle.state().is_loading());

        handle.cancel();
        assert!(handle.settled().await.is_none());
    }
}
