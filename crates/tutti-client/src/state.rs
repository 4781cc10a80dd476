//! Session state shared by every screen.
//!
//! The [`Session`] owns the [`Store`] wired to the chosen collaborators and
//! the aggregator configured from [`ClientConfig`]. It is cheap to clone.

use std::sync::Arc;

use tutti_shared::{Event, Notification, RepertoireItem, User};
use tutti_store::{AuthProvider, ObjectStorage, RealtimeBackend, Store};

use crate::aggregator::{EventAggregator, EventDetail, EventDetailHandle};
use crate::config::ClientConfig;
use crate::error::AggregateError;
use crate::live::{Live, LiveCollection};

#[derive(Clone)]
pub struct Session {
    config: ClientConfig,
    store: Store,
    aggregator: EventAggregator,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn RealtimeBackend>,
        storage: Arc<dyn ObjectStorage>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let store = Store::new(backend, storage, auth, config.group_id.clone());
        let aggregator =
            EventAggregator::new(store.clone()).with_timeout(config.aggregation_timeout);
        Self {
            config,
            store,
            aggregator,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Entity operations (reads, writes, raw streams).
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn aggregator(&self) -> &EventAggregator {
        &self.aggregator
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.current_account_id().is_some()
    }

    /// Start assembling the detail view of one event in the background.
    pub fn event_detail(&self, event_id: impl Into<String>) -> EventDetailHandle {
        self.aggregator.spawn(event_id)
    }

    /// Assemble the detail view of one event and wait for it.
    pub async fn load_event_detail(&self, event_id: &str) -> Result<EventDetail, AggregateError> {
        self.aggregator.aggregate(event_id).await
    }

    pub fn live_events(&self) -> LiveCollection<Event> {
        Live::spawn(self.store.watch_events())
    }

    pub fn live_event(&self, event_id: &str) -> Live<Option<Event>> {
        Live::spawn(self.store.watch_event(event_id))
    }

    pub fn live_repertoire(&self) -> LiveCollection<RepertoireItem> {
        Live::spawn(self.store.watch_repertoire())
    }

    pub fn live_notifications(&self) -> LiveCollection<Notification> {
        Live::spawn(self.store.watch_notifications())
    }

    pub fn live_members(&self) -> LiveCollection<User> {
        Live::spawn(self.store.watch_members())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tutti_shared::{AttendanceStatus, EventDraft, EventType, UserProfile};
    use tutti_store::{MemoryBackend, MemoryStorage, StaticAuth};

    use crate::aggregator::AggregationState;
    use crate::live::LiveState;

    fn session(auth: Arc<StaticAuth>) -> (Session, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let config = ClientConfig {
            group_id: "winds".into(),
            aggregation_timeout: Some(Duration::from_secs(5)),
            ..ClientConfig::default()
        };
        let session = Session::new(
            config,
            backend.clone(),
            Arc::new(MemoryStorage::new()),
            auth,
        );
        (session, backend)
    }

    fn draft(title: &str) -> EventDraft {
        EventDraft {
            title: title.into(),
            kind: EventType::Rehearsal,
            date: "2026-11-02".into(),
            start_time: "19:00".into(),
            end_time: "21:00".into(),
            location: "Hall B".into(),
            ..EventDraft::default()
        }
    }

    #[tokio::test]
    async fn collections_are_namespaced_by_configured_group() {
        let (session, backend) = session(Arc::new(StaticAuth::signed_in("u1")));
        let id = session.store().create_event(draft("Sectional")).await.unwrap();
        assert!(backend.snapshot(&format!("events/winds/{id}")).is_some());

        let mut events = session.live_events();
        let state = events.ready().await;
        assert_eq!(state.value().unwrap()[0].title, "Sectional");
    }

    #[tokio::test]
    async fn rsvp_flows_into_event_detail() {
        let auth = Arc::new(StaticAuth::signed_in("u1"));
        let (session, backend) = session(auth.clone());
        backend
            .set("users/u1", json!({ "name": "Ana", "instruments": ["Flute"] }))
            .await
            .unwrap();
        backend
            .set("users/u2", json!({ "name": "Bo", "instruments": ["Tuba"] }))
            .await
            .unwrap();

        let store = session.store();
        let id = store.create_event(draft("Run-through")).await.unwrap();
        store.set_attendance(&id, AttendanceStatus::Going).await.unwrap();

        auth.sign_in("u2");
        store.set_attendance(&id, AttendanceStatus::NotGoing).await.unwrap();

        let mut handle = session.event_detail(id.clone());
        match handle.settled().await {
            Some(AggregationState::Success(detail)) => {
                let names: Vec<&str> = detail
                    .members
                    .iter()
                    .map(|u| u.profile.name.as_str())
                    .collect();
                assert_eq!(names, vec!["Ana"]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn signed_out_session() {
        let (session, _) = session(Arc::new(StaticAuth::signed_out()));
        assert!(!session.is_signed_in());

        let mut members = session.live_members();
        assert!(matches!(members.ready().await, LiveState::Failed(_)));

        let profile = UserProfile {
            name: "Ana".into(),
            ..UserProfile::default()
        };
        assert!(session.store().save_profile(profile).await.is_err());
    }
}
