//! Event operations: schedule writes, attendance answers and repertoire
//! references, plus the listing and single-event streams.

use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use tutti_shared::constants::{DATE_FORMAT, TIME_FORMAT};
use tutti_shared::paths;
use tutti_shared::{AttendanceStatus, Event, EventDraft};

use crate::error::{Result, StoreError};
use crate::store::{checked_id, Store};
use crate::stream::TypedStream;

impl Store {
    /// Every event of the group, in snapshot order.
    pub fn watch_events(&self) -> TypedStream<Vec<Event>> {
        self.watch_collection(paths::events(self.group_id()))
    }

    /// One event; `None` while it does not exist.
    pub fn watch_event(&self, event_id: &str) -> TypedStream<Option<Event>> {
        self.watch_key(event_id, paths::event(self.group_id(), event_id))
            .decoded_entity()
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Event> {
        self.fetch_key(event_id, paths::event(self.group_id(), event_id))
            .await
    }

    /// Create an event under a store-generated id.
    pub async fn create_event(&self, draft: EventDraft) -> Result<String> {
        self.require_account()?;
        validate_schedule(&draft.title, &draft.date, &draft.start_time, &draft.end_time)?;

        let id = self.backend().push(&paths::events(self.group_id())).await?;
        let event = draft.into_event(id.clone());
        self.write(&paths::event(self.group_id(), &id), &event).await?;

        info!(event_id = %id, title = %event.title, "Event created");
        Ok(id)
    }

    /// Replace the core fields of an existing event. Attendance and the
    /// repertoire references are left untouched.
    pub async fn update_event(&self, event: &Event) -> Result<()> {
        self.require_account()?;
        let event_id = checked_id("event", &event.id)?;
        validate_schedule(&event.title, &event.date, &event.start_time, &event.end_time)?;
        self.get_event(event_id).await?;

        let path = paths::event(self.group_id(), event_id);
        self.backend().update(&path, core_fields(event)).await?;

        info!(event_id, "Event updated");
        Ok(())
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<()> {
        self.require_account()?;
        let event_id = checked_id("event", event_id)?;
        self.backend()
            .remove(&paths::event(self.group_id(), event_id))
            .await?;
        info!(event_id, "Event deleted");
        Ok(())
    }

    /// Record the signed-in member's answer. `Unanswered` clears the entry.
    ///
    /// The backend has no conditional writes, so an event deleted between
    /// the existence check and the write would come back holding only the
    /// answer. That leftover is removed again and reported as `NotFound`.
    pub async fn set_attendance(&self, event_id: &str, status: AttendanceStatus) -> Result<()> {
        let account = self.require_account()?;
        let event_id = checked_id("event", event_id)?;
        self.get_event(event_id).await?;

        let event_path = paths::event(self.group_id(), event_id);
        let path = paths::attendance(self.group_id(), event_id, &account);
        match status {
            AttendanceStatus::Unanswered => self.backend().remove(&path).await?,
            answer => {
                self.write(&path, &answer).await?;
                if self.only_attendance_left(&event_path).await? {
                    warn!(event_id, "Event deleted while recording attendance");
                    self.backend().remove(&event_path).await?;
                    return Err(StoreError::not_found(event_path));
                }
            }
        }

        info!(event_id, user_id = %account, ?status, "Attendance recorded");
        Ok(())
    }

    /// Reference a repertoire item from an event.
    pub async fn attach_repertoire(&self, event_id: &str, item_id: &str, title: &str) -> Result<()> {
        self.require_account()?;
        let event_id = checked_id("event", event_id)?;
        let item_id = checked_id("repertoire item", item_id)?;
        self.get_event(event_id).await?;

        let mut fields = Map::new();
        fields.insert(item_id.to_string(), Value::from(title));
        self.backend()
            .update(&paths::event_repertoire(self.group_id(), event_id), fields)
            .await?;
        Ok(())
    }

    pub async fn detach_repertoire(&self, event_id: &str, item_id: &str) -> Result<()> {
        self.require_account()?;
        let event_id = checked_id("event", event_id)?;
        let item_id = checked_id("repertoire item", item_id)?;
        let path = format!("{}/{item_id}", paths::event_repertoire(self.group_id(), event_id));
        self.backend().remove(&path).await?;
        Ok(())
    }

    async fn only_attendance_left(&self, event_path: &str) -> Result<bool> {
        Ok(match self.backend().get(event_path).await? {
            Some(Value::Object(fields)) => fields.keys().all(|k| k == "attendance"),
            _ => false,
        })
    }
}

fn core_fields(event: &Event) -> Map<String, Value> {
    let fields = json!({
        "title": event.title,
        "type": event.kind,
        "date": event.date,
        "startTime": event.start_time,
        "endTime": event.end_time,
        "location": event.location,
    });
    match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn validate_schedule(title: &str, date: &str, start: &str, end: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("event title is required".into()));
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| {
        StoreError::Validation(format!("invalid date '{date}', expected YYYY-MM-DD"))
    })?;

    let start_time = parse_time(start)?;
    let end_time = parse_time(end)?;
    if end_time < start_time {
        return Err(StoreError::Validation(format!(
            "event ends ({end}) before it starts ({start})"
        )));
    }
    Ok(())
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| StoreError::Validation(format!("invalid time '{value}', expected HH:MM")))
}
