//! Domain records decoded from realtime snapshots.
//!
//! Every struct uses `#[serde(default)]` so that a node missing some fields
//! still decodes: strings become empty, numbers zero, collections empty and
//! flags false. Records are immutable values; an update replaces the whole
//! record held by the consumer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Kind of band event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Concert,
    #[default]
    Rehearsal,
}

/// A member's answer to an event invitation.
///
/// A member without an entry in the attendance map is `Unanswered`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Going,
    NotGoing,
    #[default]
    Unanswered,
}

/// A concert or rehearsal of the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    /// Store-assigned key. Never blank once decoded.
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub start_time: String,
    /// `HH:MM`
    pub end_time: String,
    pub location: String,
    /// Referenced repertoire items: item id -> display title, in insertion order.
    pub repertoire: IndexMap<String, String>,
    /// Member id -> answer, in insertion order.
    pub attendance: IndexMap<String, AttendanceStatus>,
}

impl Event {
    /// Attendance answer of a member, `Unanswered` when absent.
    pub fn status_of(&self, user_id: &str) -> AttendanceStatus {
        self.attendance.get(user_id).copied().unwrap_or_default()
    }

    /// Ids of members who answered `Going`, in attendance-map order.
    pub fn going(&self) -> impl Iterator<Item = &str> {
        self.attendance
            .iter()
            .filter(|(_, status)| **status == AttendanceStatus::Going)
            .map(|(id, _)| id.as_str())
    }
}

/// Input for creating an event. The id is assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    #[serde(default)]
    pub repertoire: IndexMap<String, String>,
}

impl EventDraft {
    /// Materialize the draft under a store-issued id with an empty attendance map.
    pub fn into_event(self, id: String) -> Event {
        Event {
            id,
            title: self.title,
            kind: self.kind,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            repertoire: self.repertoire,
            attendance: IndexMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Repertoire
// ---------------------------------------------------------------------------

/// A piece in the shared repertoire with its per-instrument sheet files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepertoireItem {
    pub id: String,
    pub title: String,
    pub composer: String,
    /// External video reference (e.g. a streaming link).
    pub video: Option<String>,
    /// Instrument name -> download locator.
    pub files: IndexMap<String, String>,
    /// Epoch millis when the item was saved.
    pub saved_at: i64,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Member profile stored under the member's account id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: String,
    pub gender: String,
    pub director: bool,
    /// Ordered instrument roles, bounded by [`crate::instruments::instrument_cap`].
    pub instruments: Vec<String>,
    pub avatar: Option<String>,
}

impl UserProfile {
    /// Same profile with its instrument list brought within the role rules.
    pub fn sanitized(mut self) -> Self {
        self.instruments = crate::sanitize_instruments(&self.instruments, self.director);
        self
    }
}

/// An account id paired with its profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub profile: UserProfile,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A message broadcast to every member of the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notification {
    pub id: String,
    pub text: String,
    /// Epoch millis
    pub created_at: i64,
}
