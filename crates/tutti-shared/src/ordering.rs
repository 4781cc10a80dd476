//! Listing orders recomputed on every snapshot.
//!
//! All sorts are stable: entries with equal keys keep snapshot order.

use crate::models::{Event, EventType, Notification, RepertoireItem};

/// Newest notification first.
pub fn sort_notifications(mut notifications: Vec<Notification>) -> Vec<Notification> {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications
}

/// Most recently saved piece first.
pub fn sort_repertoire(mut items: Vec<RepertoireItem>) -> Vec<RepertoireItem> {
    items.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
    items
}

/// Keep only events of one kind, preserving order.
pub fn events_of_kind(events: &[Event], kind: EventType) -> Vec<Event> {
    events.iter().filter(|e| e.kind == kind).cloned().collect()
}
