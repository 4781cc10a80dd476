//! Realtime and object-storage paths.
//!
//! Every entity lives at `<collection>/<group or account>/<entity>`; only
//! path addressing and full-subtree reads are relied upon.

use crate::constants::{AVATARS, EVENTS, NOTIFICATIONS, REPERTOIRE, USERS};

pub fn events(group: &str) -> String {
    format!("{EVENTS}/{group}")
}

pub fn event(group: &str, event_id: &str) -> String {
    format!("{EVENTS}/{group}/{event_id}")
}

pub fn attendance(group: &str, event_id: &str, user_id: &str) -> String {
    format!("{EVENTS}/{group}/{event_id}/attendance/{user_id}")
}

pub fn event_repertoire(group: &str, event_id: &str) -> String {
    format!("{EVENTS}/{group}/{event_id}/repertoire")
}

pub fn repertoire(group: &str) -> String {
    format!("{REPERTOIRE}/{group}")
}

pub fn repertoire_item(group: &str, item_id: &str) -> String {
    format!("{REPERTOIRE}/{group}/{item_id}")
}

pub fn notifications(group: &str) -> String {
    format!("{NOTIFICATIONS}/{group}")
}

pub fn notification(group: &str, notification_id: &str) -> String {
    format!("{NOTIFICATIONS}/{group}/{notification_id}")
}

pub fn users() -> String {
    USERS.to_string()
}

pub fn user(user_id: &str) -> String {
    format!("{USERS}/{user_id}")
}

/// Object-storage location of one instrument's sheet for a piece.
pub fn sheet_file(group: &str, item_id: &str, instrument: &str) -> String {
    format!("{REPERTOIRE}/{group}/{item_id}/{instrument}")
}

pub fn avatar(user_id: &str) -> String {
    format!("{AVATARS}/{user_id}")
}

/// Whether `key` names exactly one child node: non-blank and free of `/`.
///
/// Ids must pass this before they are joined into a path, otherwise an empty
/// id addresses the parent collection and a `/` reaches into a deeper node.
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty() && !key.contains('/')
}

/// Last segment of a path, i.e. the key of the node it addresses.
pub fn key_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
