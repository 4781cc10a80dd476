//! Snapshot decoding.
//!
//! A collection snapshot is a JSON object keyed by entity id. Each child is
//! decoded on its own: the child's key becomes the entity id (overriding any
//! id embedded in the payload) and missing fields take their defaults. A
//! child that cannot be decoded is skipped and logged; it never fails the
//! siblings or the stream.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use tutti_shared::paths;
use tutti_shared::{Event, Notification, RepertoireItem, User, UserProfile};

use crate::error::StoreError;

/// A child left out of a decoded collection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("skipped child {key}: {reason}")]
pub struct DecodeSkip {
    pub key: String,
    pub reason: String,
}

impl DecodeSkip {
    fn new(key: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Entities that can be built from one keyed snapshot node.
pub trait Decode: Sized {
    fn decode(key: &str, node: &Value) -> Result<Self, DecodeSkip>;
}

/// Deserialize a node, ignoring any embedded `id` since the key replaces it.
fn from_node<T: DeserializeOwned>(key: &str, node: &Value) -> Result<T, DecodeSkip> {
    let Value::Object(fields) = node else {
        return Err(DecodeSkip::new(key, "not an object"));
    };
    let mut fields = fields.clone();
    fields.remove("id");
    serde_json::from_value(Value::Object(fields)).map_err(|e| DecodeSkip::new(key, e.to_string()))
}

impl Decode for Event {
    fn decode(key: &str, node: &Value) -> Result<Self, DecodeSkip> {
        let mut event: Event = from_node(key, node)?;
        event.id = key.to_string();
        Ok(event)
    }
}

impl Decode for RepertoireItem {
    fn decode(key: &str, node: &Value) -> Result<Self, DecodeSkip> {
        let mut item: RepertoireItem = from_node(key, node)?;
        item.id = key.to_string();
        Ok(item)
    }
}

impl Decode for Notification {
    fn decode(key: &str, node: &Value) -> Result<Self, DecodeSkip> {
        let mut notification: Notification = from_node(key, node)?;
        notification.id = key.to_string();
        Ok(notification)
    }
}

impl Decode for User {
    fn decode(key: &str, node: &Value) -> Result<Self, DecodeSkip> {
        let profile: UserProfile = from_node(key, node)?;
        Ok(User {
            id: key.to_string(),
            profile,
        })
    }
}

/// Decode every child of a collection snapshot, in snapshot order.
pub fn decode_children<T: Decode>(path: &str, snapshot: &Value) -> Vec<T> {
    let children = match snapshot {
        Value::Null => return Vec::new(),
        Value::Object(children) => children,
        other => {
            warn!(path, kind = json_kind(other), "Collection snapshot is not an object");
            return Vec::new();
        }
    };

    children
        .iter()
        .filter_map(|(key, node)| match T::decode(key, node) {
            Ok(entity) => Some(entity),
            Err(skip) => {
                warn!(path, key = %skip.key, reason = %skip.reason, "Skipping malformed child");
                None
            }
        })
        .collect()
}

/// Decode the single entity stored at `path`; its key is the last path segment.
pub fn decode_entity<T: Decode>(path: &str, node: &Value) -> Result<T, StoreError> {
    T::decode(paths::key_of(path), node).map_err(|skip| StoreError::Malformed {
        path: path.to_string(),
        reason: skip.reason,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
